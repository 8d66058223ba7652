//! Explicit configuration for queries, snapshots and platform capabilities.

use crate::{QueryClass, WellKnownTable};

/// Growth policy of the query executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryConfig {
    /// Size of the first probe, in bytes. Zero is allowed.
    pub initial_size: usize,
    /// Largest buffer the executor will allocate.
    pub max_size: usize,
    /// Raw calls allowed per query.
    pub max_attempts: u32,
}

impl QueryConfig {
    /// `0x80` byte probe, 16 MiB cap, 10 attempts.
    pub const DEFAULT: Self = Self {
        initial_size: 0x80,
        max_size: 16 * 1024 * 1024,
        max_attempts: 10,
    };

    /// Sets [`QueryConfig::initial_size`].
    #[inline]
    #[must_use]
    pub const fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Sets [`QueryConfig::max_size`].
    #[inline]
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets [`QueryConfig::max_attempts`].
    #[inline]
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for QueryConfig {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What a snapshot does when a class fails to query or decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassPolicy {
    /// The failure aborts the snapshot.
    Required,
    /// The class is left out and reported by [`crate::Snapshot::omitted`].
    Optional,
}

/// A class a snapshot collects and its failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassRequest {
    /// Information class to query.
    pub class: QueryClass,
    /// Failure policy.
    pub policy: ClassPolicy,
}

impl ClassRequest {
    /// Request that aborts the snapshot on failure.
    #[inline]
    #[must_use]
    pub const fn required(class: QueryClass) -> Self {
        Self {
            class,
            policy: ClassPolicy::Required,
        }
    }

    /// Request that is skipped on failure.
    #[inline]
    #[must_use]
    pub const fn optional(class: QueryClass) -> Self {
        Self {
            class,
            policy: ClassPolicy::Optional,
        }
    }
}

/// Groups are required; everything else is best effort.
pub const DEFAULT_CLASSES: &[ClassRequest] = &[
    ClassRequest::required(QueryClass::Groups),
    ClassRequest::optional(QueryClass::RestrictedSids),
    ClassRequest::optional(QueryClass::Privileges),
    ClassRequest::optional(QueryClass::Capabilities),
    ClassRequest::optional(QueryClass::UserClaims),
    ClassRequest::optional(QueryClass::DeviceClaims),
    ClassRequest::optional(QueryClass::SecurityAttributes),
];

/// Settings for [`crate::SnapshotAssembler`] and its resolution queue.
///
/// # Examples
/// ```rust
/// # use win_token_inspector::{InspectorConfig, QueryConfig};
/// const CONFIG: InspectorConfig = InspectorConfig::DEFAULT
///     .with_workers(4)
///     .with_query(QueryConfig::DEFAULT.with_initial_size(0));
/// assert_eq!(CONFIG.workers, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectorConfig {
    /// Query executor policy.
    pub query: QueryConfig,
    /// Resolution worker threads (at least one is started).
    pub workers: usize,
    /// Classes to collect, in display order.
    pub classes: &'static [ClassRequest],
    /// Last-resort names for well-known SIDs.
    pub well_known: WellKnownTable,
}

impl InspectorConfig {
    /// Two workers, [`QueryConfig::DEFAULT`], [`DEFAULT_CLASSES`], [`WellKnownTable::DEFAULT`].
    pub const DEFAULT: Self = Self {
        query: QueryConfig::DEFAULT,
        workers: 2,
        classes: DEFAULT_CLASSES,
        well_known: WellKnownTable::DEFAULT,
    };

    /// Sets [`InspectorConfig::query`].
    #[inline]
    #[must_use]
    pub const fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// Sets [`InspectorConfig::workers`].
    #[inline]
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets [`InspectorConfig::classes`].
    #[inline]
    #[must_use]
    pub const fn with_classes(mut self, classes: &'static [ClassRequest]) -> Self {
        self.classes = classes;
        self
    }

    /// Sets [`InspectorConfig::well_known`].
    #[inline]
    #[must_use]
    pub const fn with_well_known(mut self, well_known: WellKnownTable) -> Self {
        self.well_known = well_known;
        self
    }
}

impl Default for InspectorConfig {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Optional OS entry points, resolved once by [`PlatformSupport::detect`]
/// and handed to the lookup backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSupport {
    #[cfg(windows)]
    entry_points: crate::resolve::windows::EntryPoints,
}

impl PlatformSupport {
    /// Nothing optional is available.
    pub const NONE: Self = Self {
        #[cfg(windows)]
        entry_points: crate::resolve::windows::EntryPoints::NONE,
    };

    /// Probes the running system.
    #[inline]
    #[must_use]
    pub fn detect() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                let support = Self {
                    entry_points: crate::resolve::windows::EntryPoints::probe(),
                };
            } else {
                let support = Self::NONE;
            }
        }
        tracing::debug!(
            capability_derivation = support.capability_derivation(),
            app_container_monikers = support.app_container_monikers(),
            "platform support detected"
        );
        support
    }

    #[cfg(windows)]
    pub(crate) const fn entry_points(&self) -> &crate::resolve::windows::EntryPoints {
        &self.entry_points
    }

    /// `DeriveCapabilitySidsFromName` is exported by the OS.
    #[inline]
    #[must_use]
    pub const fn capability_derivation(&self) -> bool {
        #[cfg(windows)]
        let available = self.entry_points.derive_capability_sids.is_some();
        #[cfg(not(windows))]
        let available = false;
        available
    }

    /// `AppContainerLookupMoniker` is exported by the OS.
    #[inline]
    #[must_use]
    pub const fn app_container_monikers(&self) -> bool {
        #[cfg(windows)]
        let available = self.entry_points.app_container.is_some();
        #[cfg(not(windows))]
        let available = false;
        available
    }
}
