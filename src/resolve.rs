//! Principal name resolution.
//!
//! [`resolve_name`] runs the lookup chain for one SID. [`ResolutionQueue`]
//! runs it on worker threads, coalescing requests for the same SID and
//! caching completed names, and reports back through a [`ResultSink`].

mod cache;
mod lookup;
mod queue;
#[cfg(windows)]
pub(crate) mod windows;

use core::fmt::{self, Display};

pub use lookup::{NameLookup, NoLookup};
pub use queue::{ResolutionQueue, ResolutionRequest, ResultSink};
#[cfg(windows)]
pub use windows::{CAPABILITY_NAMES, SystemNameLookup};

use crate::{Sid, WellKnownTable};

/// Which strategy produced a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameKind {
    /// Account lookup (`DOMAIN\Name`).
    Account,
    /// Package or app container moniker.
    Package,
    /// Capability name.
    Capability,
    /// Host table of well-known identifiers.
    WellKnown,
    /// Nothing matched; the display is the SID text.
    Unresolved,
}

/// Display name of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvedName {
    /// Text to show.
    pub display: String,
    /// Where the text came from.
    pub kind: NameKind,
}

impl ResolvedName {
    /// A name of `kind`.
    #[inline]
    pub fn new<S: Into<String>>(display: S, kind: NameKind) -> Self {
        Self {
            display: display.into(),
            kind,
        }
    }

    /// The SID's own text, marked [`NameKind::Unresolved`].
    #[inline]
    #[must_use]
    pub fn unresolved(sid: &Sid) -> Self {
        Self::new(sid.to_string(), NameKind::Unresolved)
    }
}

impl Display for ResolvedName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Resolves `sid` through `lookup`, then `well_known`.
///
/// Order: account, package (`name (APP_PACKAGE)`), app container
/// (`name (APP_CONTAINER)`), capability (`name (APP_CAPABILITY)`), well-known
/// table, and finally the SID text. Never fails.
#[inline]
pub fn resolve_name<L: NameLookup + ?Sized>(
    lookup: &L,
    well_known: &WellKnownTable,
    sid: &Sid,
) -> ResolvedName {
    if let Some(name) = lookup.account(sid) {
        return ResolvedName::new(name, NameKind::Account);
    }
    if let Some(name) = lookup.package(sid) {
        return ResolvedName::new(format!("{name} (APP_PACKAGE)"), NameKind::Package);
    }
    if let Some(name) = lookup.app_container(sid) {
        return ResolvedName::new(format!("{name} (APP_CONTAINER)"), NameKind::Package);
    }
    if let Some(name) = lookup.capability(sid) {
        return ResolvedName::new(format!("{name} (APP_CAPABILITY)"), NameKind::Capability);
    }
    if let Some(name) = well_known.lookup(sid) {
        return ResolvedName::new(name, NameKind::WellKnown);
    }
    ResolvedName::unresolved(sid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use crate::test_support::{StubLookup, sid};

    #[test]
    fn strategies_run_in_order() {
        let both = sid("S-1-15-2-1");
        let mut lookup = StubLookup::default();
        lookup.packages.insert(both.clone(), "Contoso.App".into());
        lookup.capabilities.insert(both.clone(), "internetClient".into());
        lookup.app_containers.insert(sid("S-1-15-2-2"), "contoso".into());
        lookup.capabilities.insert(sid("S-1-15-3-1"), "internetClient".into());
        lookup.accounts.insert(sid("S-1-5-32-544"), r"BUILTIN\Administrators".into());
        let table = WellKnownTable::DEFAULT;

        let resolve = |text: &str| resolve_name(&lookup, &table, &sid(text));
        assert_eq!(
            resolve("S-1-5-32-544"),
            ResolvedName::new(r"BUILTIN\Administrators", NameKind::Account)
        );
        assert_eq!(
            resolve("S-1-15-2-1"),
            ResolvedName::new("Contoso.App (APP_PACKAGE)", NameKind::Package)
        );
        assert_eq!(resolve("S-1-15-2-2").display, "contoso (APP_CONTAINER)");
        assert_eq!(
            resolve("S-1-15-3-1"),
            ResolvedName::new("internetClient (APP_CAPABILITY)", NameKind::Capability)
        );
        assert_eq!(
            resolve("S-1-5-18"),
            ResolvedName::new("Local System", NameKind::WellKnown)
        );
        assert_eq!(
            resolve("S-1-5-21-9-9-9-500"),
            ResolvedName::new("S-1-5-21-9-9-9-500", NameKind::Unresolved)
        );
    }

    #[test]
    fn account_wins_over_the_table() {
        let mut lookup = StubLookup::default();
        lookup.accounts.insert(sid("S-1-5-18"), r"NT AUTHORITY\SYSTEM".into());
        let name = resolve_name(&lookup, &WellKnownTable::DEFAULT, &sid("S-1-5-18"));
        assert_eq!(name.kind, NameKind::Account);
        assert_eq!(name.to_string(), r"NT AUTHORITY\SYSTEM");
    }

    #[test]
    fn no_lookup_falls_back_to_the_table() {
        let name = resolve_name(&NoLookup, &WellKnownTable::DEFAULT, &sid("S-1-1-0"));
        assert_eq!(name, ResolvedName::new("Everyone", NameKind::WellKnown));
    }
}
