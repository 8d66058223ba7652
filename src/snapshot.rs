//! One consistent view of a subject's token.
//!
//! [`SnapshotAssembler::build_snapshot`] queries every configured class,
//! decodes and renders the entries synchronously, then hands each principal to
//! the resolution queue. Names arrive later on the snapshot's own channel and
//! are merged by [`Snapshot::drain_updates`] or [`Snapshot::wait_update`].

use core::iter;
use core::time::Duration;
use std::io;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::format::{DisplayText, format_value};
use crate::{
    ClassPolicy, DecodeError, Entry, EntryIndex, InspectorConfig, NameLookup, QueryClass,
    QueryError, RawQuery, ResolutionQueue, ResolutionRequest, ResolvedName, ResultSink, decode,
    query_with,
};

/// Failure to collect one information class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The query itself failed.
    #[error("querying {class} failed")]
    Query {
        /// Class that was queried.
        class: QueryClass,
        /// Query failure.
        #[source]
        source: QueryError,
    },
    /// The record came back but could not be decoded.
    #[error("decoding {class} failed")]
    Decode {
        /// Class that was decoded.
        class: QueryClass,
        /// Decode failure.
        #[source]
        source: DecodeError,
    },
}

impl SnapshotError {
    /// Class the failure belongs to.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> QueryClass {
        match self {
            Self::Query { class, .. } | Self::Decode { class, .. } => *class,
        }
    }
}

fn render(entry: &Entry) -> Vec<DisplayText> {
    match entry {
        Entry::Group(_) => vec![DisplayText::pending()],
        Entry::Privilege(privilege) => vec![DisplayText::ready(privilege.luid.to_string())],
        Entry::Attribute(attribute) => attribute
            .values
            .iter()
            .map(|value| format_value(&attribute.name, value))
            .collect(),
    }
}

/// Builds snapshots and owns the resolution queue they share.
#[derive(Debug)]
pub struct SnapshotAssembler {
    config: InspectorConfig,
    queue: ResolutionQueue,
}

impl SnapshotAssembler {
    /// Assembler resolving names through `lookup`.
    ///
    /// # Errors
    /// Returns the error of a failed worker thread spawn.
    #[inline]
    pub fn new(config: InspectorConfig, lookup: Arc<dyn NameLookup>) -> io::Result<Self> {
        let queue = ResolutionQueue::new(lookup, config.well_known, config.workers)?;
        Ok(Self { config, queue })
    }

    /// Assembler over the system lookups available on this machine.
    ///
    /// # Errors
    /// Returns the error of a failed worker thread spawn.
    #[cfg(windows)]
    #[inline]
    pub fn system(config: InspectorConfig) -> io::Result<Self> {
        let support = crate::PlatformSupport::detect();
        Self::new(config, Arc::new(crate::SystemNameLookup::new(&support)))
    }

    /// Settings in use.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// The shared resolution queue.
    #[inline]
    #[must_use]
    pub const fn queue(&self) -> &ResolutionQueue {
        &self.queue
    }

    fn collect<S: RawQuery + ?Sized>(
        &self,
        class: QueryClass,
        subject: &S,
    ) -> Result<Vec<Entry>, SnapshotError> {
        let buffer = query_with(&self.config.query, class, subject)
            .map_err(|source| SnapshotError::Query { class, source })?;
        decode(class, buffer).map_err(|source| SnapshotError::Decode { class, source })
    }

    /// Collects every configured class from `subject`.
    ///
    /// Entries keep class order, then record order. Every principal is
    /// scheduled for resolution before this returns; its text stays
    /// [`UNRESOLVED_PLACEHOLDER`](crate::UNRESOLVED_PLACEHOLDER) until the
    /// matching update is applied.
    ///
    /// # Errors
    /// The failure of a [`ClassPolicy::Required`] class. Failures of optional
    /// classes are kept in [`Snapshot::omitted`].
    #[inline]
    pub fn build_snapshot<S: RawQuery + ?Sized>(
        &self,
        subject: &S,
    ) -> Result<Snapshot, SnapshotError> {
        let mut entries = Vec::new();
        let mut classes = Vec::new();
        let mut omitted = Vec::new();
        for request in self.config.classes {
            match self.collect(request.class, subject) {
                Ok(decoded) => {
                    trace!(class = ?request.class, entries = decoded.len(), "class collected");
                    classes.extend(iter::repeat_n(request.class, decoded.len()));
                    entries.extend(decoded);
                }
                Err(error) => match request.policy {
                    ClassPolicy::Required => {
                        warn!(class = ?request.class, %error, "required class failed");
                        return Err(error);
                    }
                    ClassPolicy::Optional => {
                        debug!(class = ?request.class, %error, "class omitted");
                        omitted.push(error);
                    }
                },
            }
        }

        let texts: Vec<Vec<DisplayText>> = entries.iter().map(render).collect();
        let (sink, updates) = ResultSink::channel();
        let mut pending = 0;
        for (entry, item) in entries.iter().enumerate() {
            for (value, sid) in item.principals() {
                pending += 1;
                self.queue.submit(ResolutionRequest {
                    sid: sid.clone(),
                    target: EntryIndex::new(entry, value),
                    sink: sink.clone(),
                });
            }
        }
        debug!(
            entries = entries.len(),
            pending,
            omitted = omitted.len(),
            "snapshot built"
        );
        Ok(Snapshot {
            entries,
            classes,
            texts,
            omitted,
            updates,
            sink,
            pending,
        })
    }
}

/// Decoded entries of one subject with their rendered text.
///
/// Dropping the snapshot closes its sink: resolutions still running finish,
/// and their names are discarded.
#[derive(Debug)]
pub struct Snapshot {
    entries: Vec<Entry>,
    classes: Vec<QueryClass>,
    texts: Vec<Vec<DisplayText>>,
    omitted: Vec<SnapshotError>,
    updates: Receiver<(EntryIndex, ResolvedName)>,
    sink: ResultSink,
    pending: usize,
}

impl Snapshot {
    /// Entries in class order, then record order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Class entry `index` was collected from.
    #[inline]
    #[must_use]
    pub fn class_of(&self, index: usize) -> Option<QueryClass> {
        self.classes.get(index).copied()
    }

    /// Rendered text of one slot.
    #[inline]
    #[must_use]
    pub fn text(&self, index: EntryIndex) -> Option<&DisplayText> {
        self.texts.get(index.entry)?.get(index.value)
    }

    /// Rendered text of one slot, as a string.
    #[inline]
    #[must_use]
    pub fn display(&self, index: EntryIndex) -> Option<&str> {
        self.text(index).map(DisplayText::as_str)
    }

    /// Optional classes that were left out, and why.
    #[inline]
    #[must_use]
    pub fn omitted(&self) -> &[SnapshotError] {
        &self.omitted
    }

    /// Resolutions not received yet.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.pending
    }

    /// Writes `name` into slot `target`.
    ///
    /// Returns `true` when the text changed; applying the same name again is a
    /// no-op.
    #[inline]
    pub fn apply(&mut self, target: EntryIndex, name: &ResolvedName) -> bool {
        let Some(text) = self
            .texts
            .get_mut(target.entry)
            .and_then(|texts| texts.get_mut(target.value))
        else {
            warn!(?target, "update for an unknown slot");
            return false;
        };
        text.resolve(&name.display)
    }

    fn receive(
        &mut self,
        (target, name): (EntryIndex, ResolvedName),
        on_change: &mut impl FnMut(EntryIndex, &ResolvedName),
    ) {
        self.pending = self.pending.saturating_sub(1);
        if self.apply(target, &name) {
            on_change(target, &name);
        }
    }

    /// Applies every update that has arrived, without blocking.
    ///
    /// `on_change` is called for each slot whose text changed. Returns the
    /// number of updates received.
    #[inline]
    pub fn drain_updates<F: FnMut(EntryIndex, &ResolvedName)>(
        &mut self,
        mut on_change: F,
    ) -> usize {
        let mut received = 0;
        while let Ok(update) = self.updates.try_recv() {
            self.receive(update, &mut on_change);
            received += 1;
        }
        received
    }

    /// Waits up to `timeout` for one update and applies it.
    ///
    /// Returns `false` when nothing is pending or nothing arrived in time.
    #[inline]
    pub fn wait_update<F: FnMut(EntryIndex, &ResolvedName)>(
        &mut self,
        timeout: Duration,
        mut on_change: F,
    ) -> bool {
        if self.pending == 0 {
            return false;
        }
        match self.updates.recv_timeout(timeout) {
            Ok(update) => {
                self.receive(update, &mut on_change);
                true
            }
            Err(_) => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn updates(&self) -> Receiver<(EntryIndex, ResolvedName)> {
        self.updates.clone()
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.sink.close();
        trace!(pending = self.pending, "snapshot discarded");
    }
}
