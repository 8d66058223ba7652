use core::fmt;
use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use smallvec::{SmallVec, smallvec};
use tracing::{debug, trace, warn};

use super::cache::NameCache;
use super::{NameLookup, ResolvedName, resolve_name};
use crate::{EntryIndex, Sid, WellKnownTable};

/// Delivery end for the names of one snapshot.
///
/// Clones share the channel and the liveness flag. Once [`close`](Self::close)
/// is called, deliveries are dropped silently.
#[derive(Debug, Clone)]
pub struct ResultSink {
    sender: Sender<(EntryIndex, ResolvedName)>,
    live: Arc<AtomicBool>,
}

impl ResultSink {
    /// A live sink and the receiver its deliveries arrive on.
    #[must_use]
    #[inline]
    pub fn channel() -> (Self, Receiver<(EntryIndex, ResolvedName)>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let sink = Self {
            sender,
            live: Arc::new(AtomicBool::new(true)),
        };
        (sink, receiver)
    }

    /// Stops all further deliveries through this sink and its clones.
    #[inline]
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// `false` once closed.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn deliver(&self, target: EntryIndex, name: ResolvedName) {
        if !self.is_live() {
            trace!(?target, "sink closed, dropping name");
            return;
        }
        if self.sender.send((target, name)).is_err() {
            trace!(?target, "receiver gone, dropping name");
        }
    }
}

/// One slot waiting for the name of `sid`.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// Principal to resolve.
    pub sid: Sid,
    /// Slot the name belongs to.
    pub target: EntryIndex,
    /// Where the name is delivered.
    pub sink: ResultSink,
}

type Waiters = SmallVec<[(EntryIndex, ResultSink); 2]>;

struct Shared {
    lookup: Arc<dyn NameLookup>,
    well_known: WellKnownTable,
    cache: NameCache,
    in_flight: Mutex<HashMap<Sid, Waiters>>,
}

impl Shared {
    fn work(&self, jobs: &Receiver<Sid>) {
        while let Ok(sid) = jobs.recv() {
            let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
                resolve_name(self.lookup.as_ref(), &self.well_known, &sid)
            }));
            let name = resolved.unwrap_or_else(|_| {
                warn!(%sid, "name lookup panicked");
                ResolvedName::unresolved(&sid)
            });
            debug!(%sid, kind = ?name.kind, "resolved");
            self.complete(sid, name);
        }
    }

    /// Caches `name` first, then hands it to every waiter of `sid`.
    fn complete(&self, sid: Sid, name: ResolvedName) {
        let name = self.cache.insert(sid.clone(), name);
        let waiters = self.in_flight.lock().remove(&sid).unwrap_or_default();
        trace!(%sid, waiters = waiters.len(), "delivering");
        for (target, sink) in waiters {
            sink.deliver(target, name.clone());
        }
    }
}

/// Worker pool resolving principal names off the caller's thread.
///
/// Each submitted request gets exactly one delivery. Requests for a SID that
/// is already being resolved join that resolution; SIDs resolved before are
/// answered from the cache on the caller's thread. Dropping the queue lets
/// queued work finish and joins the workers.
pub struct ResolutionQueue {
    jobs: Option<Sender<Sid>>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ResolutionQueue {
    /// Starts `workers` threads (at least one) resolving through `lookup`.
    ///
    /// # Errors
    /// Returns the error of a failed thread spawn.
    #[inline]
    pub fn new(
        lookup: Arc<dyn NameLookup>,
        well_known: WellKnownTable,
        workers: usize,
    ) -> io::Result<Self> {
        let (jobs, receiver) = crossbeam_channel::unbounded::<Sid>();
        let shared = Arc::new(Shared {
            lookup,
            well_known,
            cache: NameCache::new(),
            in_flight: Mutex::new(HashMap::new()),
        });
        let workers = (0..workers.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("sid-resolver-{i}"))
                    .spawn(move || shared.work(&receiver))
            })
            .collect::<io::Result<Vec<_>>>()?;
        debug!(workers = workers.len(), "resolution queue started");
        Ok(Self {
            jobs: Some(jobs),
            shared,
            workers,
        })
    }

    /// Schedules `request`; its sink receives the name later, or right away
    /// when the name is cached.
    #[inline]
    pub fn submit(&self, request: ResolutionRequest) {
        let ResolutionRequest { sid, target, sink } = request;
        if let Some(name) = self.shared.cache.get(&sid) {
            trace!(%sid, ?target, "cache hit");
            sink.deliver(target, name);
            return;
        }
        {
            let mut in_flight = self.shared.in_flight.lock();
            // A worker may have completed between the lookup above and the lock.
            if let Some(name) = self.shared.cache.get(&sid) {
                drop(in_flight);
                sink.deliver(target, name);
                return;
            }
            match in_flight.entry(sid.clone()) {
                Slot::Occupied(mut waiters) => {
                    waiters.get_mut().push((target, sink));
                    trace!(%sid, ?target, "joined in-flight resolution");
                    return;
                }
                Slot::Vacant(slot) => {
                    slot.insert(smallvec![(target, sink)]);
                }
            }
        }
        trace!(%sid, ?target, "dispatching");
        let sent = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(sid.clone()).is_ok());
        if !sent {
            warn!(%sid, "resolution workers gone");
            let name = ResolvedName::unresolved(&sid);
            self.shared.complete(sid, name);
        }
    }

    /// Cached name of `sid`, if it was resolved before.
    #[inline]
    #[must_use]
    pub fn cached(&self, sid: &Sid) -> Option<ResolvedName> {
        self.shared.cache.get(sid)
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

impl fmt::Debug for ResolutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionQueue")
            .field("workers", &self.workers.len())
            .field("cached", &self.shared.cache.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ResolutionQueue {
    fn drop(&mut self) {
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("resolution worker panicked");
            }
        }
    }
}
