use crate::Sid;

/// Name lookup strategies, tried in declaration order.
///
/// Each method returns `None` when it has nothing for `sid`. Implementations
/// are called from worker threads and may block.
pub trait NameLookup: Send + Sync {
    /// `DOMAIN\Name` of an account.
    #[inline]
    fn account(&self, _sid: &Sid) -> Option<String> {
        None
    }

    /// Package family moniker of an app container SID.
    #[inline]
    fn package(&self, _sid: &Sid) -> Option<String> {
        None
    }

    /// App container moniker reported by the OS.
    #[inline]
    fn app_container(&self, _sid: &Sid) -> Option<String> {
        None
    }

    /// Capability name of a capability or capability group SID.
    #[inline]
    fn capability(&self, _sid: &Sid) -> Option<String> {
        None
    }
}

/// Lookup that knows nothing; only the well-known table applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl NameLookup for NoLookup {}
