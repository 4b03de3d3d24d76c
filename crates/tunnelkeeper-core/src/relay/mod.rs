// ── Relay cache and selection ──
//
// The relay list is produced elsewhere and read through `RelayCache`.
// Selection is a pure function of the list and the constraints.

mod cache;
mod selector;

pub use cache::FileRelayCache;
pub use selector::{DEFAULT_PORT, select_relay, select_relay_with_rng};

use crate::model::CachedRelays;

/// Source of the most recent relay list. `None` means no usable list.
pub trait RelayCache: Send + Sync {
    fn read(&self) -> Option<CachedRelays>;
}
