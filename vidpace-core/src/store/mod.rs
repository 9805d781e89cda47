//! Preference store implementations.
//!
//! Both stores share one replica per clone: every context that holds a
//! clone reads the same record and receives the same change notifications.

mod file;
mod memory;

pub use file::FilePreferenceStore;
pub use memory::MemoryPreferenceStore;

use tokio::sync::broadcast;
use tracing::trace;
use vidpace_model::StoreChange;

/// Default number of change notifications buffered per subscriber.
pub const DEFAULT_CHANGE_CAPACITY: usize = 64;

/// Fans store writes out to subscribers.
#[derive(Debug, Clone)]
struct ChangeNotifier {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeNotifier {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        if change.is_empty() {
            return;
        }
        let keys: Vec<_> = change.keys().map(|k| k.as_str()).collect();
        // No subscribers is not an error: nothing is listening yet.
        let receivers = self.sender.send(change).unwrap_or(0);
        trace!(target: "vidpace::store", ?keys, receivers, "store change published");
    }
}
