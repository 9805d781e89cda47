use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use vidpace_contracts::store::{PreferenceStore, StoreResult};
use vidpace_model::{PreferenceRecord, StoreChange};

use super::{ChangeNotifier, DEFAULT_CHANGE_CAPACITY};

/// In-process replicated store. Cloning shares the replica.
#[derive(Clone)]
pub struct MemoryPreferenceStore {
    record: Arc<RwLock<PreferenceRecord>>,
    notifier: ChangeNotifier,
}

impl fmt::Debug for MemoryPreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .record
            .try_read()
            .map(|record| record.len())
            .unwrap_or_default();
        f.debug_struct("MemoryPreferenceStore")
            .field("stored_keys", &keys)
            .field("subscribers", &self.notifier.sender.receiver_count())
            .finish()
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::with_record(PreferenceRecord::new())
    }

    /// Starts from an existing record, as if left behind by an earlier run.
    pub fn with_record(record: PreferenceRecord) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            notifier: ChangeNotifier::new(DEFAULT_CHANGE_CAPACITY),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self) -> StoreResult<PreferenceRecord> {
        Ok(self.record.read().await.clone())
    }

    async fn set(&self, record: PreferenceRecord) -> StoreResult<()> {
        let change = self.record.write().await.upsert(&record);
        self.notifier.notify(change);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }
}
