use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use vidpace_model::{PreferenceRecord, PreferenceSet, StoreChange};

/// Failures of the replicated preference store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not be reached or written.
    #[error("preference store unavailable: {0}")]
    Unavailable(String),

    /// The host refused the operation (quota, permissions).
    #[error("preference store denied access: {0}")]
    Denied(String),

    #[error("preference store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistent, replicated key/value store with change notification.
///
/// `set` has upsert semantics: keys present in the record are written, all
/// other keys are left alone. Every write that changes at least one value
/// produces exactly one [`StoreChange`] for every live subscriber.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Reads the raw stored record (possibly partial or empty).
    async fn get(&self) -> StoreResult<PreferenceRecord>;

    /// Writes the given keys.
    async fn set(&self, record: PreferenceRecord) -> StoreResult<()>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    /// Reads the record merged over the compiled-in defaults.
    async fn load(&self) -> StoreResult<PreferenceSet> {
        let record = self.get().await?;
        Ok(PreferenceSet::from_record(&record))
    }

    /// Persists a full preference set.
    async fn save(&self, preferences: &PreferenceSet) -> StoreResult<()> {
        self.set(preferences.to_record()).await
    }
}
