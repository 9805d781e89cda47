use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};
use vidpace_contracts::store::{PreferenceStore, StoreError, StoreResult};
use vidpace_model::{PreferenceRecord, StoreChange};

use super::{ChangeNotifier, DEFAULT_CHANGE_CAPACITY};

/// Store persisted as a JSON object on disk.
///
/// The record is cached after the first read; writes go to a sibling temp
/// file that is renamed over the target so a crash never leaves a torn
/// file behind.
#[derive(Clone)]
pub struct FilePreferenceStore {
    path: Arc<PathBuf>,
    cache: Arc<Mutex<Option<PreferenceRecord>>>,
    notifier: ChangeNotifier,
}

impl fmt::Debug for FilePreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .cache
            .try_lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        f.debug_struct("FilePreferenceStore")
            .field("path", &self.path)
            .field("cached", &cached)
            .field("subscribers", &self.notifier.sender.receiver_count())
            .finish()
    }
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            cache: Arc::new(Mutex::new(None)),
            notifier: ChangeNotifier::new(DEFAULT_CHANGE_CAPACITY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_record(&self) -> StoreResult<PreferenceRecord> {
        let contents = match fs::read_to_string(self.path.as_path()).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target: "vidpace::store", path = %self.path.display(), "no preference file yet");
                return Ok(PreferenceRecord::new());
            }
            Err(err) => return Err(unavailable(&self.path, err)),
        };

        match serde_json::from_str::<Map<String, Value>>(&contents) {
            Ok(map) => Ok(PreferenceRecord::from_json_map(map)),
            Err(err) => {
                warn!(target: "vidpace::store", path = %self.path.display(), error = %err, "preference file is corrupt; reading as empty");
                Ok(PreferenceRecord::new())
            }
        }
    }

    async fn write_record(&self, record: &PreferenceRecord) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(record)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| unavailable(parent, err))?;
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents)
            .await
            .map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, self.path.as_path())
            .await
            .map_err(|err| unavailable(&self.path, err))
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::PermissionDenied => {
            StoreError::Denied(format!("{}: {err}", path.display()))
        }
        _ => StoreError::Unavailable(format!("{}: {err}", path.display())),
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self) -> StoreResult<PreferenceRecord> {
        let mut cache = self.cache.lock().await;
        if let Some(record) = cache.as_ref() {
            return Ok(record.clone());
        }
        let record = self.read_record().await?;
        *cache = Some(record.clone());
        Ok(record)
    }

    async fn set(&self, record: PreferenceRecord) -> StoreResult<()> {
        let mut cache = self.cache.lock().await;
        let mut next = match cache.as_ref() {
            Some(current) => current.clone(),
            None => self.read_record().await?,
        };
        let change = next.upsert(&record);
        if change.is_empty() && cache.is_some() {
            return Ok(());
        }

        // Cache only moves forward once the write has landed.
        self.write_record(&next).await?;
        *cache = Some(next);
        drop(cache);

        self.notifier.notify(change);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidpace_model::{PreferenceKey, PreferenceSet};

    #[tokio::test]
    async fn missing_file_reads_as_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.json"));
        assert!(store.get().await.unwrap().is_empty());
        assert_eq!(store.load().await.unwrap(), PreferenceSet::default());
    }

    #[tokio::test]
    async fn writes_survive_a_fresh_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = FilePreferenceStore::new(&path);
        let mut rx = store.subscribe();

        let mut update = PreferenceRecord::new();
        update.insert(PreferenceKey::ForwardPrimary, 90);
        update.insert(PreferenceKey::Language, "zh");
        store.set(update).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.len(), 2);

        let reopened = FilePreferenceStore::new(&path);
        let prefs = reopened.load().await.unwrap();
        assert_eq!(prefs.forward_primary.get(), 90);
        assert_eq!(prefs.rewind_primary, PreferenceSet::DEFAULT_REWIND_PRIMARY);
        assert!(!dir.path().join("nested").join("prefs.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FilePreferenceStore::new(&path);
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unwritable_location_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("prefs.json");
        std::fs::create_dir(&path).unwrap();
        let store = FilePreferenceStore::new(&path);

        let err = store
            .save(&PreferenceSet::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unavailable(_) | StoreError::Denied(_)
        ));
    }
}
