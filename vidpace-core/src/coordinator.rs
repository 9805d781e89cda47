//! Long-lived coordinator: preference installation and migration, and
//! best-effort fan-out of preference changes to every loaded page.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vidpace_config::VidpaceConfig;
use vidpace_contracts::command::PageCommand;
use vidpace_contracts::messaging::PageMessenger;
use vidpace_contracts::store::{PreferenceStore, StoreError};
use vidpace_model::{
    PreferenceKey, PreferencePatch, PreferenceRecord, PreferenceSet, StoreChange,
};

/// Failures surfaced by coordinator requests.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("coordinator is not running")]
    Stopped,
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Why the coordinator was (re)started by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update { previous_version: String },
}

type Reply = oneshot::Sender<CoordinatorResult<PreferenceSet>>;

/// Requests other contexts can make of the coordinator.
#[derive(Debug)]
pub enum CoordinatorRequest {
    GetSettings,
    SaveSettings(PreferencePatch),
    ResetSettings,
}

enum CoordinatorEvent {
    Lifecycle(InstallReason, Reply),
    Request(CoordinatorRequest, Reply),
    Shutdown,
}

/// Owns preference initialization and change relay.
pub struct Coordinator {
    store: Arc<dyn PreferenceStore>,
    messenger: Arc<dyn PageMessenger>,
    schema_version: u32,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("schema_version", &self.schema_version)
            .field("open_tabs", &self.messenger.open_tabs().len())
            .finish()
    }
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        messenger: Arc<dyn PageMessenger>,
        config: &VidpaceConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            schema_version: config.schema_version,
        }
    }

    /// Starts the event loop. Requests are handled strictly in order,
    /// interleaved with store change notifications.
    pub fn spawn(self, capacity: usize) -> CoordinatorHandle {
        let (requests, queue) = mpsc::channel(capacity.max(1));
        let changes = self.store.subscribe();
        let task = tokio::spawn(self.run(queue, changes));
        CoordinatorHandle { requests, task }
    }

    async fn run(
        self,
        mut queue: mpsc::Receiver<CoordinatorEvent>,
        mut changes: broadcast::Receiver<StoreChange>,
    ) {
        info!(target: "vidpace::coordinator", schema_version = self.schema_version, "coordinator started");
        let mut relaying = true;
        loop {
            tokio::select! {
                event = queue.recv() => match event {
                    Some(CoordinatorEvent::Lifecycle(reason, reply)) => {
                        let _ = reply.send(self.on_installed(reason).await);
                    }
                    Some(CoordinatorEvent::Request(request, reply)) => {
                        let _ = reply.send(self.handle(request).await);
                    }
                    Some(CoordinatorEvent::Shutdown) | None => break,
                },
                change = changes.recv(), if relaying => match change {
                    Ok(change) => self.relay(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "vidpace::coordinator", skipped, "missed store changes; pages may hold stale settings");
                    }
                    Err(RecvError::Closed) => {
                        warn!(target: "vidpace::coordinator", "store change feed closed; relay stopped");
                        relaying = false;
                    }
                },
            }
        }
        info!(target: "vidpace::coordinator", "coordinator stopped");
    }

    async fn on_installed(&self, reason: InstallReason) -> CoordinatorResult<PreferenceSet> {
        match reason {
            InstallReason::Install => self.install().await,
            InstallReason::Update { previous_version } => self.update(&previous_version).await,
        }
    }

    /// Writes stamped defaults if and only if nothing is stored yet.
    async fn install(&self) -> CoordinatorResult<PreferenceSet> {
        let record = self.store.get().await?;
        if !record.is_empty() {
            debug!(target: "vidpace::coordinator", keys = record.len(), "preferences already present; install left them alone");
            return Ok(PreferenceSet::from_record(&record));
        }
        let defaults = PreferenceSet::stamped(self.schema_version);
        self.store.save(&defaults).await?;
        info!(target: "vidpace::coordinator", schema_version = self.schema_version, "installed default preferences");
        Ok(defaults)
    }

    /// Stamps the current schema version, leaving every other key as is.
    /// Only the version key is written; `set` merges it into the stored record.
    async fn update(&self, previous_version: &str) -> CoordinatorResult<PreferenceSet> {
        let mut stamp = PreferenceRecord::new();
        stamp.insert(PreferenceKey::SchemaVersion, self.schema_version);
        self.store.set(stamp).await?;
        info!(target: "vidpace::coordinator", previous_version, schema_version = self.schema_version, "preferences migrated");
        Ok(self.store.load().await?)
    }

    async fn handle(&self, request: CoordinatorRequest) -> CoordinatorResult<PreferenceSet> {
        match request {
            CoordinatorRequest::GetSettings => Ok(self.store.load().await?),
            CoordinatorRequest::SaveSettings(patch) => {
                let mut preferences = self.store.load().await?;
                preferences.apply(&patch);
                self.store.save(&preferences).await?;
                info!(target: "vidpace::coordinator", "preferences saved");
                let delivered = self
                    .messenger
                    .broadcast(PageCommand::UpdateSettings { settings: patch })
                    .await;
                debug!(target: "vidpace::coordinator", delivered, "settings pushed to pages");
                Ok(preferences)
            }
            CoordinatorRequest::ResetSettings => {
                let defaults = PreferenceSet::stamped(self.schema_version);
                self.store.save(&defaults).await?;
                info!(target: "vidpace::coordinator", "preferences reset to defaults");
                Ok(defaults)
            }
        }
    }

    async fn relay(&self, change: StoreChange) {
        let settings = change.to_patch();
        if settings.is_empty() {
            return;
        }
        let delivered = self
            .messenger
            .broadcast(PageCommand::UpdateSettings { settings })
            .await;
        debug!(target: "vidpace::coordinator", keys = change.len(), delivered, "relayed store change");
    }
}

/// Handle to a running [`Coordinator`].
pub struct CoordinatorHandle {
    requests: mpsc::Sender<CoordinatorEvent>,
    task: JoinHandle<()>,
}

impl fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl CoordinatorHandle {
    /// First activation after the host installed the extension.
    pub async fn install(&self) -> CoordinatorResult<PreferenceSet> {
        self.lifecycle(InstallReason::Install).await
    }

    /// Activation after an upgrade from `previous_version`.
    pub async fn update(
        &self,
        previous_version: impl Into<String>,
    ) -> CoordinatorResult<PreferenceSet> {
        self.lifecycle(InstallReason::Update {
            previous_version: previous_version.into(),
        })
        .await
    }

    pub async fn get_settings(&self) -> CoordinatorResult<PreferenceSet> {
        self.request(CoordinatorRequest::GetSettings).await
    }

    pub async fn save_settings(
        &self,
        patch: PreferencePatch,
    ) -> CoordinatorResult<PreferenceSet> {
        self.request(CoordinatorRequest::SaveSettings(patch)).await
    }

    pub async fn reset_settings(&self) -> CoordinatorResult<PreferenceSet> {
        self.request(CoordinatorRequest::ResetSettings).await
    }

    pub async fn request(
        &self,
        request: CoordinatorRequest,
    ) -> CoordinatorResult<PreferenceSet> {
        let (reply, answer) = oneshot::channel();
        self.send(CoordinatorEvent::Request(request, reply), answer)
            .await
    }

    async fn lifecycle(&self, reason: InstallReason) -> CoordinatorResult<PreferenceSet> {
        let (reply, answer) = oneshot::channel();
        self.send(CoordinatorEvent::Lifecycle(reason, reply), answer)
            .await
    }

    async fn send(
        &self,
        event: CoordinatorEvent,
        answer: oneshot::Receiver<CoordinatorResult<PreferenceSet>>,
    ) -> CoordinatorResult<PreferenceSet> {
        self.requests
            .send(event)
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        answer.await.map_err(|_| CoordinatorError::Stopped)?
    }

    pub async fn shutdown(self) {
        let _ = self.requests.send(CoordinatorEvent::Shutdown).await;
        if let Err(err) = self.task.await {
            error!(target: "vidpace::coordinator", error = %err, "coordinator task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{CommandEnvelope, PageHub};
    use crate::store::MemoryPreferenceStore;
    use vidpace_contracts::command::PageResponse;
    use vidpace_model::{Language, Seconds};

    fn coordinator(store: &MemoryPreferenceStore, hub: &PageHub) -> CoordinatorHandle {
        let config = VidpaceConfig::default();
        Coordinator::new(Arc::new(store.clone()), Arc::new(hub.clone()), &config)
            .spawn(config.channel_capacity)
    }

    /// Opens a page whose agent acknowledges every command and reports the
    /// settings it was sent.
    fn listening_page(hub: &PageHub) -> mpsc::UnboundedReceiver<PreferencePatch> {
        let tab = hub.open_tab("https://example.com/watch");
        let (link, mut commands) = mpsc::channel::<CommandEnvelope>(8);
        let (seen, settings) = mpsc::unbounded_channel();
        hub.attach_agent(tab, link);
        tokio::spawn(async move {
            while let Some(envelope) = commands.recv().await {
                let _ = envelope.reply.send(PageResponse::SettingsApplied);
                match envelope.command {
                    PageCommand::UpdateSettings { settings } => {
                        let _ = seen.send(settings);
                    }
                    other => panic!("unexpected command {other:?}"),
                }
            }
        });
        settings
    }

    #[tokio::test]
    async fn install_writes_stamped_defaults_once() {
        let store = MemoryPreferenceStore::new();
        let handle = coordinator(&store, &PageHub::new());

        let installed = handle.install().await.unwrap();
        assert_eq!(installed, PreferenceSet::stamped(1));
        let record = store.get().await.unwrap();
        assert_eq!(record.len(), PreferenceKey::ALL.len());

        // A later install must not clobber user edits.
        let mut edit = PreferenceRecord::new();
        edit.insert(PreferenceKey::RewindPrimary, 45);
        store.set(edit).await.unwrap();
        let again = handle.install().await.unwrap();
        assert_eq!(again.rewind_primary.get(), 45);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn update_only_stamps_the_version() {
        let mut existing = PreferenceRecord::new();
        existing.insert(PreferenceKey::ForwardPrimary, 120);
        existing.insert(PreferenceKey::Language, "zh");
        let store = MemoryPreferenceStore::with_record(existing);
        let handle = coordinator(&store, &PageHub::new());

        let migrated = handle.update("0.9.0").await.unwrap();
        assert_eq!(migrated.schema_version, 1);
        assert_eq!(migrated.forward_primary.get(), 120);
        assert_eq!(migrated.language, Language::Zh);
        assert!(!store.get().await.unwrap().contains(PreferenceKey::RewindPrimary));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn store_changes_are_relayed_to_pages() {
        let store = MemoryPreferenceStore::new();
        let hub = PageHub::new();
        let mut pushed = listening_page(&hub);
        hub.open_tab("chrome://extensions");
        let handle = coordinator(&store, &hub);
        // Round-trip so the loop is subscribed and running.
        handle.get_settings().await.unwrap();

        let mut edit = PreferenceRecord::new();
        edit.insert(PreferenceKey::RewindSecondary, 15);
        store.set(edit).await.unwrap();

        let settings = pushed.recv().await.unwrap();
        assert_eq!(settings.rewind_secondary, Some(Seconds::new(15).unwrap()));
        assert_eq!(settings.forward_primary, None);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn save_settings_persists_and_pushes_directly() {
        let store = MemoryPreferenceStore::new();
        let hub = PageHub::new();
        let mut pushed = listening_page(&hub);
        let handle = coordinator(&store, &hub);

        let patch = PreferencePatch {
            forward_secondary: Some(Seconds::new(20).unwrap()),
            ..PreferencePatch::default()
        };
        let saved = handle.save_settings(patch.clone()).await.unwrap();
        assert_eq!(saved.forward_secondary.get(), 20);
        assert_eq!(store.load().await.unwrap(), saved);

        // Both the relay and the direct push carry the same merge.
        let first = pushed.recv().await.unwrap();
        let second = pushed.recv().await.unwrap();
        assert_eq!(first.forward_secondary, patch.forward_secondary);
        assert_eq!(second.forward_secondary, patch.forward_secondary);

        let reset = handle.reset_settings().await.unwrap();
        assert_eq!(reset, PreferenceSet::stamped(1));
        handle.shutdown().await;
    }
}
