use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use vidpace_config::{KeyBindings, VidpaceConfig};
use vidpace_contracts::command::{PageCommand, PageResponse, SpeedOutcome};
use vidpace_contracts::dom::{
    DocumentHost, DomEvent, DomNode, FeedbackSurface, KeyInput, ObserverId,
};
use vidpace_contracts::messaging::TabId;
use vidpace_contracts::store::PreferenceStore;
use vidpace_model::{PreferencePatch, PreferenceSet, ResolvedLanguage, StoreChange};

use super::feedback::FeedbackOverlay;
use super::tracked::TrackedMedia;
use crate::hub::{CommandEnvelope, PageHub};
use crate::i18n::{self, Message};

/// Everything the agent's event loop reacts to, in arrival order.
pub(crate) enum PageEvent {
    Dom(DomEvent),
    Command(CommandEnvelope),
    StoreChanged(StoreChange),
    FeedbackExpired(u64),
    Snapshot(oneshot::Sender<AgentSnapshot>),
    Shutdown,
}

/// Point-in-time view of an agent's state.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub tab: TabId,
    pub tracked: usize,
    pub bindings: PreferenceSet,
}

/// Per-page controller: discovers media, maps keys to seeks and executes
/// commands from the control surface and coordinator.
pub struct PageAgent {
    tab: TabId,
    document: Arc<dyn DocumentHost>,
    observer: Option<ObserverId>,
    hub: PageHub,
    tracked: TrackedMedia,
    bindings: PreferenceSet,
    key_bindings: KeyBindings,
    ui_locale: String,
    feedback: FeedbackOverlay,
    forwarders: Vec<JoinHandle<()>>,
}

impl fmt::Debug for PageAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAgent")
            .field("tab", &self.tab)
            .field("tracked", &self.tracked.len())
            .field("bindings", &self.bindings)
            .field("key_bindings", &self.key_bindings)
            .field("feedback", &self.feedback)
            .finish()
    }
}

impl PageAgent {
    /// Starts the agent for the page loaded in `tab`.
    ///
    /// Loads the stored preferences (defaults if the store fails), tracks
    /// the media already in the document, subscribes to document and store
    /// changes and registers a command link with the hub. The returned
    /// handle is the only way to reach the running agent.
    pub async fn activate<D>(
        tab: TabId,
        document: Arc<D>,
        store: Arc<dyn PreferenceStore>,
        hub: PageHub,
        config: &VidpaceConfig,
    ) -> PageAgentHandle
    where
        D: DocumentHost + FeedbackSurface + 'static,
    {
        let (events, queue) = mpsc::unbounded_channel();

        // Subscribe before reading so no write slips between the two.
        let changes = store.subscribe();
        let bindings = match store.load().await {
            Ok(bindings) => bindings,
            Err(err) => {
                warn!(target: "vidpace::page", %tab, error = %err, "failed to load preferences; using defaults");
                PreferenceSet::default()
            }
        };

        let host: Arc<dyn DocumentHost> = document.clone();
        let surface: Arc<dyn FeedbackSurface> = document;
        let mut agent = PageAgent {
            tab,
            document: host,
            observer: None,
            hub,
            tracked: TrackedMedia::new(),
            bindings,
            key_bindings: config.key_bindings,
            ui_locale: config.ui_locale.clone(),
            feedback: FeedbackOverlay::new(surface, config.feedback_interval, events.clone()),
            forwarders: Vec::with_capacity(2),
        };

        agent.scan();

        let observer_events = events.clone();
        agent.observer = Some(agent.document.observe(Box::new(move |event| {
            let _ = observer_events.send(PageEvent::Dom(event));
        })));

        agent
            .forwarders
            .push(forward_store_changes(tab, changes, events.clone()));

        let (link, commands) = mpsc::channel(config.channel_capacity.max(1));
        if !agent.hub.attach_agent(tab, link) {
            warn!(target: "vidpace::page", %tab, "tab is not registered with the hub; commands will not reach this agent");
        }
        agent
            .forwarders
            .push(forward_commands(commands, events.clone()));

        info!(target: "vidpace::page", %tab, tracked = agent.tracked.len(), "page agent activated");

        let task = tokio::spawn(agent.run(queue));
        PageAgentHandle { tab, events, task }
    }

    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<PageEvent>) {
        while let Some(event) = queue.recv().await {
            match event {
                PageEvent::Dom(event) => self.handle_dom(event),
                PageEvent::Command(CommandEnvelope { command, reply }) => {
                    let response = self.handle_command(command);
                    if reply.send(response).is_err() {
                        debug!(target: "vidpace::page", tab = %self.tab, "command sender went away before the reply");
                    }
                }
                PageEvent::StoreChanged(change) => {
                    trace!(target: "vidpace::page", tab = %self.tab, keys = change.len(), "store change received");
                    self.apply_settings(&change.to_patch());
                }
                PageEvent::FeedbackExpired(generation) => {
                    self.feedback.expire(generation);
                }
                PageEvent::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                PageEvent::Shutdown => break,
            }
        }
        self.teardown();
    }

    fn scan(&mut self) {
        for element in self.document.media_elements() {
            self.tracked.track(&element);
        }
    }

    fn handle_dom(&mut self, event: DomEvent) {
        match event {
            DomEvent::NodesAdded(nodes) => {
                let found = nodes
                    .iter()
                    .map(|node| self.track_node(node.as_ref()))
                    .sum::<usize>();
                if found > 0 {
                    debug!(target: "vidpace::page", tab = %self.tab, found, tracked = self.tracked.len(), "discovered media elements");
                }
            }
            DomEvent::MediaEmptied(id) => {
                if self.tracked.untrack(id) {
                    debug!(target: "vidpace::page", tab = %self.tab, element = %id, "media element emptied; no longer tracked");
                }
            }
            DomEvent::KeyDown(input) => self.handle_key(&input),
        }
    }

    fn track_node(&mut self, node: &dyn DomNode) -> usize {
        node.media()
            .into_iter()
            .chain(node.descendant_media())
            .filter(|element| self.tracked.track(element))
            .count()
    }

    fn handle_key(&mut self, input: &KeyInput) {
        if input.target.accepts_text_input() {
            return;
        }
        let Some(slot) = self.key_bindings.slot_for(&input.key) else {
            return;
        };
        if self.tracked.is_empty() {
            return;
        }
        let delta = self.bindings.seek_delta(slot);
        let moved = self.tracked.seek(delta);
        trace!(target: "vidpace::page", tab = %self.tab, key = %input.key, delta, moved, "seek shortcut");
        self.feedback.show(&i18n::seek_feedback(delta));
    }

    fn handle_command(&mut self, command: PageCommand) -> PageResponse {
        match command {
            PageCommand::SetSpeed { speed } => {
                let outcome = self.tracked.set_speed(speed);
                let message = match outcome {
                    SpeedOutcome::Applied { count } => Message::SpeedFeedback { speed, count },
                    SpeedOutcome::NoMedia => Message::NoMediaFeedback,
                    SpeedOutcome::NotReady { .. } => Message::NotReadyFeedback,
                };
                debug!(target: "vidpace::page", tab = %self.tab, speed, ?outcome, "speed command");
                self.feedback.show(&message.render(self.language()));
                PageResponse::Speed(outcome)
            }
            PageCommand::UpdateSettings { settings } => {
                self.apply_settings(&settings);
                PageResponse::SettingsApplied
            }
            PageCommand::Seek { delta_seconds } => {
                let moved = self.tracked.seek(delta_seconds);
                if moved > 0 {
                    self.feedback.show(&i18n::seek_feedback(delta_seconds));
                }
                PageResponse::Seeked { moved }
            }
        }
    }

    fn apply_settings(&mut self, patch: &PreferencePatch) {
        if patch.is_empty() {
            return;
        }
        self.bindings.apply(patch);
        debug!(target: "vidpace::page", tab = %self.tab, bindings = ?self.bindings, "settings applied");
    }

    fn language(&self) -> ResolvedLanguage {
        self.bindings.language.resolve(&self.ui_locale)
    }

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            tab: self.tab,
            tracked: self.tracked.len(),
            bindings: self.bindings.clone(),
        }
    }

    fn teardown(&mut self) {
        if let Some(observer) = self.observer.take() {
            self.document.disconnect(observer);
        }
        self.hub.detach_agent(self.tab);
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
        self.feedback.clear();
        info!(target: "vidpace::page", tab = %self.tab, "page agent stopped");
    }
}

fn forward_store_changes(
    tab: TabId,
    mut changes: broadcast::Receiver<StoreChange>,
    events: mpsc::UnboundedSender<PageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if events.send(PageEvent::StoreChanged(change)).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "vidpace::page", %tab, skipped, "page agent fell behind on store changes");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn forward_commands(
    mut commands: mpsc::Receiver<CommandEnvelope>,
    events: mpsc::UnboundedSender<PageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = commands.recv().await {
            if events.send(PageEvent::Command(envelope)).is_err() {
                break;
            }
        }
    })
}

/// Handle to a running [`PageAgent`].
pub struct PageAgentHandle {
    tab: TabId,
    events: mpsc::UnboundedSender<PageEvent>,
    task: JoinHandle<()>,
}

impl fmt::Debug for PageAgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAgentHandle")
            .field("tab", &self.tab)
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl PageAgentHandle {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Returns the agent state once every event queued before this call
    /// has been handled. `None` once the agent has stopped.
    pub async fn snapshot(&self) -> Option<AgentSnapshot> {
        let (reply, answer) = oneshot::channel();
        self.events.send(PageEvent::Snapshot(reply)).ok()?;
        answer.await.ok()
    }

    /// Disconnects the agent from its document and the hub and stops it.
    pub async fn shutdown(self) {
        let _ = self.events.send(PageEvent::Shutdown);
        if let Err(err) = self.task.await {
            error!(target: "vidpace::page", tab = %self.tab, error = %err, "page agent task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::Document;
    use crate::store::MemoryPreferenceStore;
    use std::time::Duration;
    use vidpace_contracts::dom::EventTarget;
    use vidpace_contracts::media::MediaElement;
    use vidpace_contracts::messaging::PageMessenger;
    use vidpace_model::{Language, PreferenceKey, PreferenceRecord, Seconds};

    struct Page {
        hub: PageHub,
        doc: Arc<Document>,
        store: MemoryPreferenceStore,
        agent: PageAgentHandle,
    }

    async fn start(store: MemoryPreferenceStore) -> Page {
        let hub = PageHub::new();
        let tab = hub.open_tab("https://example.com/watch");
        let doc = Arc::new(Document::new());
        let agent = PageAgent::activate(
            tab,
            doc.clone(),
            Arc::new(store.clone()),
            hub.clone(),
            &VidpaceConfig::default(),
        )
        .await;
        Page {
            hub,
            doc,
            store,
            agent,
        }
    }

    fn add_video(doc: &Document, duration: f64, position: f64) -> Arc<dyn MediaElement> {
        let node = doc.create_video();
        let media = node.media_node().unwrap().clone();
        media.load_metadata(duration);
        media.set_current_time(position);
        doc.append_child(&doc.body(), node);
        media
    }

    fn key(key: &str) -> KeyInput {
        KeyInput::new(key, EventTarget::element("body"))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn nested_and_repeated_insertions_track_once() {
        let page = start(MemoryPreferenceStore::new()).await;
        let doc = &page.doc;

        let wrapper = doc.create_element("div");
        let inner = doc.create_video();
        doc.append_child(&wrapper, inner.clone());
        doc.append_child(&doc.body(), wrapper.clone());
        doc.append_child(&doc.body(), doc.create_video());
        // Re-inserting the same subtree must not double-track.
        doc.append_child(&doc.body(), wrapper);

        let snapshot = page.agent.snapshot().await.unwrap();
        assert_eq!(snapshot.tracked, 2);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn existing_media_is_tracked_on_activation() {
        let hub = PageHub::new();
        let tab = hub.open_tab("https://example.com");
        let doc = Arc::new(Document::new());
        add_video(&doc, 50.0, 0.0);
        add_video(&doc, 50.0, 0.0);

        let agent = PageAgent::activate(
            tab,
            doc.clone(),
            Arc::new(MemoryPreferenceStore::new()),
            hub.clone(),
            &VidpaceConfig::default(),
        )
        .await;
        assert_eq!(agent.snapshot().await.unwrap().tracked, 2);
        assert!(hub.has_agent(tab));

        agent.shutdown().await;
        assert!(!hub.has_agent(tab));
    }

    #[tokio::test]
    async fn emptied_media_is_no_longer_controlled() {
        let page = start(MemoryPreferenceStore::new()).await;
        let node = page.doc.create_video();
        let media = node.media_node().unwrap().clone();
        media.load_metadata(100.0);
        page.doc.append_child(&page.doc.body(), node.clone());
        page.doc.empty_media(&node);
        media.load_metadata(100.0);
        media.set_current_time(50.0);

        let tab = page.agent.tab();
        let response = page
            .hub
            .send(tab, PageCommand::SetSpeed { speed: 2.0 })
            .await
            .unwrap();
        assert_eq!(response, PageResponse::Speed(SpeedOutcome::NoMedia));
        assert_eq!(media.playback_rate(), 1.0);

        let response = page
            .hub
            .send(tab, PageCommand::Seek { delta_seconds: 10.0 })
            .await
            .unwrap();
        assert_eq!(response, PageResponse::Seeked { moved: 0 });
        assert_eq!(media.current_time(), 50.0);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn speed_applies_to_ready_elements_only() {
        let page = start(MemoryPreferenceStore::new()).await;
        let ready = add_video(&page.doc, 60.0, 0.0);
        let loading = page.doc.create_video();
        page.doc.append_child(&page.doc.body(), loading.clone());

        let response = page
            .hub
            .send(page.agent.tab(), PageCommand::SetSpeed { speed: 1.5 })
            .await
            .unwrap();
        assert_eq!(response, PageResponse::Speed(SpeedOutcome::Applied { count: 1 }));
        assert_eq!(ready.playback_rate(), 1.5);
        assert_eq!(loading.media_node().unwrap().playback_rate(), 1.0);
        assert_eq!(page.doc.overlay_text().as_deref(), Some("1.5x (1 video)"));
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn shortcuts_seek_by_bound_seconds() {
        let page = start(MemoryPreferenceStore::new()).await;
        let media = add_video(&page.doc, 100.0, 50.0);

        page.doc.dispatch_key(key("z"));
        page.agent.snapshot().await.unwrap();
        assert_eq!(media.current_time(), 20.0);
        assert_eq!(page.doc.overlay_text().as_deref(), Some("-30s"));

        page.doc.dispatch_key(key("C"));
        page.agent.snapshot().await.unwrap();
        assert_eq!(media.current_time(), 30.0);
        assert_eq!(page.doc.overlay_text().as_deref(), Some("+10s"));

        page.doc.dispatch_key(key("q"));
        page.agent.snapshot().await.unwrap();
        assert_eq!(media.current_time(), 30.0);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn shortcuts_are_ignored_in_text_fields() {
        let page = start(MemoryPreferenceStore::new()).await;
        let media = add_video(&page.doc, 100.0, 50.0);

        page.doc
            .dispatch_key(KeyInput::new("v", EventTarget::element("input")));
        page.doc
            .dispatch_key(KeyInput::new("x", EventTarget::editable("div")));
        page.agent.snapshot().await.unwrap();

        assert_eq!(media.current_time(), 50.0);
        assert_eq!(page.doc.overlay_text(), None);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn shortcuts_without_media_are_silent() {
        let page = start(MemoryPreferenceStore::new()).await;
        page.doc.dispatch_key(key("z"));
        page.agent.snapshot().await.unwrap();
        assert_eq!(page.doc.overlay_text(), None);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn update_settings_is_an_idempotent_merge() {
        let page = start(MemoryPreferenceStore::new()).await;
        let patch = PreferencePatch {
            rewind_primary: Some(Seconds::new(45).unwrap()),
            language: Some(Language::Zh),
            ..PreferencePatch::default()
        };

        for _ in 0..2 {
            let response = page
                .hub
                .send(
                    page.agent.tab(),
                    PageCommand::UpdateSettings {
                        settings: patch.clone(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(response, PageResponse::SettingsApplied);
        }

        let mut expected = PreferenceSet::default();
        expected.apply(&patch);
        let bindings = page.agent.snapshot().await.unwrap().bindings;
        assert_eq!(bindings, expected);
        assert_eq!(bindings.rewind_secondary, PreferenceSet::DEFAULT_REWIND_SECONDARY);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn store_changes_reach_the_bindings() {
        let page = start(MemoryPreferenceStore::new()).await;

        let mut update = PreferenceRecord::new();
        update.insert(PreferenceKey::ForwardPrimary, 90);
        page.store.set(update).await.unwrap();

        let mut forward = 0;
        for _ in 0..20 {
            settle().await;
            forward = page.agent.snapshot().await.unwrap().bindings.forward_primary.get();
            if forward == 90 {
                break;
            }
        }
        assert_eq!(forward, 90);
        page.agent.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn newer_feedback_outlives_the_older_timer() {
        let page = start(MemoryPreferenceStore::new()).await;
        add_video(&page.doc, 100.0, 50.0);

        page.doc.dispatch_key(key("z"));
        page.agent.snapshot().await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;

        page.doc.dispatch_key(key("x"));
        page.agent.snapshot().await.unwrap();
        assert_eq!(page.doc.overlay_text().as_deref(), Some("-10s"));

        // First timer fires at 1000ms; the overlay belongs to the second.
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        page.agent.snapshot().await.unwrap();
        assert_eq!(page.doc.overlay_text().as_deref(), Some("-10s"));

        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;
        page.agent.snapshot().await.unwrap();
        assert_eq!(page.doc.overlay_text(), None);
        page.agent.shutdown().await;
    }

    #[tokio::test]
    async fn failed_store_read_falls_back_to_defaults() {
        use async_trait::async_trait;
        use vidpace_contracts::store::{StoreError, StoreResult};

        struct Broken(broadcast::Sender<StoreChange>);

        #[async_trait]
        impl PreferenceStore for Broken {
            async fn get(&self) -> StoreResult<PreferenceRecord> {
                Err(StoreError::Unavailable("offline".into()))
            }
            async fn set(&self, _: PreferenceRecord) -> StoreResult<()> {
                Err(StoreError::Unavailable("offline".into()))
            }
            fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
                self.0.subscribe()
            }
        }

        let hub = PageHub::new();
        let tab = hub.open_tab("https://example.com");
        let agent = PageAgent::activate(
            tab,
            Arc::new(Document::new()),
            Arc::new(Broken(broadcast::channel(4).0)),
            hub,
            &VidpaceConfig::default(),
        )
        .await;
        assert_eq!(
            agent.snapshot().await.unwrap().bindings,
            PreferenceSet::default()
        );
        agent.shutdown().await;
    }
}
