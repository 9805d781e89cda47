//! Registry of open pages and the command links of their agents.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use vidpace_contracts::command::{PageCommand, PageResponse};
use vidpace_contracts::messaging::{DeliveryError, PageMessenger, TabId};

/// A command in flight to a page agent, paired with its reply slot.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: PageCommand,
    pub reply: oneshot::Sender<PageResponse>,
}

/// Link a page agent registers to receive commands.
pub type AgentLink = mpsc::Sender<CommandEnvelope>;

#[derive(Debug)]
struct TabEntry {
    url: String,
    /// Absent until an agent loads in the page.
    link: Option<AgentLink>,
}

/// Tab registry implementing [`PageMessenger`].
///
/// Pages exist independently of agents: a page that was open before the
/// agent could load, or a system page where it never loads, is listed by
/// [`PageMessenger::open_tabs`] but answers every send with
/// [`DeliveryError::NoReceiver`].
#[derive(Clone)]
pub struct PageHub {
    tabs: Arc<DashMap<TabId, TabEntry>>,
    active: Arc<RwLock<Option<TabId>>>,
    next_id: Arc<AtomicU32>,
}

impl fmt::Debug for PageHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agents = self
            .tabs
            .iter()
            .filter(|entry| entry.link.is_some())
            .count();
        f.debug_struct("PageHub")
            .field("tab_count", &self.tabs.len())
            .field("agent_count", &agents)
            .field("active", &*self.active.read())
            .finish()
    }
}

impl Default for PageHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PageHub {
    pub fn new() -> Self {
        Self {
            tabs: Arc::new(DashMap::new()),
            active: Arc::new(RwLock::new(None)),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Opens a page and focuses it.
    pub fn open_tab(&self, url: impl Into<String>) -> TabId {
        let tab = TabId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let url = url.into();
        debug!(target: "vidpace::hub", %tab, %url, "tab opened");
        self.tabs.insert(tab, TabEntry { url, link: None });
        *self.active.write() = Some(tab);
        tab
    }

    pub fn close_tab(&self, tab: TabId) {
        if self.tabs.remove(&tab).is_some() {
            debug!(target: "vidpace::hub", %tab, "tab closed");
        }
        let mut active = self.active.write();
        if *active == Some(tab) {
            *active = None;
        }
    }

    /// Focuses an open page. Returns `false` for unknown tabs.
    pub fn activate(&self, tab: TabId) -> bool {
        if !self.tabs.contains_key(&tab) {
            return false;
        }
        *self.active.write() = Some(tab);
        true
    }

    pub fn url(&self, tab: TabId) -> Option<String> {
        self.tabs.get(&tab).map(|entry| entry.url.clone())
    }

    /// Registers the command link of an agent loaded in `tab`, replacing
    /// any earlier one. Returns `false` if the tab is not open.
    pub fn attach_agent(&self, tab: TabId, link: AgentLink) -> bool {
        match self.tabs.get_mut(&tab) {
            Some(mut entry) => {
                entry.link = Some(link);
                trace!(target: "vidpace::hub", %tab, "agent attached");
                true
            }
            None => false,
        }
    }

    pub fn detach_agent(&self, tab: TabId) {
        if let Some(mut entry) = self.tabs.get_mut(&tab) {
            entry.link = None;
            trace!(target: "vidpace::hub", %tab, "agent detached");
        }
    }

    pub fn has_agent(&self, tab: TabId) -> bool {
        self.tabs
            .get(&tab)
            .is_some_and(|entry| entry.link.as_ref().is_some_and(|l| !l.is_closed()))
    }

    fn link(&self, tab: TabId) -> Option<AgentLink> {
        self.tabs.get(&tab).and_then(|entry| entry.link.clone())
    }
}

#[async_trait]
impl PageMessenger for PageHub {
    fn open_tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.tabs.iter().map(|entry| *entry.key()).collect();
        tabs.sort();
        tabs
    }

    fn active_tab(&self) -> Option<TabId> {
        *self.active.read()
    }

    async fn send(
        &self,
        tab: TabId,
        command: PageCommand,
    ) -> Result<PageResponse, DeliveryError> {
        // The map guard is released before awaiting.
        let link = self.link(tab).ok_or(DeliveryError::NoReceiver(tab))?;

        let (reply, answer) = oneshot::channel();
        link.send(CommandEnvelope { command, reply })
            .await
            .map_err(|_| DeliveryError::NoReceiver(tab))?;
        answer.await.map_err(|_| DeliveryError::Disconnected(tab))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidpace_contracts::command::SpeedOutcome;

    fn echo_agent(hub: &PageHub, tab: TabId) {
        let (tx, mut rx) = mpsc::channel::<CommandEnvelope>(4);
        assert!(hub.attach_agent(tab, tx));
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let response = match envelope.command {
                    PageCommand::SetSpeed { .. } => {
                        PageResponse::Speed(SpeedOutcome::Applied { count: 1 })
                    }
                    PageCommand::UpdateSettings { .. } => PageResponse::SettingsApplied,
                    PageCommand::Seek { .. } => PageResponse::Seeked { moved: 1 },
                };
                let _ = envelope.reply.send(response);
            }
        });
    }

    #[tokio::test]
    async fn pages_without_agent_have_no_receiver() {
        let hub = PageHub::new();
        let tab = hub.open_tab("about:blank");

        let err = hub
            .send(tab, PageCommand::SetSpeed { speed: 2.0 })
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::NoReceiver(tab));

        let closed = TabId(99);
        let err = hub
            .send(closed, PageCommand::Seek { delta_seconds: 5.0 })
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::NoReceiver(closed));
    }

    #[tokio::test]
    async fn agent_that_drops_the_reply_is_disconnected() {
        let hub = PageHub::new();
        let tab = hub.open_tab("https://example.com/watch");
        let (tx, mut rx) = mpsc::channel::<CommandEnvelope>(1);
        hub.attach_agent(tab, tx);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                drop(envelope);
            }
        });

        let err = hub
            .send(tab, PageCommand::Seek { delta_seconds: 1.0 })
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Disconnected(tab));
    }

    #[tokio::test]
    async fn broadcast_swallows_missing_agents() {
        let hub = PageHub::new();
        let with_agent = hub.open_tab("https://example.com/a");
        let _without = hub.open_tab("chrome://settings");
        let also_with = hub.open_tab("https://example.com/b");
        echo_agent(&hub, with_agent);
        echo_agent(&hub, also_with);

        let delivered = hub
            .broadcast(PageCommand::UpdateSettings {
                settings: Default::default(),
            })
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(hub.open_tabs().len(), 3);
    }

    #[test]
    fn focus_follows_open_and_close() {
        let hub = PageHub::new();
        let first = hub.open_tab("https://example.com/1");
        let second = hub.open_tab("https://example.com/2");
        assert_eq!(hub.active_tab(), Some(second));

        assert!(hub.activate(first));
        assert_eq!(hub.active_tab(), Some(first));

        hub.close_tab(first);
        assert_eq!(hub.active_tab(), None);
        assert!(!hub.activate(first));
        assert_eq!(hub.url(second).as_deref(), Some("https://example.com/2"));
    }
}
