use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::command::{PageCommand, PageResponse};

/// Identity of an open page (browser tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Why a command did not reach a page agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No agent is loaded in the page (closed tab, system page, or a page
    /// that predates the agent).
    #[error("no page agent is listening in {0}")]
    NoReceiver(TabId),

    /// The agent went away before answering.
    #[error("page agent in {0} dropped the command")]
    Disconnected(TabId),
}

/// Point-to-point command delivery to page agents.
#[async_trait]
pub trait PageMessenger: Send + Sync {
    /// Every open page, with or without a loaded agent.
    fn open_tabs(&self) -> Vec<TabId>;

    /// The page currently focused by the user.
    fn active_tab(&self) -> Option<TabId>;

    /// Sends one command and waits for the agent's answer. At most once: a
    /// failed send is never retried.
    async fn send(
        &self,
        tab: TabId,
        command: PageCommand,
    ) -> Result<PageResponse, DeliveryError>;

    /// Fire-and-forget fan-out to every open page. Delivery failures are
    /// swallowed; returns how many agents acknowledged.
    async fn broadcast(&self, command: PageCommand) -> usize {
        let mut delivered = 0;
        for tab in self.open_tabs() {
            match self.send(tab, command.clone()).await {
                Ok(_) => delivered += 1,
                Err(err) => {
                    debug!(target: "vidpace::hub", %tab, action = command.name(), error = %err, "broadcast skipped page");
                }
            }
        }
        delivered
    }
}
