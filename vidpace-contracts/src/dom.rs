//! The slice of a page document the page agent observes.

use std::fmt;
use std::sync::Arc;

use crate::media::{ElementId, MediaElement};

/// A node inserted into the document.
pub trait DomNode: fmt::Debug + Send + Sync {
    /// The node itself, if it is a media element.
    fn media(&self) -> Option<Arc<dyn MediaElement>>;

    /// Media elements anywhere below this node.
    fn descendant_media(&self) -> Vec<Arc<dyn MediaElement>>;
}

/// Target of a keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventTarget {
    pub tag_name: String,
    pub content_editable: bool,
}

impl EventTarget {
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            content_editable: false,
        }
    }

    pub fn editable(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            content_editable: true,
        }
    }

    /// Text fields and content-editable regions receive typed characters;
    /// shortcuts must not fire there.
    pub fn accepts_text_input(&self) -> bool {
        self.content_editable
            || self.tag_name.eq_ignore_ascii_case("input")
            || self.tag_name.eq_ignore_ascii_case("textarea")
    }
}

/// A key-down event as dispatched on the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    /// Key value, e.g. `"z"`, `"Z"` or `"ArrowLeft"`.
    pub key: String,
    pub target: EventTarget,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, target: EventTarget) -> Self {
        Self {
            key: key.into(),
            target,
        }
    }
}

/// Notifications a document delivers to its observers.
#[derive(Debug, Clone)]
pub enum DomEvent {
    /// Nodes were inserted somewhere in the document subtree.
    NodesAdded(Vec<Arc<dyn DomNode>>),
    /// A media element was emptied (source removed or reloaded).
    MediaEmptied(ElementId),
    KeyDown(KeyInput),
}

/// Callback registered with [`DocumentHost::observe`].
pub type DomObserver = Box<dyn Fn(DomEvent) + Send + Sync>;

/// Handle returned by [`DocumentHost::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// The page document as seen by the agent.
pub trait DocumentHost: Send + Sync {
    /// Every media element currently in the document.
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>>;

    /// Registers an observer for subtree insertions, media "emptied"
    /// signals and key-down events. Stays registered until disconnected.
    fn observe(&self, observer: DomObserver) -> ObserverId;

    fn disconnect(&self, id: ObserverId);
}

/// On-page transient feedback overlay.
pub trait FeedbackSurface: Send + Sync {
    fn show(&self, text: &str);

    fn hide(&self);
}
