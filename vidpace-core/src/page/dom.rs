//! In-memory page document.
//!
//! A small tree of element nodes, some of which carry a media element. It
//! implements [`DocumentHost`] and [`FeedbackSurface`] so a page agent can
//! run against it exactly as it would against a live page.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vidpace_contracts::dom::{
    DocumentHost, DomEvent, DomNode, DomObserver, FeedbackSurface, KeyInput,
    ObserverId,
};
use vidpace_contracts::media::{ElementId, MediaElement, ReadyState};

#[derive(Debug, Clone, Copy)]
struct MediaState {
    current_time: f64,
    duration: f64,
    playback_rate: f64,
    ready_state: ReadyState,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: f64::NAN,
            playback_rate: 1.0,
            ready_state: ReadyState::HaveNothing,
        }
    }
}

/// A `<video>` or `<audio>` element.
#[derive(Debug)]
pub struct MediaNode {
    id: ElementId,
    state: Mutex<MediaState>,
}

impl MediaNode {
    fn new(id: ElementId) -> Self {
        Self {
            id,
            state: Mutex::new(MediaState::default()),
        }
    }

    /// Simulates metadata arriving: duration becomes known.
    pub fn load_metadata(&self, duration: f64) {
        let mut state = self.state.lock();
        state.duration = duration;
        state.ready_state = state.ready_state.max(ReadyState::HaveMetadata);
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.lock().ready_state = ready_state;
    }

    fn reset(&self) {
        *self.state.lock() = MediaState::default();
    }
}

impl MediaElement for MediaNode {
    fn id(&self) -> ElementId {
        self.id
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().current_time = seconds;
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().playback_rate = rate;
    }
}

/// An element in the document tree.
#[derive(Debug)]
pub struct Node {
    tag_name: String,
    content_editable: bool,
    media: Option<Arc<MediaNode>>,
    children: Mutex<Vec<Arc<Node>>>,
}

impl Node {
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn is_content_editable(&self) -> bool {
        self.content_editable
    }

    pub fn media_node(&self) -> Option<&Arc<MediaNode>> {
        self.media.as_ref()
    }

    fn collect_media(&self, out: &mut Vec<Arc<dyn MediaElement>>) {
        for child in self.children.lock().iter() {
            if let Some(media) = &child.media {
                out.push(media.clone());
            }
            child.collect_media(out);
        }
    }

    fn contains(&self, target: &Arc<Node>) -> bool {
        self.children
            .lock()
            .iter()
            .any(|child| Arc::ptr_eq(child, target) || child.contains(target))
    }
}

impl DomNode for Node {
    fn media(&self) -> Option<Arc<dyn MediaElement>> {
        self.media
            .clone()
            .map(|media| media as Arc<dyn MediaElement>)
    }

    fn descendant_media(&self) -> Vec<Arc<dyn MediaElement>> {
        let mut found = Vec::new();
        self.collect_media(&mut found);
        found
    }
}

#[derive(Debug, Default, Clone)]
struct Overlay {
    text: String,
    visible: bool,
}

type SharedObserver = Arc<dyn Fn(DomEvent) + Send + Sync>;

/// The in-memory document.
pub struct Document {
    body: Arc<Node>,
    observers: Mutex<Vec<(ObserverId, SharedObserver)>>,
    overlay: Mutex<Overlay>,
    next_id: AtomicU64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("media_count", &self.media_elements().len())
            .field("observer_count", &self.observers.lock().len())
            .field("overlay", &*self.overlay.lock())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            body: Arc::new(Node {
                tag_name: "body".into(),
                content_editable: false,
                media: None,
                children: Mutex::new(Vec::new()),
            }),
            observers: Mutex::new(Vec::new()),
            overlay: Mutex::new(Overlay::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn body(&self) -> Arc<Node> {
        self.body.clone()
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag_name: impl Into<String>) -> Arc<Node> {
        Arc::new(Node {
            tag_name: tag_name.into(),
            content_editable: false,
            media: None,
            children: Mutex::new(Vec::new()),
        })
    }

    /// Creates a detached content-editable element.
    pub fn create_editable(&self, tag_name: impl Into<String>) -> Arc<Node> {
        Arc::new(Node {
            tag_name: tag_name.into(),
            content_editable: true,
            media: None,
            children: Mutex::new(Vec::new()),
        })
    }

    /// Creates a detached `<video>` element without metadata.
    pub fn create_video(&self) -> Arc<Node> {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Arc::new(Node {
            tag_name: "video".into(),
            content_editable: false,
            media: Some(Arc::new(MediaNode::new(id))),
            children: Mutex::new(Vec::new()),
        })
    }

    /// Whether the node is attached below `<body>`.
    pub fn is_connected(&self, node: &Arc<Node>) -> bool {
        Arc::ptr_eq(&self.body, node) || self.body.contains(node)
    }

    /// Appends `child` to `parent`. Observers hear about it only when the
    /// parent is attached to the document.
    pub fn append_child(&self, parent: &Arc<Node>, child: Arc<Node>) {
        parent.children.lock().push(child.clone());
        if self.is_connected(parent) {
            self.notify(DomEvent::NodesAdded(vec![child as Arc<dyn DomNode>]));
        }
    }

    /// Detaches `child` from `parent`. Removal is not observed.
    pub fn remove_child(&self, parent: &Arc<Node>, child: &Arc<Node>) -> bool {
        let mut children = parent.children.lock();
        let before = children.len();
        children.retain(|existing| !Arc::ptr_eq(existing, child));
        before != children.len()
    }

    /// Drops the media resource of a video and fires its "emptied" event.
    pub fn empty_media(&self, node: &Arc<Node>) {
        if let Some(media) = node.media_node() {
            media.reset();
            self.notify(DomEvent::MediaEmptied(media.id()));
        }
    }

    pub fn dispatch_key(&self, input: KeyInput) {
        self.notify(DomEvent::KeyDown(input));
    }

    /// Text of the feedback overlay while it is visible.
    pub fn overlay_text(&self) -> Option<String> {
        let overlay = self.overlay.lock();
        overlay.visible.then(|| overlay.text.clone())
    }

    fn notify(&self, event: DomEvent) {
        // Observers run without the registry lock held.
        let observers: Vec<SharedObserver> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(event.clone());
        }
    }
}

impl DocumentHost for Document {
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>> {
        self.body.descendant_media()
    }

    fn observe(&self, observer: DomObserver) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::from(observer)));
        id
    }

    fn disconnect(&self, id: ObserverId) {
        self.observers.lock().retain(|(existing, _)| *existing != id);
    }
}

impl FeedbackSurface for Document {
    fn show(&self, text: &str) {
        let mut overlay = self.overlay.lock();
        overlay.text = text.to_string();
        overlay.visible = true;
    }

    fn hide(&self) {
        self.overlay.lock().visible = false;
    }
}
