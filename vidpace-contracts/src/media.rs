use std::fmt;

/// Identity of a media element within one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Load progress of a media element, ordered from nothing to enough data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether duration and dimensions are known, the threshold for
    /// accepting a playback-rate change.
    pub fn has_metadata(self) -> bool {
        self >= ReadyState::HaveMetadata
    }
}

/// A live media element owned by the page document.
///
/// Implementations use interior mutability; the page agent only ever holds
/// a weak reference.
pub trait MediaElement: fmt::Debug + Send + Sync {
    fn id(&self) -> ElementId;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// Length in seconds; `NaN` until metadata is loaded, infinite for live
    /// streams.
    fn duration(&self) -> f64;

    fn ready_state(&self) -> ReadyState;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);
}
