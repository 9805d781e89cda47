//! Trait surfaces and wire contracts shared by the vidpace contexts.
//!
//! The host platform (page documents, media elements, the replicated
//! preference store, tab messaging) is only ever reached through the traits
//! in this crate, so the components in `vidpace-core` can run against the
//! in-memory implementations in tests and against a real host elsewhere.

pub mod command;
pub mod dom;
pub mod media;
pub mod messaging;
pub mod store;

/// Frequently used contracts for component crates.
pub mod prelude {
    pub use super::command::{PageCommand, PageResponse, SpeedOutcome};
    pub use super::dom::{
        DocumentHost, DomEvent, DomNode, DomObserver, EventTarget,
        FeedbackSurface, KeyInput, ObserverId,
    };
    pub use super::media::{ElementId, MediaElement, ReadyState};
    pub use super::messaging::{DeliveryError, PageMessenger, TabId};
    pub use super::store::{PreferenceStore, StoreError, StoreResult};
}
