//! Runtime components of vidpace.
//!
//! Three contexts run side by side and only talk through the preference
//! store and the page hub:
//!
//! - [`page::PageAgent`], one per loaded page, tracks media elements and
//!   turns key presses and commands into seeks and rate changes;
//! - [`surface::ControlSurface`], the settings panel, edits and saves
//!   preferences and sends speed presets to the focused page;
//! - [`coordinator::Coordinator`] installs and migrates preferences and
//!   relays every store change to all pages.
//!
//! Each context is a tokio task draining one ordered queue.
#![allow(missing_docs)]

pub mod coordinator;
pub mod hub;
pub mod i18n;
pub mod page;
pub mod store;
pub mod surface;

pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorHandle, CoordinatorRequest,
    InstallReason,
};
pub use hub::{CommandEnvelope, PageHub};
pub use page::{AgentSnapshot, Document, PageAgent, PageAgentHandle};
pub use store::{FilePreferenceStore, MemoryPreferenceStore};
pub use surface::{
    ControlSurface, Notification, NotificationKind, SettingsForm, SurfaceError,
    SurfaceHandle, SurfaceView,
};
