//! Core data model shared by the page agent, control surface and
//! coordinator.
//!
//! Everything that crosses a context boundary (stored records, change
//! notifications, settings patches) is defined here so the three contexts
//! agree on one shape.
#![allow(missing_docs)]

pub mod change;
pub mod error;
pub mod language;
pub mod preferences;
pub mod seconds;

pub use change::{StoreChange, ValueChange};
pub use error::{ModelError, Result as ModelResult};
pub use language::{Language, ResolvedLanguage};
pub use preferences::{
    PreferenceKey, PreferencePatch, PreferenceRecord, PreferenceSet, SeekSlot,
};
pub use seconds::Seconds;
