//! The per-page agent and the in-memory page it can run against.

mod agent;
pub mod dom;
mod feedback;
mod tracked;

pub use agent::{AgentSnapshot, PageAgent, PageAgentHandle};
pub use dom::{Document, MediaNode, Node};
pub use tracked::TrackedMedia;
