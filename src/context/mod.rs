//! In-memory persistence context supplying the metadata and the
//! find-by-key primitive that key resolution builds on.

pub mod config;
pub mod entity_set;
pub mod persist_context;
mod tables;

pub use config::{ContextConfig, TrackingMode};
pub use entity_set::EntitySet;
pub use persist_context::{ContextStats, PersistContext};
