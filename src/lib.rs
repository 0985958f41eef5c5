// ============================================================================
// memofind Library
// ============================================================================

//! Resolve the tracked or stored counterpart of an entity instance from its
//! primary key, without the caller extracting or ordering key columns.
//!
//! The key columns and their order come from the registered
//! [`EntityType`]; [`resolve_tracked`] reads them off the instance and hands
//! the ordered [`KeyValues`] to a [`KeyFinder`].

pub mod cancel;
pub mod context;
pub mod core;
pub mod key;
pub mod metadata;

pub use cancel::CancellationSignal;
pub use context::{ContextConfig, ContextStats, EntitySet, PersistContext, TrackingMode};
pub use crate::core::{DataType, FindError, Result, Value};
pub use key::{KeyFinder, KeyValues, extract_key_values, resolve_tracked};
pub use metadata::{
    EntityType, EntityTypeBuilder, MetadataSource, ModelRegistry, PropertyDescriptor, ValueGetter,
};
