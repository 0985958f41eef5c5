//! Schema metadata: how a Rust type maps onto columns and which of those
//! columns form its primary key.

pub mod entity_type;
pub mod property;
pub mod registry;

pub use entity_type::{EntityType, EntityTypeBuilder};
pub use property::{PropertyDescriptor, ValueGetter};
pub use registry::ModelRegistry;

use crate::core::Result;
use std::sync::Arc;

/// Anything that can describe the mapping of `E`.
///
/// Errors raised here (typically [`FindError::UnknownEntityType`]) are passed
/// through to the caller of a key lookup untouched.
///
/// [`FindError::UnknownEntityType`]: crate::FindError::UnknownEntityType
pub trait MetadataSource<E> {
    fn entity_type(&self) -> Result<Arc<EntityType<E>>>;
}

impl<E: 'static> MetadataSource<E> for ModelRegistry {
    fn entity_type(&self) -> Result<Arc<EntityType<E>>> {
        ModelRegistry::entity_type::<E>(self)
    }
}

impl<E> MetadataSource<E> for Arc<EntityType<E>> {
    fn entity_type(&self) -> Result<Arc<EntityType<E>>> {
        Ok(Arc::clone(self))
    }
}
