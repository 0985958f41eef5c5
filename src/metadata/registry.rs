use super::entity_type::EntityType;
use crate::core::{FindError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredModel {
    name: String,
    entity_type: Arc<dyn Any + Send + Sync>,
}

/// Maps Rust types to their registered [`EntityType`].
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<TypeId, RegisteredModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: 'static>(&mut self, entity_type: EntityType<E>) -> Result<Arc<EntityType<E>>> {
        let type_id = TypeId::of::<E>();
        if let Some(existing) = self.models.get(&type_id) {
            return Err(FindError::DuplicateEntityType(existing.name.clone()));
        }

        let entity_type = Arc::new(entity_type);
        self.models.insert(
            type_id,
            RegisteredModel {
                name: entity_type.name().to_string(),
                entity_type: entity_type.clone(),
            },
        );
        Ok(entity_type)
    }

    pub fn entity_type<E: 'static>(&self) -> Result<Arc<EntityType<E>>> {
        let model = self
            .models
            .get(&TypeId::of::<E>())
            .ok_or_else(|| FindError::UnknownEntityType(std::any::type_name::<E>().to_string()))?;

        model
            .entity_type
            .clone()
            .downcast::<EntityType<E>>()
            .map_err(|_| FindError::UnknownEntityType(model.name.clone()))
    }

    pub fn contains<E: 'static>(&self) -> bool {
        self.models.contains_key(&TypeId::of::<E>())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered entity names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.values().map(|m| m.name.clone()).collect();
        names.sort();
        names
    }
}
