use crate::core::{FindError, Result};
use crate::key::KeyValues;
use std::any::{Any, TypeId};
use std::collections::HashMap;

type Table<E> = HashMap<KeyValues, E>;

/// One keyed table per entity type. Backs both the row store and the
/// identity map.
#[derive(Default)]
pub(crate) struct EntityTables {
    tables: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EntityTables {
    pub(crate) fn get<E: 'static>(&self, key: &KeyValues) -> Option<&E> {
        self.table::<E>()?.get(key)
    }

    pub(crate) fn contains<E: 'static>(&self, key: &KeyValues) -> bool {
        self.get::<E>(key).is_some()
    }

    pub(crate) fn len<E: 'static>(&self) -> usize {
        self.table::<E>().map_or(0, HashMap::len)
    }

    pub(crate) fn values<E: Clone + 'static>(&self) -> Vec<E> {
        self.table::<E>()
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn insert<E: Send + Sync + 'static>(&mut self, key: KeyValues, entity: E) -> Result<Option<E>> {
        Ok(self.table_mut::<E>()?.insert(key, entity))
    }

    pub(crate) fn remove<E: Send + Sync + 'static>(&mut self, key: &KeyValues) -> Result<Option<E>> {
        Ok(self.table_mut::<E>()?.remove(key))
    }

    pub(crate) fn clear(&mut self) {
        self.tables.clear();
    }

    fn table<E: 'static>(&self) -> Option<&Table<E>> {
        self.tables.get(&TypeId::of::<E>())?.downcast_ref()
    }

    fn table_mut<E: Send + Sync + 'static>(&mut self) -> Result<&mut Table<E>> {
        self.tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::new()) as Box<dyn Any + Send + Sync>)
            .downcast_mut()
            .ok_or_else(|| {
                FindError::Store(format!(
                    "table for '{}' holds a different type",
                    std::any::type_name::<E>()
                ))
            })
    }
}
