use crate::core::{DataType, Value};
use std::fmt;
use std::sync::Arc;

/// Reads one column value off an entity instance.
pub type ValueGetter<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

/// Schema-level description of one mapped column of `E`.
///
/// The getter is resolved when the model is registered, so reading a value
/// never involves a lookup by name.
pub struct PropertyDescriptor<E> {
    name: String,
    data_type: DataType,
    getter: ValueGetter<E>,
}

impl<E> PropertyDescriptor<E> {
    pub fn new<F>(name: impl Into<String>, data_type: DataType, getter: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            data_type,
            getter: Arc::new(getter),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn get_value(&self, entity: &E) -> Value {
        (self.getter)(entity)
    }
}

impl<E> Clone for PropertyDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            data_type: self.data_type,
            getter: Arc::clone(&self.getter),
        }
    }
}

impl<E> fmt::Debug for PropertyDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}
