use super::property::PropertyDescriptor;
use crate::core::{DataType, FindError, Result, Value};
use std::collections::HashSet;
use std::fmt;

/// Mapping of a Rust type `E` onto a table: its columns and primary key.
///
/// Key columns keep the order they were declared in on the builder, which
/// is the order every key lookup uses.
///
/// # Examples
///
/// ```
/// use memofind::{DataType, EntityType};
///
/// struct Order {
///     order_id: i64,
///     tenant_id: i64,
/// }
///
/// let order = EntityType::<Order>::builder("Order")
///     .property("order_id", DataType::Integer, |o: &Order| o.order_id.into())
///     .property("tenant_id", DataType::Integer, |o: &Order| o.tenant_id.into())
///     .primary_key(["tenant_id", "order_id"])
///     .build()
///     .unwrap();
///
/// let key: Vec<&str> = order
///     .find_primary_key()
///     .unwrap()
///     .iter()
///     .map(|p| p.name())
///     .collect();
/// assert_eq!(key, ["tenant_id", "order_id"]);
/// ```
pub struct EntityType<E> {
    name: String,
    table_name: String,
    properties: Vec<PropertyDescriptor<E>>,
    primary_key: Vec<PropertyDescriptor<E>>,
}

impl<E> EntityType<E> {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder<E> {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn properties(&self) -> &[PropertyDescriptor<E>] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor<E>> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Returns the ordered key columns, or `None` for a keyless type.
    pub fn find_primary_key(&self) -> Option<&[PropertyDescriptor<E>]> {
        if self.primary_key.is_empty() {
            None
        } else {
            Some(&self.primary_key)
        }
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Checks a caller-supplied key against the key definition: arity first,
    /// then the type of every component.
    pub fn validate_key(&self, values: &[Value]) -> Result<()> {
        let key = self
            .find_primary_key()
            .ok_or_else(|| FindError::NoPrimaryKey(self.name.clone()))?;

        if key.len() != values.len() {
            return Err(FindError::KeyArity {
                entity: self.name.clone(),
                expected: key.len(),
                actual: values.len(),
            });
        }

        for (property, value) in key.iter().zip(values) {
            if !property.data_type().is_compatible(value) {
                return Err(FindError::KeyTypeMismatch {
                    entity: self.name.clone(),
                    property: property.name().to_string(),
                    expected: property.data_type().to_string(),
                    actual: value.type_name().to_string(),
                });
            }
        }

        Ok(())
    }
}

impl<E> fmt::Debug for EntityType<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key: Vec<&str> = self.primary_key.iter().map(|p| p.name()).collect();
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("properties", &self.properties)
            .field("primary_key", &key)
            .finish()
    }
}

/// Builder for [`EntityType`]. Validation happens in [`build`](Self::build).
pub struct EntityTypeBuilder<E> {
    name: String,
    table_name: Option<String>,
    properties: Vec<PropertyDescriptor<E>>,
    primary_key: Vec<String>,
}

impl<E> EntityTypeBuilder<E> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            properties: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Set the table name (defaults to the lowercased entity name)
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Add a mapped column
    pub fn property<F>(mut self, name: impl Into<String>, data_type: DataType, getter: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        self.properties
            .push(PropertyDescriptor::new(name, data_type, getter));
        self
    }

    /// Declare the primary key columns, in key order
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<EntityType<E>> {
        let mut seen = HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.name()) {
                return Err(FindError::DuplicateProperty {
                    entity: self.name.clone(),
                    property: property.name().to_string(),
                });
            }
        }

        let mut key_seen = HashSet::new();
        let mut primary_key = Vec::with_capacity(self.primary_key.len());
        for column in &self.primary_key {
            if !key_seen.insert(column.as_str()) {
                return Err(FindError::DuplicateKeyProperty {
                    entity: self.name.clone(),
                    property: column.clone(),
                });
            }
            let property = self
                .properties
                .iter()
                .find(|p| p.name() == column)
                .ok_or_else(|| FindError::UnknownKeyProperty {
                    entity: self.name.clone(),
                    property: column.clone(),
                })?;
            primary_key.push(property.clone());
        }

        let table_name = self
            .table_name
            .unwrap_or_else(|| self.name.to_lowercase());

        Ok(EntityType {
            name: self.name,
            table_name,
            properties: self.properties,
            primary_key,
        })
    }
}
