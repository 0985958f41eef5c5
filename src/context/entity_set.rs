use super::persist_context::PersistContext;
use crate::cancel::CancellationSignal;
use crate::core::{Result, Value};
use crate::key::{KeyFinder, KeyValues, resolve_tracked};
use crate::metadata::{EntityType, MetadataSource};
use async_trait::async_trait;
use std::sync::Arc;

/// Collection-scoped view of one entity type inside a [`PersistContext`].
///
/// The entity type is resolved when the set is created, so lookups through
/// the set never touch the context registry.
pub struct EntitySet<E> {
    context: PersistContext,
    entity_type: Arc<EntityType<E>>,
}

impl<E> Clone for EntitySet<E> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            entity_type: Arc::clone(&self.entity_type),
        }
    }
}

impl<E> EntitySet<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) fn new(context: PersistContext, entity_type: Arc<EntityType<E>>) -> Self {
        Self {
            context,
            entity_type,
        }
    }

    pub fn entity_type(&self) -> &Arc<EntityType<E>> {
        &self.entity_type
    }

    pub fn context(&self) -> &PersistContext {
        &self.context
    }

    pub async fn insert(&self, entity: E) -> Result<KeyValues> {
        self.context.insert(entity).await
    }

    pub async fn attach(&self, entity: E) -> Result<KeyValues> {
        self.context.attach(entity).await
    }
}

impl<E> EntitySet<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Finds by explicit key values, given in key order.
    pub async fn find(
        &self,
        key_values: &[Value],
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>> {
        self.find_by_key(&KeyValues::from(key_values), cancellation)
            .await
    }

    /// Finds the tracked or stored counterpart of `entity`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memofind::{CancellationSignal, ContextConfig, DataType, EntityType, PersistContext};
    ///
    /// #[derive(Clone)]
    /// struct User {
    ///     id: i64,
    ///     name: String,
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let context = PersistContext::new(ContextConfig::default()).unwrap();
    /// context
    ///     .register(
    ///         EntityType::<User>::builder("User")
    ///             .property("id", DataType::Integer, |u: &User| u.id.into())
    ///             .property("name", DataType::Text, |u: &User| u.name.as_str().into())
    ///             .primary_key(["id"])
    ///             .build()
    ///             .unwrap(),
    ///     )
    ///     .unwrap();
    ///
    /// let users = context.set::<User>().unwrap();
    /// users.insert(User { id: 1, name: "alice".into() }).await.unwrap();
    ///
    /// let probe = User { id: 1, name: String::new() };
    /// let found = users.find_tracked(&probe, &CancellationSignal::new()).await.unwrap();
    /// assert_eq!(found.unwrap().name, "alice");
    /// # });
    /// ```
    pub async fn find_tracked(
        &self,
        entity: &E,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>> {
        resolve_tracked(self, self, entity, cancellation).await
    }

    /// Instances of `E` currently tracked by the context.
    pub async fn local(&self) -> Vec<E> {
        self.context.tracked_entities::<E>().await
    }
}

impl<E> MetadataSource<E> for EntitySet<E> {
    fn entity_type(&self) -> Result<Arc<EntityType<E>>> {
        Ok(Arc::clone(&self.entity_type))
    }
}

#[async_trait]
impl<E> KeyFinder<E> for EntitySet<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn find_by_key(
        &self,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>> {
        cancellation.ensure_not_cancelled()?;
        self.entity_type.validate_key(key)?;
        self.context
            .lookup(&self.entity_type, key, cancellation)
            .await
    }
}
