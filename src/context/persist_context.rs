use super::config::{ContextConfig, TrackingMode};
use super::entity_set::EntitySet;
use super::tables::EntityTables;
use crate::cancel::CancellationSignal;
use crate::core::{FindError, Result, Value};
use crate::key::{KeyFinder, KeyValues, extract_key_values, resolve_tracked};
use crate::metadata::{EntityType, MetadataSource, ModelRegistry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{Instrument, Level, event, info_span};

/// Counters describing how finds were answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    /// Queries issued against the row store
    pub store_queries: u64,
    /// Finds answered from the identity map
    pub identity_hits: u64,
    /// Store queries that returned a row
    pub store_hits: u64,
}

#[derive(Default)]
struct StatsCounters {
    store_queries: AtomicU64,
    identity_hits: AtomicU64,
    store_hits: AtomicU64,
}

struct ContextInner {
    config: ContextConfig,
    registry: RwLock<ModelRegistry>,
    rows: tokio::sync::RwLock<EntityTables>,
    tracked: tokio::sync::RwLock<EntityTables>,
    stats: StatsCounters,
}

/// In-memory persistence context: model registry, row store and identity map
/// of tracked instances.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct PersistContext {
    inner: Arc<ContextInner>,
}

impl PersistContext {
    /// Creates an empty context. Fails with [`FindError::Config`] when
    /// `config` does not validate.
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                registry: RwLock::new(ModelRegistry::new()),
                rows: tokio::sync::RwLock::new(EntityTables::default()),
                tracked: tokio::sync::RwLock::new(EntityTables::default()),
                stats: StatsCounters::default(),
            }),
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Registers the mapping for `E`. Each type can be registered once.
    pub fn register<E: Send + Sync + 'static>(&self, entity_type: EntityType<E>) -> Result<()> {
        let mut registry = self.inner.registry.write()?;
        let entity_type = registry.register(entity_type)?;
        event!(
            Level::DEBUG,
            context = %self.inner.config.name,
            entity = entity_type.name(),
            has_key = entity_type.has_primary_key(),
            "entity type registered"
        );
        Ok(())
    }

    pub fn entity_type<E: 'static>(&self) -> Result<Arc<EntityType<E>>> {
        let registry = self.inner.registry.read()?;
        registry.entity_type::<E>()
    }

    /// Returns the collection-scoped view of `E`.
    pub fn set<E: Send + Sync + 'static>(&self) -> Result<EntitySet<E>> {
        Ok(EntitySet::new(self.clone(), self.entity_type::<E>()?))
    }

    /// Writes `entity` as a new row. The row is not tracked until it is found.
    pub async fn insert<E: Send + Sync + 'static>(&self, entity: E) -> Result<KeyValues> {
        let entity_type = self.entity_type::<E>()?;
        let key = required_key(&entity_type, &entity)?;

        let mut rows = self.inner.rows.write().await;
        if rows.contains::<E>(&key) {
            return Err(FindError::DuplicateKey {
                entity: entity_type.name().to_string(),
                key: key.to_string(),
            });
        }
        rows.insert(key.clone(), entity)?;
        Ok(key)
    }

    /// Starts tracking `entity` without writing it to the store.
    pub async fn attach<E: Send + Sync + 'static>(&self, entity: E) -> Result<KeyValues> {
        let entity_type = self.entity_type::<E>()?;
        let key = required_key(&entity_type, &entity)?;

        let mut tracked = self.inner.tracked.write().await;
        if tracked.contains::<E>(&key) {
            return Err(FindError::DuplicateKey {
                entity: entity_type.name().to_string(),
                key: key.to_string(),
            });
        }
        tracked.insert(key.clone(), entity)?;
        Ok(key)
    }

    /// Stops tracking the instance with `key`, returning it if it was tracked.
    pub async fn detach<E: Send + Sync + 'static>(&self, key: &KeyValues) -> Result<Option<E>> {
        self.inner.tracked.write().await.remove::<E>(key)
    }

    pub async fn clear_tracking(&self) {
        self.inner.tracked.write().await.clear();
    }

    pub async fn tracked_count<E: 'static>(&self) -> usize {
        self.inner.tracked.read().await.len::<E>()
    }

    pub(crate) async fn tracked_entities<E: Clone + 'static>(&self) -> Vec<E> {
        self.inner.tracked.read().await.values::<E>()
    }

    pub fn stats(&self) -> ContextStats {
        let stats = &self.inner.stats;
        ContextStats {
            store_queries: stats.store_queries.load(Ordering::Relaxed),
            identity_hits: stats.identity_hits.load(Ordering::Relaxed),
            store_hits: stats.store_hits.load(Ordering::Relaxed),
        }
    }

    /// Finds an `E` by explicit key values, given in key order.
    pub async fn find<E>(
        &self,
        key_values: &[Value],
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>
    where
        E: Clone + Send + Sync + 'static,
    {
        cancellation.ensure_not_cancelled()?;
        let entity_type = self.entity_type::<E>()?;
        entity_type.validate_key(key_values)?;
        self.lookup(&entity_type, &KeyValues::from(key_values), cancellation)
            .await
    }

    /// Finds the tracked or stored counterpart of `entity` using the
    /// context-wide registry.
    pub async fn find_tracked<E>(
        &self,
        entity: &E,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>
    where
        E: Clone + Send + Sync + 'static,
    {
        resolve_tracked(self, self, entity, cancellation).await
    }

    /// Identity map first, then the row store. Keys must already be valid
    /// for `entity_type`; a key with a NULL component matches nothing.
    pub(crate) async fn lookup<E>(
        &self,
        entity_type: &EntityType<E>,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>
    where
        E: Clone + Send + Sync + 'static,
    {
        if key.iter().any(Value::is_null) {
            event!(
                Level::TRACE,
                entity = entity_type.name(),
                "NULL key component, nothing to find"
            );
            return Ok(None);
        }

        let span = info_span!(
            "context.find",
            context = %self.inner.config.name,
            entity = entity_type.name(),
            key = %key
        );

        self.lookup_in_span(key, cancellation)
            .instrument(span)
            .await
    }

    async fn lookup_in_span<E>(
        &self,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>
    where
        E: Clone + Send + Sync + 'static,
    {
        let tracked = self.inner.tracked.read().await.get::<E>(key).cloned();
        if let Some(found) = tracked {
            self.inner.stats.identity_hits.fetch_add(1, Ordering::Relaxed);
            event!(Level::DEBUG, "identity map hit");
            return Ok(Some(found));
        }

        let Some(found) = self.query_store::<E>(key, cancellation).await? else {
            event!(Level::DEBUG, "no matching row");
            return Ok(None);
        };
        self.inner.stats.store_hits.fetch_add(1, Ordering::Relaxed);

        if self.inner.config.tracking == TrackingMode::NoTracking {
            event!(Level::DEBUG, "row loaded without tracking");
            return Ok(Some(found));
        }

        let mut tracked = self.inner.tracked.write().await;
        // Another find may have tracked the same key while the store was queried.
        if let Some(existing) = tracked.get::<E>(key) {
            return Ok(Some(existing.clone()));
        }
        tracked.insert(key.clone(), found.clone())?;
        event!(Level::DEBUG, "row loaded and tracked");
        Ok(Some(found))
    }

    async fn query_store<E>(
        &self,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>
    where
        E: Clone + Send + Sync + 'static,
    {
        self.inner.stats.store_queries.fetch_add(1, Ordering::Relaxed);

        let query = async {
            if let Some(latency) = self.inner.config.store_latency {
                tokio::time::sleep(latency).await;
            }
            let rows = self.inner.rows.read().await;
            Ok::<_, FindError>(rows.get::<E>(key).cloned())
        };

        let cancellable = async {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(FindError::Cancelled),
                result = query => result,
            }
        };

        match self.inner.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, cancellable).await {
                Ok(result) => result,
                Err(_) => {
                    let duration_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    event!(Level::WARN, duration_ms, "store query timed out");
                    Err(FindError::Timeout { duration_ms })
                }
            },
            None => cancellable.await,
        }
    }
}

fn required_key<E>(entity_type: &EntityType<E>, entity: &E) -> Result<KeyValues> {
    let key_properties = entity_type
        .find_primary_key()
        .ok_or_else(|| FindError::NoPrimaryKey(entity_type.name().to_string()))?;
    let key = extract_key_values(key_properties, entity);
    entity_type.validate_key(&key)?;

    if let Some(property) = key_properties
        .iter()
        .zip(key.iter())
        .find_map(|(property, value)| value.is_null().then_some(property))
    {
        return Err(FindError::NullKey {
            entity: entity_type.name().to_string(),
            property: property.name().to_string(),
        });
    }
    Ok(key)
}

impl<E: 'static> MetadataSource<E> for PersistContext {
    fn entity_type(&self) -> Result<Arc<EntityType<E>>> {
        PersistContext::entity_type::<E>(self)
    }
}

#[async_trait]
impl<E> KeyFinder<E> for PersistContext
where
    E: Clone + Send + Sync + 'static,
{
    async fn find_by_key(
        &self,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>> {
        cancellation.ensure_not_cancelled()?;
        let entity_type = PersistContext::entity_type::<E>(self)?;
        entity_type.validate_key(key)?;
        self.lookup(&entity_type, key, cancellation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        order_id: i64,
        tenant_id: i64,
        status: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        label: String,
    }

    fn order(tenant_id: i64, order_id: i64, status: &str) -> Order {
        Order {
            order_id,
            tenant_id,
            status: status.to_string(),
        }
    }

    fn context_with(config: ContextConfig) -> PersistContext {
        let context = PersistContext::new(config).unwrap();
        context
            .register(
                EntityType::<Order>::builder("Order")
                    .property("order_id", DataType::Integer, |o: &Order| o.order_id.into())
                    .property("status", DataType::Text, |o: &Order| o.status.as_str().into())
                    .property("tenant_id", DataType::Integer, |o: &Order| o.tenant_id.into())
                    .primary_key(["tenant_id", "order_id"])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        context
            .register(
                EntityType::<Tag>::builder("Tag")
                    .property("label", DataType::Text, |t: &Tag| t.label.as_str().into())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        context
    }

    fn context() -> PersistContext {
        context_with(ContextConfig::default())
    }

    #[tokio::test]
    async fn test_insert_then_find_by_key() {
        let context = context();
        let key = context.insert(order(7, 42, "open")).await.unwrap();
        assert_eq!(key.values(), &[Value::Integer(7), Value::Integer(42)]);

        let found: Option<Order> = context
            .find(&[7.into(), 42.into()], &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(found, Some(order(7, 42, "open")));

        let reversed: Option<Order> = context
            .find(&[42.into(), 7.into()], &CancellationSignal::new())
            .await
            .unwrap();
        assert!(reversed.is_none());
    }

    #[tokio::test]
    async fn test_second_find_is_served_from_identity_map() {
        let context = context();
        context.insert(order(1, 1, "open")).await.unwrap();
        let signal = CancellationSignal::new();

        let probe = order(1, 1, "");
        context.find_tracked(&probe, &signal).await.unwrap().unwrap();
        assert_eq!(context.tracked_count::<Order>().await, 1);

        context.find_tracked(&probe, &signal).await.unwrap().unwrap();
        let stats = context.stats();
        assert_eq!(stats.store_queries, 1);
        assert_eq!(stats.store_hits, 1);
        assert_eq!(stats.identity_hits, 1);
    }

    #[tokio::test]
    async fn test_attached_instance_wins_over_row() {
        let context = context();
        context.insert(order(1, 2, "stored")).await.unwrap();
        context.attach(order(1, 2, "tracked")).await.unwrap();

        let found = context
            .find_tracked(&order(1, 2, ""), &CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(found.unwrap().status, "tracked");
        assert_eq!(context.stats().store_queries, 0);
    }

    #[tokio::test]
    async fn test_no_tracking_mode_always_queries_store() {
        let context = context_with(ContextConfig::default().tracking(TrackingMode::NoTracking));
        context.insert(order(1, 1, "open")).await.unwrap();
        let signal = CancellationSignal::new();

        for _ in 0..3 {
            context
                .find_tracked(&order(1, 1, ""), &signal)
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(context.stats().store_queries, 3);
        assert_eq!(context.tracked_count::<Order>().await, 0);
    }

    #[tokio::test]
    async fn test_detach_and_clear_tracking() {
        let context = context();
        let key = context.attach(order(3, 3, "x")).await.unwrap();
        context.attach(order(3, 4, "y")).await.unwrap();

        let detached: Option<Order> = context.detach(&key).await.unwrap();
        assert_eq!(detached.unwrap().order_id, 3);
        assert_eq!(context.tracked_count::<Order>().await, 1);

        context.clear_tracking().await;
        assert_eq!(context.tracked_count::<Order>().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_keys_rejected() {
        let context = context();
        context.insert(order(1, 1, "a")).await.unwrap();
        let err = context.insert(order(1, 1, "b")).await.unwrap_err();
        assert!(matches!(err, FindError::DuplicateKey { ref key, .. } if key == "(1, 1)"));

        context.attach(order(1, 1, "a")).await.unwrap();
        assert!(context.attach(order(1, 1, "b")).await.is_err());
    }

    #[tokio::test]
    async fn test_keyless_type() {
        let context = context();
        let tag = Tag { label: "rust".into() };

        assert!(matches!(
            context.insert(tag.clone()).await,
            Err(FindError::NoPrimaryKey(_))
        ));
        assert!(matches!(
            context.find::<Tag>(&["rust".into()], &CancellationSignal::new()).await,
            Err(FindError::NoPrimaryKey(_))
        ));

        let found = context
            .find_tracked(&tag, &CancellationSignal::new())
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(context.stats().store_queries, 0);
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected_before_store() {
        let context = context();
        let signal = CancellationSignal::new();

        let arity = context.find::<Order>(&[1.into()], &signal).await.unwrap_err();
        assert!(matches!(arity, FindError::KeyArity { expected: 2, actual: 1, .. }));

        let mismatch = context
            .find::<Order>(&[1.into(), "two".into()], &signal)
            .await
            .unwrap_err();
        assert!(matches!(mismatch, FindError::KeyTypeMismatch { .. }));
        assert_eq!(context.stats().store_queries, 0);
    }

    #[tokio::test]
    async fn test_unregistered_type() {
        #[derive(Debug, Clone)]
        struct Unmapped;

        let context = context();
        assert!(context.set::<Unmapped>().is_err());
        let err = context
            .find_tracked(&Unmapped, &CancellationSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::UnknownEntityType(_)));
    }

    #[tokio::test]
    async fn test_cancel_during_slow_store_query() {
        let context =
            context_with(ContextConfig::default().store_latency(Duration::from_secs(30)));
        context.insert(order(1, 1, "open")).await.unwrap();

        let signal = CancellationSignal::new();
        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            context.find_tracked(&order(1, 1, ""), &signal),
        )
        .await
        .expect("cancellation should interrupt the query")
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(context.tracked_count::<Order>().await, 0);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: Option<i64>,
        name: String,
    }

    fn context_with_users() -> PersistContext {
        let context = context();
        context
            .register(
                EntityType::<User>::builder("User")
                    .property("id", DataType::Integer, |u: &User| u.id.into())
                    .property("name", DataType::Text, |u: &User| u.name.as_str().into())
                    .primary_key(["id"])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        context
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PersistContext::new(ContextConfig::new("")).err().unwrap();
        assert!(matches!(err, FindError::Config(_)));

        let zero_timeout = ContextConfig::default()
            .query_timeout(Duration::ZERO)
            .store_latency(Duration::from_millis(1));
        assert!(matches!(
            PersistContext::new(zero_timeout),
            Err(FindError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_null_key_cannot_be_stored() {
        let context = context_with_users();
        let ghost = User {
            id: None,
            name: "ghost".into(),
        };

        let err = context.insert(ghost.clone()).await.unwrap_err();
        assert!(matches!(err, FindError::NullKey { ref property, .. } if property == "id"));
        assert!(matches!(
            context.attach(ghost).await,
            Err(FindError::NullKey { .. })
        ));
        assert_eq!(context.tracked_count::<User>().await, 0);
    }

    #[tokio::test]
    async fn test_null_key_finds_nothing_without_store_query() {
        let context = context_with_users();
        context
            .insert(User {
                id: Some(1),
                name: "alice".into(),
            })
            .await
            .unwrap();
        let signal = CancellationSignal::new();

        let found = context.find::<User>(&[Value::Null], &signal).await.unwrap();
        assert!(found.is_none());

        let probe = User {
            id: None,
            name: String::new(),
        };
        assert!(context.find_tracked(&probe, &signal).await.unwrap().is_none());
        assert_eq!(context.stats().store_queries, 0);
    }

    #[tokio::test]
    async fn test_find_by_key_checks_cancellation() {
        let context = context();
        context.insert(order(1, 1, "open")).await.unwrap();
        let signal = CancellationSignal::new();
        signal.cancel();

        let key = KeyValues::new(vec![1.into(), 1.into()]);
        let err = KeyFinder::<Order>::find_by_key(&context, &key, &signal)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(context.stats().store_queries, 0);
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let context = context_with(
            ContextConfig::default()
                .store_latency(Duration::from_secs(30))
                .query_timeout(Duration::from_millis(20)),
        );
        context.insert(order(1, 1, "open")).await.unwrap();

        let err = context
            .find_tracked(&order(1, 1, ""), &CancellationSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::Timeout { duration_ms: 20 }));
        assert!(err.is_retryable());
    }
}
