use super::key_values::KeyValues;
use crate::cancel::CancellationSignal;
use crate::core::Result;
use crate::metadata::{MetadataSource, PropertyDescriptor};
use async_trait::async_trait;
use tracing::{Level, event};

/// Lower-level lookup of an entity by its ordered key tuple.
///
/// Implementations decide whether to consult tracked instances, storage, or
/// both. They return [`FindError::Cancelled`](crate::FindError::Cancelled)
/// when `cancellation` is already set on entry, and honour it while
/// suspended.
#[async_trait]
pub trait KeyFinder<E: Send + 'static>: Send + Sync {
    async fn find_by_key(
        &self,
        key: &KeyValues,
        cancellation: &CancellationSignal,
    ) -> Result<Option<E>>;
}

/// Reads the key columns off `entity`, in key order.
pub fn extract_key_values<E>(key_properties: &[PropertyDescriptor<E>], entity: &E) -> KeyValues {
    key_properties
        .iter()
        .map(|property| property.get_value(entity))
        .collect()
}

/// Finds the tracked or stored counterpart of `entity`.
///
/// Returns `Ok(None)` both when nothing matches and when the entity type
/// declares no primary key; in the latter case `finder` is never called.
/// Errors from `metadata` and `finder` are returned as they are.
///
/// # Examples
///
/// ```
/// use memofind::{
///     CancellationSignal, ContextConfig, DataType, EntityType, PersistContext, resolve_tracked,
/// };
///
/// #[derive(Clone)]
/// struct Order {
///     order_id: i64,
///     tenant_id: i64,
///     total: f64,
/// }
///
/// # tokio_test::block_on(async {
/// let context = PersistContext::new(ContextConfig::default()).unwrap();
/// context
///     .register(
///         EntityType::<Order>::builder("Order")
///             .property("order_id", DataType::Integer, |o: &Order| o.order_id.into())
///             .property("tenant_id", DataType::Integer, |o: &Order| o.tenant_id.into())
///             .property("total", DataType::Float, |o: &Order| o.total.into())
///             .primary_key(["tenant_id", "order_id"])
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
/// context
///     .insert(Order { order_id: 42, tenant_id: 7, total: 10.0 })
///     .await
///     .unwrap();
///
/// let set = context.set::<Order>().unwrap();
/// let probe = Order { order_id: 42, tenant_id: 7, total: 0.0 };
/// let found = resolve_tracked(&set, &set, &probe, &CancellationSignal::new())
///     .await
///     .unwrap()
///     .unwrap();
/// assert_eq!(found.total, 10.0);
/// # });
/// ```
pub async fn resolve_tracked<E, M, F>(
    metadata: &M,
    finder: &F,
    entity: &E,
    cancellation: &CancellationSignal,
) -> Result<Option<E>>
where
    E: Send + Sync + 'static,
    M: MetadataSource<E> + ?Sized,
    F: KeyFinder<E> + ?Sized,
{
    cancellation.ensure_not_cancelled()?;

    let entity_type = metadata.entity_type()?;
    let Some(key_properties) = entity_type.find_primary_key() else {
        event!(
            Level::TRACE,
            entity = entity_type.name(),
            "entity type has no primary key; nothing to resolve"
        );
        return Ok(None);
    };

    let key = extract_key_values(key_properties, entity);
    finder.find_by_key(&key, cancellation).await
}
