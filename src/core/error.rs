use thiserror::Error;

#[derive(Error, Debug)]
pub enum FindError {
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Entity type '{0}' is not registered")]
    UnknownEntityType(String),

    #[error("Entity type '{0}' is already registered")]
    DuplicateEntityType(String),

    #[error("Property '{property}' is declared twice on entity type '{entity}'")]
    DuplicateProperty { entity: String, property: String },

    #[error("Primary key of '{entity}' references unknown property '{property}'")]
    UnknownKeyProperty { entity: String, property: String },

    #[error("Primary key of '{entity}' lists property '{property}' more than once")]
    DuplicateKeyProperty { entity: String, property: String },

    #[error("Entity type '{0}' has no primary key")]
    NoPrimaryKey(String),

    #[error("Entity type '{entity}' has a key of {expected} value(s), got {actual}")]
    KeyArity {
        entity: String,
        expected: usize,
        actual: usize,
    },

    #[error("Key property '{property}' of '{entity}' expects {expected}, got {actual}")]
    KeyTypeMismatch {
        entity: String,
        property: String,
        expected: String,
        actual: String,
    },

    #[error("Key property '{property}' of '{entity}' cannot be NULL")]
    NullKey { entity: String, property: String },

    #[error("Entity '{entity}' with key {key} already exists")]
    DuplicateKey { entity: String, key: String },

    #[error("Store query timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl FindError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, FindError>;

impl<T> From<std::sync::PoisonError<T>> for FindError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = FindError::KeyArity {
            entity: "Order".to_string(),
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("Order"));
        assert!(msg.contains("2 value(s)"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FindError::Timeout { duration_ms: 10 }.is_retryable());
        assert!(FindError::Store("down".into()).is_retryable());
        assert!(!FindError::Cancelled.is_retryable());
        assert!(!FindError::UnknownEntityType("Order".into()).is_retryable());
        assert!(FindError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_poison_error_maps_to_lock_error() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(0));
        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err: FindError = lock.lock().unwrap_err().into();
        assert!(matches!(err, FindError::LockError(_)));
    }
}
