use crate::core::{FindError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Whether instances loaded from the store join the identity map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Loaded instances are tracked; later finds for the same key skip the store
    #[default]
    TrackAll,
    /// Every find that misses the identity map goes to the store
    NoTracking,
}

/// Persistence context configuration
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Context name, used in log output
    pub name: String,

    /// Tracking behaviour for store hits
    pub tracking: TrackingMode,

    /// Upper bound for a single store query
    pub query_timeout: Option<Duration>,

    /// Artificial delay before each store query (simulated I/O)
    pub store_latency: Option<Duration>,
}

impl ContextConfig {
    /// Create a configuration with defaults and the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tracking: TrackingMode::TrackAll,
            query_timeout: None,
            store_latency: None,
        }
    }

    /// Set tracking mode
    pub fn tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    /// Set query timeout
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set simulated store latency
    pub fn store_latency(mut self, latency: Duration) -> Self {
        self.store_latency = Some(latency);
        self
    }

    /// Parse from a JSON document
    ///
    /// Durations are given in milliseconds; every field is optional.
    ///
    /// ```
    /// use memofind::{ContextConfig, TrackingMode};
    ///
    /// let config = ContextConfig::from_json(
    ///     r#"{"name": "orders", "tracking": "no_tracking", "query_timeout_ms": 250}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(config.name, "orders");
    /// assert_eq!(config.tracking, TrackingMode::NoTracking);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawContextConfig = serde_json::from_str(json)
            .map_err(|e| FindError::Config(e.to_string()))?;

        let mut config = Self::new(raw.name.as_deref().unwrap_or(DEFAULT_CONTEXT_NAME));
        if let Some(tracking) = raw.tracking {
            config = config.tracking(tracking);
        }
        if let Some(ms) = raw.query_timeout_ms {
            config = config.query_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = raw.store_latency_ms {
            config = config.store_latency(Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(FindError::Config("Context name cannot be empty".to_string()));
        }

        if self.query_timeout == Some(Duration::ZERO) {
            return Err(FindError::Config("query_timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

const DEFAULT_CONTEXT_NAME: &str = "memofind";

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_NAME)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContextConfig {
    name: Option<String>,
    tracking: Option<TrackingMode>,
    query_timeout_ms: Option<u64>,
    store_latency_ms: Option<u64>,
}
