//! Router-wide loading configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Router-wide defaults consulted when a route does not set its own timing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Delay before a loading match is flagged as pending
    pub default_pending_ms: Option<Duration>,

    /// Minimum time a pending match stays pending once flagged
    pub default_pending_min_ms: Option<Duration>,

    /// How long loaded data stays fresh
    pub default_loader_max_age: Option<Duration>,
}

impl RouterOptions {
    pub fn with_pending_ms(mut self, delay: Duration) -> Self {
        self.default_pending_ms = Some(delay);
        self
    }

    pub fn with_pending_min_ms(mut self, minimum: Duration) -> Self {
        self.default_pending_min_ms = Some(minimum);
        self
    }

    pub fn with_loader_max_age(mut self, max_age: Duration) -> Self {
        self.default_loader_max_age = Some(max_age);
        self
    }
}

/// Per-route timing overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteTiming {
    pub pending_ms: Option<Duration>,
    pub pending_min_ms: Option<Duration>,
    pub loader_max_age: Option<Duration>,
}

impl RouteTiming {
    /// Pending delay for this route, falling back to the router default
    pub fn pending_ms(&self, router: &RouterOptions) -> Option<Duration> {
        self.pending_ms.or(router.default_pending_ms)
    }

    /// Minimum pending duration, falling back to the router default
    pub fn pending_min_ms(&self, router: &RouterOptions) -> Option<Duration> {
        self.pending_min_ms.or(router.default_pending_min_ms)
    }

    /// Max age of loaded data; zero when neither the route nor the router sets one
    pub fn loader_max_age(&self, router: &RouterOptions) -> Duration {
        self.loader_max_age
            .or(router.default_loader_max_age)
            .unwrap_or(Duration::ZERO)
    }
}

/// TOML configuration for rhtmx.toml
///
/// ```toml
/// [loading]
/// default_pending_ms = 1000
/// default_pending_min_ms = 500
/// default_loader_max_age_ms = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MatchConfig {
    #[serde(default)]
    pub loading: LoadingConfig,
}

/// Loading timings in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoadingConfig {
    #[serde(default)]
    pub default_pending_ms: Option<u64>,

    #[serde(default)]
    pub default_pending_min_ms: Option<u64>,

    #[serde(default)]
    pub default_loader_max_age_ms: Option<u64>,
}

impl MatchConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: MatchConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Convert TOML config to runtime options
    pub fn to_runtime_config(&self) -> RouterOptions {
        let millis = |value: Option<u64>| value.map(Duration::from_millis);

        RouterOptions {
            default_pending_ms: millis(self.loading.default_pending_ms),
            default_pending_min_ms: millis(self.loading.default_pending_min_ms),
            default_loader_max_age: millis(self.loading.default_loader_max_age_ms),
        }
    }
}
