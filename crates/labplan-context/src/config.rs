//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Contents are not valid TOML for [`LabConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings shared by contexts, draft layers and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LabConfig {
    /// Upper bound on one backend create/update call, `None` for unbounded
    pub backend_timeout_ms: Option<u64>,
    /// Mark replace drafts invalid when the committed container moves under them
    pub invalidate_stale_drafts: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl LabConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With backend timeout
    #[inline]
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Without backend timeout
    #[inline]
    #[must_use]
    pub fn without_backend_timeout(mut self) -> Self {
        self.backend_timeout_ms = None;
        self
    }

    /// With stale draft invalidation on or off
    #[inline]
    #[must_use]
    pub fn with_invalidate_stale_drafts(mut self, enabled: bool) -> Self {
        self.invalidate_stale_drafts = enabled;
        self
    }

    /// With default log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Backend timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_ms.map(Duration::from_millis)
    }

    /// Parse from TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML for this struct
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            backend_timeout_ms: Some(30_000),
            invalidate_stale_drafts: true,
            log_filter: "info".to_string(),
        }
    }
}
