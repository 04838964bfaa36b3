//! Configuration types for the ztdns system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default record TTL in seconds
pub const DEFAULT_RECORD_TTL: u32 = 300;

/// Main synchronization configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Account owning the zero-trust device inventory
    pub account_id: String,

    /// Zone the device hostnames are published in
    pub zone_id: String,

    /// API token used for the directory, lookup and DNS calls
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("account_id", &self.account_id)
            .field("zone_id", &self.zone_id)
            .field("api_token", &"<REDACTED>")
            .field("engine", &self.engine)
            .finish()
    }
}

impl SyncConfig {
    /// Create a new configuration with default engine settings
    pub fn new(
        account_id: impl Into<String>,
        zone_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            zone_id: zone_id.into(),
            api_token: api_token.into(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    ///
    /// All three credentials are required. This runs before any cycle
    /// starts; a failure here is fatal.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.account_id.trim().is_empty() {
            return Err(crate::Error::config("Account ID is required"));
        }
        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("Zone ID is required"));
        }
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("API token is required"));
        }

        self.engine.validate()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TTL written on every created or updated record (seconds)
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Maximum number of address lookups in flight
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Maximum number of record mutations in flight
    ///
    /// 1 issues creates and updates sequentially.
    #[serde(default = "default_mutation_concurrency")]
    pub mutation_concurrency: usize,

    /// Interval between scheduled cycles (in seconds)
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    /// Upper bound on a single cycle (in seconds)
    ///
    /// A cycle that runs over is abandoned. Mutations it already issued
    /// stand; the next cycle converges the rest.
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        // 1 means "automatic" at most providers
        if self.record_ttl != 1 && !(60..=86400).contains(&self.record_ttl) {
            return Err(crate::Error::config(format!(
                "Record TTL must be 1 or between 60 and 86400 seconds. Got: {}",
                self.record_ttl
            )));
        }
        if self.resolve_concurrency == 0 {
            return Err(crate::Error::config("Resolve concurrency must be > 0"));
        }
        if self.mutation_concurrency == 0 {
            return Err(crate::Error::config("Mutation concurrency must be > 0"));
        }
        if self.cycle_interval_secs == 0 {
            return Err(crate::Error::config("Cycle interval must be > 0"));
        }
        if self.cycle_timeout_secs == 0 {
            return Err(crate::Error::config("Cycle timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_ttl: default_record_ttl(),
            resolve_concurrency: default_resolve_concurrency(),
            mutation_concurrency: default_mutation_concurrency(),
            cycle_interval_secs: default_cycle_interval_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_record_ttl() -> u32 {
    DEFAULT_RECORD_TTL
}

fn default_resolve_concurrency() -> usize {
    8
}

fn default_mutation_concurrency() -> usize {
    1
}

fn default_cycle_interval_secs() -> u64 {
    300
}

fn default_cycle_timeout_secs() -> u64 {
    120
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials() {
        assert!(SyncConfig::new("acct", "zone", "token").validate().is_ok());

        let err = SyncConfig::new("", "zone", "token").validate().unwrap_err();
        assert!(err.to_string().contains("Account ID"));

        let err = SyncConfig::new("acct", " ", "token").validate().unwrap_err();
        assert!(err.to_string().contains("Zone ID"));

        let err = SyncConfig::new("acct", "zone", "").validate().unwrap_err();
        assert!(err.to_string().contains("API token"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.record_ttl, 300);
        assert_eq!(engine.mutation_concurrency, 1);
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn test_engine_rejects_zero_limits() {
        let mut engine = EngineConfig::default();
        engine.resolve_concurrency = 0;
        assert!(engine.validate().is_err());

        let mut engine = EngineConfig::default();
        engine.record_ttl = 30;
        assert!(engine.validate().is_err());

        engine.record_ttl = 1;
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"account_id": "acct", "zone_id": "zone", "api_token": "t"}"#,
        )
        .unwrap();
        assert_eq!(config.engine.record_ttl, 300);
        assert_eq!(config.engine.cycle_interval_secs, 300);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = SyncConfig::new("acct", "zone", "secret_token_12345");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
