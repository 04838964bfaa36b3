//! Error types for the ztdns system
//!
//! Errors fall into two groups. Fatal errors abort a reconciliation cycle
//! (missing configuration, no device inventory, no zone name). Everything
//! else is recorded against a single device or record in the cycle report.

use thiserror::Error;

/// Result type alias for ztdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ztdns system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Device directory errors (listing the inventory)
    #[error("Device directory error: {0}")]
    Directory(String),

    /// Zone metadata errors (resolving the zone suffix)
    #[error("Zone lookup error: {0}")]
    Zone(String),

    /// Address lookup errors
    #[error("Address lookup error: {0}")]
    Lookup(String),

    /// JSON decoding errors (malformed provider responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A cycle exceeded its time budget
    #[error("Cycle timed out after {0}s")]
    Timeout(u64),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a device directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create a zone lookup error
    pub fn zone(msg: impl Into<String>) -> Self {
        Self::Zone(msg.into())
    }

    /// Create an address lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts a whole reconciliation cycle
    ///
    /// Only configuration, inventory and zone failures are fatal. Lookup and
    /// record-store failures are scoped to one device or one record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Directory(_) | Self::Zone(_) | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("missing token").is_fatal());
        assert!(Error::directory("503").is_fatal());
        assert!(Error::zone("404").is_fatal());
        assert!(!Error::lookup("timeout").is_fatal());
        assert!(Error::Timeout(120).is_fatal());
        assert!(!Error::rate_limited("429").is_fatal());
        assert!(!Error::provider("cloudflare", "boom").is_fatal());
    }

    #[test]
    fn test_json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(parse);
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_provider_display() {
        let err = Error::provider("cloudflare", "Rate limit exceeded");
        assert_eq!(err.to_string(), "Provider error (cloudflare): Rate limit exceeded");
    }
}
