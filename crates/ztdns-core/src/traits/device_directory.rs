// # Device Directory Trait
//
// Defines the interface for listing the managed device inventory.
//
// ## Implementations
//
// - Cloudflare Zero Trust: `ztdns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ztdns_core::DeviceDirectory;
// use futures::TryStreamExt;
//
// let observations: Vec<_> = directory.list_devices("account-id").try_collect().await?;
// ```

use crate::model::DeviceObservation;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazy, possibly paginated sequence of device observations
pub type DeviceStream<'a> =
    Pin<Box<dyn Stream<Item = Result<DeviceObservation, crate::Error>> + Send + 'a>>;

/// Trait for device directory implementations
///
/// # Failure Semantics
///
/// Any `Err` item aborts the reconciliation cycle. The engine never
/// reconciles against a partial inventory, so implementations must not
/// swallow page failures.
///
/// # Trust Level: Untrusted
///
/// Directories perform API calls only. They must not retry, sleep, spawn
/// tasks or filter devices; deduplication is owned by the engine.
pub trait DeviceDirectory: Send + Sync {
    /// List every device observation visible to the account
    ///
    /// The stream may issue one request per page as it is polled.
    /// Observations are returned as reported, duplicates included.
    fn list_devices<'a>(&'a self, account_id: &'a str) -> DeviceStream<'a>;
}
