// # Address Lookup Trait
//
// Defines the interface for resolving a device's current network address.
//
// ## Implementations
//
// - Cloudflare DEX fleet status: `ztdns-provider-cloudflare` crate

use async_trait::async_trait;

/// Trait for address lookup implementations
///
/// # Contract
///
/// - `Ok(Some(address))`: The service reported an address. The engine still
///   validates it as an IPv4 literal before using it.
/// - `Ok(None)`: The device is known but has no address right now (missing
///   field, empty metadata block, non-success status).
/// - `Err(Error)`: The lookup itself failed (transport, parse).
///
/// Every outcome is non-fatal. The engine skips the device for this cycle.
///
/// # Thread Safety
///
/// Lookups for distinct devices run concurrently, bounded by the engine's
/// `resolve_concurrency`. Implementations must be read-only and idempotent.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    /// Look up the current address of one device
    async fn lookup_address(
        &self,
        account_id: &str,
        device_id: &str,
    ) -> Result<Option<String>, crate::Error>;
}
