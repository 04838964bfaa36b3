//! Address resolution for canonical devices
//!
//! Lookups are independent and read-only, so they run concurrently with a
//! fixed number in flight. Results are gathered into one collection before
//! reconciliation starts; completion order carries no meaning.

use crate::model::CanonicalDevice;
use crate::report::SkipReason;
use crate::traits::AddressLookup;
use crate::validate::is_ipv4_literal;
use futures::StreamExt;
use tracing::{debug, warn};

/// A device paired with the result of its lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The device, with `address` set when resolution succeeded
    pub device: CanonicalDevice,
    /// Why the device cannot be published this cycle
    pub skip: Option<SkipReason>,
}

/// Resolves device addresses through an [`AddressLookup`]
pub struct AddressResolver<'a> {
    lookup: &'a dyn AddressLookup,
    concurrency: usize,
}

impl<'a> AddressResolver<'a> {
    /// Create a resolver with at most `concurrency` lookups in flight
    pub fn new(lookup: &'a dyn AddressLookup, concurrency: usize) -> Self {
        Self {
            lookup,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve a single device
    ///
    /// Never fails: every lookup problem becomes a [`SkipReason`].
    pub async fn resolve(&self, account_id: &str, mut device: CanonicalDevice) -> Resolved {
        let skip = match self.lookup.lookup_address(account_id, &device.id).await {
            Ok(Some(address)) => {
                let address = address.trim().to_string();
                if is_ipv4_literal(&address) {
                    debug!("Resolved {} ({}) -> {}", device.name, device.id, address);
                    device.address = Some(address);
                    None
                } else {
                    warn!(
                        "Device {} ({}) reported invalid IPv4 address '{}'",
                        device.name, device.id, address
                    );
                    Some(SkipReason::InvalidAddress(address))
                }
            }
            Ok(None) => {
                debug!("No address known for {} ({})", device.name, device.id);
                Some(SkipReason::NoAddress)
            }
            Err(e) => {
                warn!("Address lookup failed for {} ({}): {}", device.name, device.id, e);
                Some(SkipReason::ResolverFailed(e.to_string()))
            }
        };

        Resolved { device, skip }
    }

    /// Resolve every device with bounded concurrency
    pub async fn resolve_all<I>(&self, account_id: &str, devices: I) -> Vec<Resolved>
    where
        I: IntoIterator<Item = CanonicalDevice>,
    {
        futures::stream::iter(devices)
            .map(|device| self.resolve(account_id, device))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TableLookup {
        table: HashMap<&'static str, Result<Option<&'static str>, &'static str>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl TableLookup {
        fn new(table: HashMap<&'static str, Result<Option<&'static str>, &'static str>>) -> Self {
            Self {
                table,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AddressLookup for TableLookup {
        async fn lookup_address(
            &self,
            _account_id: &str,
            device_id: &str,
        ) -> Result<Option<String>, Error> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.table.get(device_id) {
                Some(Ok(addr)) => Ok(addr.map(str::to_string)),
                Some(Err(msg)) => Err(Error::lookup(*msg)),
                None => Ok(None),
            }
        }
    }

    fn device(id: &str) -> CanonicalDevice {
        CanonicalDevice {
            id: id.to_string(),
            name: format!("host-{}", id),
            last_updated: Utc::now(),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_resolution_outcomes() {
        let lookup = TableLookup::new(HashMap::from([
            ("ok", Ok(Some("100.96.0.1"))),
            ("padded", Ok(Some(" 100.96.0.2\n"))),
            ("empty", Ok(None)),
            ("v6", Ok(Some("fd00::1"))),
            ("err", Err("HTTP 500")),
        ]));
        let resolver = AddressResolver::new(&lookup, 2);

        let ok = resolver.resolve("acct", device("ok")).await;
        assert_eq!(ok.skip, None);
        assert_eq!(ok.device.address.as_deref(), Some("100.96.0.1"));

        let padded = resolver.resolve("acct", device("padded")).await;
        assert_eq!(padded.device.address.as_deref(), Some("100.96.0.2"));

        let empty = resolver.resolve("acct", device("empty")).await;
        assert_eq!(empty.skip, Some(SkipReason::NoAddress));
        assert!(empty.device.address.is_none());

        let v6 = resolver.resolve("acct", device("v6")).await;
        assert_eq!(v6.skip, Some(SkipReason::InvalidAddress("fd00::1".to_string())));

        let err = resolver.resolve("acct", device("err")).await;
        assert!(matches!(err.skip, Some(SkipReason::ResolverFailed(_))));
    }

    #[tokio::test]
    async fn test_resolve_all_respects_concurrency_limit() {
        let table = (0..20)
            .map(|i| -> (&'static str, Result<Option<&'static str>, &'static str>) {
                (Box::leak(i.to_string().into_boxed_str()), Ok(Some("10.0.0.1")))
            })
            .collect();
        let lookup = TableLookup::new(table);
        let resolver = AddressResolver::new(&lookup, 3);

        let devices: Vec<_> = (0..20).map(|i| device(&i.to_string())).collect();
        let resolved = resolver.resolve_all("acct", devices).await;

        assert_eq!(resolved.len(), 20);
        assert!(resolved.iter().all(|r| r.skip.is_none()));
        assert!(lookup.max_in_flight.load(Ordering::SeqCst) <= 3);
    }
}
