//! In-memory device registry.
//!
//! Records are keyed by IPv4 address and kept in insertion order for
//! display; [`DeviceRegistry::snapshot`] yields the ascending numeric order
//! used for persistence. Merging is non-destructive: a populated field is
//! never overwritten by an empty one.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::DeviceRecord;
use crate::oui::OuiDatabase;
use crate::scanner::ProbedHost;
use crate::vendor::VendorResolver;

/// Counters returned by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records refused because `ip` is not an IPv4 address.
    pub rejected: usize,
}

/// Result of comparing two registries by IP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    /// Present now, absent before.
    pub appeared: Vec<DeviceRecord>,
    /// Present before, absent now.
    pub vanished: Vec<DeviceRecord>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.vanished.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, ip: &str) -> Option<&DeviceRecord> {
        self.index.get(ip.trim()).map(|&i| &self.records[i])
    }

    /// Records in first-seen order.
    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Merge a batch of records; later records win field by field.
    pub fn merge<I>(&mut self, records: I) -> MergeStats
    where
        I: IntoIterator<Item = DeviceRecord>,
    {
        let mut stats = MergeStats::default();
        for mut record in records {
            record.ip = record.ip.trim().to_string();
            if record.ipv4().is_none() {
                debug!(ip = %record.ip, "Refusing record without IPv4 key");
                stats.rejected += 1;
                continue;
            }

            match self.index.get(&record.ip) {
                Some(&i) => {
                    if self.records[i].absorb(&record) {
                        stats.updated += 1;
                    } else {
                        stats.unchanged += 1;
                    }
                }
                None => {
                    self.index.insert(record.ip.clone(), self.records.len());
                    self.records.push(record);
                    stats.added += 1;
                }
            }
        }
        stats
    }

    /// Merge live probe results.
    pub fn merge_probe<I>(&mut self, hosts: I) -> MergeStats
    where
        I: IntoIterator<Item = ProbedHost>,
    {
        self.merge(hosts.into_iter().map(|h| h.record))
    }

    /// Records sorted by ascending numeric IPv4 address.
    ///
    /// Two registries fed the same records in different orders produce equal
    /// snapshots as long as no two inputs disagree on a non-empty field.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by_key(|r| r.ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED));
        sorted
    }

    /// Pipe-delimited form, one `ip|mac|hostname|vendor` line per record.
    pub fn to_pipe(&self) -> String {
        self.snapshot()
            .iter()
            .map(|r| r.to_pipe() + "\n")
            .collect()
    }

    /// Array-of-objects JSON form. Lossless, unlike [`Self::to_pipe`].
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    /// Resolve vendors for every record that has a MAC but no vendor.
    ///
    /// Returns the number of records that received a vendor.
    pub async fn enrich(&mut self, resolver: &VendorResolver) -> usize {
        self.enrich_until(resolver, &CancellationToken::new()).await
    }

    /// Like [`Self::enrich`], stopping early when `cancel` fires. Vendors
    /// already resolved before cancellation are kept.
    pub async fn enrich_until(
        &mut self,
        resolver: &VendorResolver,
        cancel: &CancellationToken,
    ) -> usize {
        let macs: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.needs_vendor())
            .map(|r| r.mac.clone())
            .collect();
        if macs.is_empty() {
            return 0;
        }

        let results = resolver.resolve_batch_until(&macs, cancel).await;

        let mut filled = 0;
        for record in self.records.iter_mut().filter(|r| r.needs_vendor()) {
            if let Some(result) = results.get(&record.mac) {
                record.vendor = result.vendor.clone();
                filled += 1;
            }
        }
        info!(candidates = macs.len(), filled, "Vendor enrichment complete");
        filled
    }

    /// Fill vendors from the offline OUI database; records with no match
    /// are left unresolved.
    pub fn enrich_offline(&mut self, oui: &OuiDatabase) -> usize {
        let mut filled = 0;
        for record in self.records.iter_mut().filter(|r| r.needs_vendor()) {
            if let Some(vendor) = oui.lookup(&record.mac) {
                record.vendor = vendor.to_string();
                filled += 1;
            }
        }
        filled
    }

    /// Compare against an earlier registry by IP.
    pub fn diff(&self, previous: &DeviceRegistry) -> RegistryDiff {
        let appeared = self
            .snapshot()
            .into_iter()
            .filter(|r| previous.get(&r.ip).is_none())
            .collect();
        let vanished = previous
            .snapshot()
            .into_iter()
            .filter(|r| self.get(&r.ip).is_none())
            .collect();
        RegistryDiff { appeared, vanished }
    }
}

impl FromIterator<DeviceRecord> for DeviceRegistry {
    fn from_iter<T: IntoIterator<Item = DeviceRecord>>(iter: T) -> Self {
        let mut registry = DeviceRegistry::new();
        registry.merge(iter);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::store::MemoryCacheStore;
    use crate::vendor::{RemoteVendor, ResolverSettings, VendorApi};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn rec(ip: &str, mac: &str, host: &str) -> DeviceRecord {
        DeviceRecord::new(ip, mac, host)
    }

    #[test]
    fn test_merge_preserves_populated_fields() {
        let mut registry = DeviceRegistry::new();
        registry.merge([rec("10.0.0.1", "", "router")]);
        let stats = registry.merge([rec("10.0.0.1", "aa:bb:cc:dd:ee:ff", "")]);

        assert_eq!(stats.updated, 1);
        assert_eq!(registry.len(), 1);
        let merged = registry.get("10.0.0.1").expect("record present");
        assert_eq!(merged.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(merged.hostname, "router");
        assert_eq!(merged.vendor, "");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let input = vec![
            rec("10.0.0.2", "aa:bb:cc:dd:ee:02", "b"),
            rec("10.0.0.1", "aa:bb:cc:dd:ee:01", "a"),
        ];
        let mut once = DeviceRegistry::new();
        once.merge(input.clone());
        let mut twice = once.clone();
        let stats = twice.merge(input);

        assert_eq!(stats.unchanged, 2);
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_merge_order_converges() {
        let a = rec("10.0.0.1", "", "router");
        let b = rec("10.0.0.1", "aa:bb:cc:dd:ee:ff", "");
        let c = rec("10.0.0.9", "", "");

        let forward: DeviceRegistry = [a.clone(), b.clone(), c.clone()].into_iter().collect();
        let backward: DeviceRegistry = [c, b, a].into_iter().collect();
        assert_eq!(forward.snapshot(), backward.snapshot());
    }

    #[test]
    fn test_newer_non_empty_value_wins() {
        let mut registry = DeviceRegistry::new();
        registry.merge([rec("10.0.0.1", "", "old-name")]);
        registry.merge([rec("10.0.0.1", "", "new-name")]);
        assert_eq!(registry.get("10.0.0.1").map(|r| r.hostname.as_str()), Some("new-name"));
    }

    #[test]
    fn test_invalid_ip_is_rejected() {
        let mut registry = DeviceRegistry::new();
        let stats = registry.merge([rec("not-an-ip", "", ""), rec("fe80::1", "", "")]);
        assert_eq!(stats.rejected, 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_sorts_numerically() {
        let registry: DeviceRegistry = ["10.0.0.100", "10.0.0.20", "9.255.255.255", "10.0.0.3"]
            .into_iter()
            .map(|ip| rec(ip, "", ""))
            .collect();

        let ips: Vec<String> = registry.snapshot().into_iter().map(|r| r.ip).collect();
        assert_eq!(ips, vec!["9.255.255.255", "10.0.0.3", "10.0.0.20", "10.0.0.100"]);

        let insertion: Vec<&str> = registry.records().iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(insertion[0], "10.0.0.100");
    }

    #[test]
    fn test_to_pipe_and_json() {
        let registry: DeviceRegistry = [
            rec("10.0.0.2", "", "a|b"),
            rec("10.0.0.1", "aa:bb:cc:dd:ee:ff", "gw").with_vendor("Acme"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            registry.to_pipe(),
            "10.0.0.1|AA:BB:CC:DD:EE:FF|gw|Acme\n10.0.0.2||a/b|\n"
        );

        let json = registry.to_json().expect("serializable");
        let back: Vec<DeviceRecord> = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(back[1].hostname, "a|b", "JSON keeps the pipe");
        assert_eq!(back, registry.snapshot());
    }

    #[test]
    fn test_diff() {
        let before: DeviceRegistry = [rec("10.0.0.1", "", ""), rec("10.0.0.2", "", "")]
            .into_iter()
            .collect();
        let after: DeviceRegistry = [rec("10.0.0.2", "", ""), rec("10.0.0.3", "", "")]
            .into_iter()
            .collect();

        let diff = after.diff(&before);
        assert_eq!(diff.appeared.len(), 1);
        assert_eq!(diff.appeared[0].ip, "10.0.0.3");
        assert_eq!(diff.vanished.len(), 1);
        assert_eq!(diff.vanished[0].ip, "10.0.0.1");
        assert!(after.diff(&after).is_empty());
    }

    #[test]
    fn test_enrich_offline() {
        let mut registry: DeviceRegistry = [
            rec("10.0.0.1", "52:54:00:12:34:56", ""),
            rec("10.0.0.2", "02:00:00:00:00:01", ""),
            rec("10.0.0.3", "", ""),
        ]
        .into_iter()
        .collect();

        let filled = registry.enrich_offline(&OuiDatabase::builtin());
        assert_eq!(filled, 1);
        assert_eq!(registry.get("10.0.0.1").map(|r| r.vendor.as_str()), Some("QEMU/KVM"));
        assert_eq!(registry.get("10.0.0.2").map(|r| r.vendor.as_str()), Some(""));
    }

    struct FixedApi;

    #[async_trait]
    impl VendorApi for FixedApi {
        async fn lookup(&self, mac: &str) -> Result<RemoteVendor> {
            Ok(if mac.starts_with("AA:") {
                RemoteVendor::Found("Acme Networks".into())
            } else {
                RemoteVendor::NotFound
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_skips_records_without_mac() {
        let resolver = VendorResolver::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(FixedApi),
            ResolverSettings::default(),
        );
        let mut registry: DeviceRegistry = [
            rec("10.0.0.1", "aa:00:00:00:00:01", ""),
            rec("10.0.0.2", "bb:00:00:00:00:02", ""),
            rec("10.0.0.3", "", "no-mac"),
            rec("10.0.0.4", "aa:00:00:00:00:04", "").with_vendor("Preset"),
        ]
        .into_iter()
        .collect();

        let filled = registry.enrich(&resolver).await;
        assert_eq!(filled, 2);
        let vendor = |ip: &str| registry.get(ip).map(|r| r.vendor.clone()).unwrap_or_default();
        assert_eq!(vendor("10.0.0.1"), "Acme Networks");
        assert_eq!(vendor("10.0.0.2"), "Unknown");
        assert_eq!(vendor("10.0.0.3"), "");
        assert_eq!(vendor("10.0.0.4"), "Preset");
    }
}
