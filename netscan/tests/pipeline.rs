//! End-to-end tests over the public pipeline: fixture files are detected,
//! parsed and merged into one registry, then enriched and serialized.
//!
//! Nothing here touches the network; the vendor API is a fake and the durable
//! cache is a temporary SQLite file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netscan::detect::{self, FormatKind};
use netscan::error::Result;
use netscan::ingest;
use netscan::model::DeviceRecord;
use netscan::oui::OuiDatabase;
use netscan::registry::DeviceRegistry;
use netscan::vendor::{
    RemoteVendor, ResolverSettings, SqliteCacheStore, VendorApi, VendorResolver, VendorSource,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

const FIXTURES: &[(&str, FormatKind)] = &[
    ("nmap_scan.xml", FormatKind::XmlReport),
    ("arp_table.txt", FormatKind::ArpTable),
    ("devices.csv", FormatKind::Csv),
    ("devices.json", FormatKind::Json),
    ("notes.txt", FormatKind::PlainText),
];

async fn load_all() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    for (name, _) in FIXTURES {
        ingest::ingest_file(&mut registry, &fixture(name), None)
            .await
            .expect("fixture readable");
    }
    registry
}

/// Vendor API answering from a fixed table and counting calls.
struct TableApi {
    vendors: HashMap<&'static str, &'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl VendorApi for TableApi {
    async fn lookup(&self, mac: &str) -> Result<RemoteVendor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.vendors.get(mac) {
            Some(v) => RemoteVendor::Found(v.to_string()),
            None => RemoteVendor::NotFound,
        })
    }
}

fn fast_settings() -> ResolverSettings {
    ResolverSettings {
        request_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

#[test]
fn test_fixture_formats_detected() {
    for (name, expected) in FIXTURES {
        let raw = std::fs::read(fixture(name)).expect("fixture readable");
        assert_eq!(detect::detect(&raw), *expected, "{name}");
    }
}

#[tokio::test]
async fn test_per_fixture_counts() {
    let expectations = [
        // (fixture, records, dropped)
        ("nmap_scan.xml", 3, 1),
        ("devices.csv", 2, 1),
        ("devices.json", 2, 1),
        ("notes.txt", 2, 2),
    ];
    for (name, records, dropped) in expectations {
        let mut registry = DeviceRegistry::new();
        let summary = ingest::ingest_file(&mut registry, &fixture(name), None)
            .await
            .expect("fixture readable");
        assert_eq!(summary.parsed, records, "{name} records");
        assert_eq!(summary.stats.dropped, dropped, "{name} dropped");
    }

    let mut registry = DeviceRegistry::new();
    let arp = ingest::ingest_file(&mut registry, &fixture("arp_table.txt"), None)
        .await
        .expect("fixture readable");
    assert_eq!(arp.parsed, 3);
    assert_eq!(arp.stats.rejected, 1);
    assert_eq!(
        registry.get("192.168.1.40").map(|r| r.mac.as_str()),
        Some("00:1B:A9:07:08:09")
    );
}

#[tokio::test]
async fn test_all_fixtures_merge_into_one_registry() {
    let registry = load_all().await;
    let ips: Vec<String> = registry.snapshot().into_iter().map(|r| r.ip).collect();
    assert_eq!(
        ips,
        vec![
            "192.168.1.1",
            "192.168.1.20",
            "192.168.1.40",
            "192.168.1.50",
            "192.168.1.60",
            "192.168.1.70",
            "192.168.1.80",
            "192.168.1.81",
        ]
    );

    let gateway = registry.get("192.168.1.1").expect("gateway");
    assert_eq!(gateway.mac, "FC:EC:DA:11:22:33");
    assert_eq!(gateway.hostname, "gateway.lan");
    assert_eq!(gateway.vendor, "Ubiquiti Networks");

    // Hostname from the CSV fills the gap left by the scan and ARP table.
    let pi = registry.get("192.168.1.20").expect("pi");
    assert_eq!(pi.mac, "B8:27:EB:44:55:66");
    assert_eq!(pi.hostname, "raspberrypi");

    // The later JSON hostname wins; the CSV vendor survives.
    let nas = registry.get("192.168.1.60").expect("nas");
    assert_eq!(nas.hostname, "nas.lan");
    assert_eq!(nas.vendor, "Synology");
    assert_eq!(nas.mac, "00:11:32:AA:BB:CC");
}

#[tokio::test]
async fn test_merge_order_does_not_change_snapshot() {
    let forward = load_all().await;

    let mut backward = DeviceRegistry::new();
    for (name, _) in FIXTURES.iter().rev() {
        ingest::ingest_file(&mut backward, &fixture(name), None)
            .await
            .expect("fixture readable");
    }

    // Only the NAS hostname conflicts between inputs; everything else must agree.
    let strip = |records: Vec<DeviceRecord>| -> Vec<DeviceRecord> {
        records
            .into_iter()
            .filter(|r| r.ip != "192.168.1.60")
            .collect()
    };
    assert_eq!(strip(forward.snapshot()), strip(backward.snapshot()));
}

#[tokio::test]
async fn test_pipe_output_reparses_to_same_registry() {
    let registry = load_all().await;
    let pipe = registry.to_pipe();

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("registry.txt");
    std::fs::write(&path, &pipe).expect("write");

    let mut reloaded = DeviceRegistry::new();
    let summary = ingest::ingest_file(&mut reloaded, &path, None)
        .await
        .expect("reload");
    assert_eq!(summary.format, FormatKind::Canonical);
    assert_eq!(reloaded.snapshot(), registry.snapshot());
}

#[tokio::test]
async fn test_json_output_is_array_of_records() {
    let registry = load_all().await;
    let json = registry.to_json().expect("serialize");
    let parsed: Vec<DeviceRecord> = serde_json::from_str(&json).expect("valid JSON");
    assert_eq!(parsed, registry.snapshot());
}

#[tokio::test]
async fn test_offline_enrichment_fills_known_prefixes() {
    let mut registry = load_all().await;
    let filled = registry.enrich_offline(&OuiDatabase::builtin());
    // Raspberry Pi and Apple prefixes are embedded; the rest stay empty.
    assert!(filled >= 2);
    assert_eq!(
        registry.get("192.168.1.20").map(|r| r.vendor.as_str()),
        Some("Raspberry Pi")
    );
    assert_eq!(
        registry.get("192.168.1.70").map(|r| r.vendor.as_str()),
        Some("Apple, Inc.")
    );
    // Vendors supplied by the inputs are not overwritten.
    assert_eq!(
        registry.get("192.168.1.1").map(|r| r.vendor.as_str()),
        Some("Ubiquiti Networks")
    );
}

#[tokio::test]
async fn test_online_enrichment_uses_durable_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("vendors.db").display());

    let api = Arc::new(TableApi {
        vendors: HashMap::from([
            ("B8:27:EB:44:55:66", "Raspberry Pi Trading Ltd"),
            ("3C:22:FB:11:22:33", "Apple, Inc."),
        ]),
        calls: AtomicUsize::new(0),
    });

    let mut registry = load_all().await;
    let store = Arc::new(SqliteCacheStore::open(&url).await.expect("cache"));
    let resolver = VendorResolver::new(store, api.clone(), fast_settings());
    registry.enrich(&resolver).await;

    assert_eq!(
        registry.get("192.168.1.20").map(|r| r.vendor.as_str()),
        Some("Raspberry Pi Trading Ltd")
    );
    // Unknown to the service: marked as resolved-but-unknown.
    assert_eq!(
        registry.get("192.168.1.40").map(|r| r.vendor.as_str()),
        Some("Unknown")
    );
    let first_calls = api.calls.load(Ordering::SeqCst);
    assert_eq!(first_calls, 4);

    // A fresh process against the same cache file: positive answers are
    // served locally; only the negative one is asked again.
    let store = Arc::new(SqliteCacheStore::open(&url).await.expect("cache"));
    let resolver = VendorResolver::new(store, api.clone(), fast_settings());
    let result = resolver.resolve("b8-27-eb-44-55-66").await;
    assert_eq!(result.vendor, "Raspberry Pi Trading Ltd");
    assert_eq!(result.source, VendorSource::Cache);

    let unknown = resolver.resolve("00:1B:A9:07:08:09").await;
    assert_eq!(unknown.source, VendorSource::Remote);
    assert_eq!(api.calls.load(Ordering::SeqCst), first_calls + 1);
}
