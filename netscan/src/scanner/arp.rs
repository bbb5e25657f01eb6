use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::model::DeviceRecord;

/// Minimum spacing between two reloads of the system table.
const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Read the system ARP table from /proc/net/arp (Linux), falling back to
/// `arp -a` elsewhere.
///
/// Format:
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 10.10.0.1        0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
/// ```
pub async fn read_arp_table() -> Result<Vec<DeviceRecord>> {
    match tokio::fs::read_to_string("/proc/net/arp").await {
        Ok(content) => Ok(parse_proc_arp(&content)),
        Err(_) => {
            debug!("/proc/net/arp not available, falling back to arp command");
            read_arp_command().await
        }
    }
}

/// Entries from `/proc/net/arp` content; incomplete (flags `0x0`) and
/// all-zero/broadcast rows are skipped.
pub fn parse_proc_arp(content: &str) -> Vec<DeviceRecord> {
    content
        .lines()
        .skip(1) // header
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let (ip, flags, mac) = (parts.first()?, parts.get(2)?, parts.get(3)?);
            if *flags == "0x0" || *mac == "00:00:00:00:00:00" || crate::mac::is_broadcast(mac) {
                return None;
            }
            let record = DeviceRecord::new(*ip, mac, "");
            (record.ipv4().is_some() && !record.mac.is_empty()).then_some(record)
        })
        .collect()
}

/// Fallback: `arp -a` output, fed through the ARP table parser.
async fn read_arp_command() -> Result<Vec<DeviceRecord>> {
    let output = tokio::process::Command::new("arp")
        .arg("-a")
        .output()
        .await?;
    Ok(crate::parsers::arp::parse(&output.stdout).records)
}

/// IP to MAC view of the system ARP table, reloaded on demand.
///
/// Hosts usually appear in the kernel table only after they answered a
/// probe, so a miss triggers a reload (at most every 500 ms).
#[derive(Debug, Default)]
pub struct ArpCache {
    entries: DashMap<Ipv4Addr, String>,
    last_refresh: Mutex<Option<Instant>>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
        if let Some(mac) = self.entries.get(&ip) {
            return Some(mac.clone());
        }
        self.refresh().await;
        self.entries.get(&ip).map(|mac| mac.clone())
    }

    async fn refresh(&self) {
        let mut last = self.last_refresh.lock().await;
        if last.is_some_and(|t| t.elapsed() < REFRESH_INTERVAL) {
            return;
        }
        match read_arp_table().await {
            Ok(records) => self.load(records),
            Err(e) => debug!("ARP table unavailable: {e}"),
        }
        *last = Some(Instant::now());
    }

    fn load(&self, records: Vec<DeviceRecord>) {
        for record in records {
            if let Some(ip) = record.ipv4() {
                self.entries.insert(ip, record.mac);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_ARP: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
10.10.0.1        0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
10.10.0.7        0x1         0x0         00:00:00:00:00:00     *        eth0
10.10.0.9        0x1         0x2         52:54:00:12:34:56     *        br0
10.10.0.255      0x1         0x2         ff:ff:ff:ff:ff:ff     *        eth0
garbage
";

    #[test]
    fn test_parse_proc_arp() {
        let records = parse_proc_arp(PROC_ARP);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ip, "10.10.0.1");
        assert_eq!(records[0].mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(records[1].mac, "52:54:00:12:34:56");
    }

    #[tokio::test]
    async fn test_cache_serves_loaded_entries() {
        let cache = ArpCache::new();
        cache.load(parse_proc_arp(PROC_ARP));
        assert_eq!(
            cache.lookup(Ipv4Addr::new(10, 10, 0, 9)).await.as_deref(),
            Some("52:54:00:12:34:56")
        );
    }
}
