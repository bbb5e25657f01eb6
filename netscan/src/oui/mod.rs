//! Offline MAC vendor lookup (OUI, Organizationally Unique Identifier).
//!
//! Three layers, later ones overriding earlier ones: a small embedded table
//! of common prefixes, an optional IEEE `oui.txt` registry file, and user
//! supplied custom prefixes. Special-purpose prefixes known to
//! [`crate::mac::special_kind`] answer when nothing else does.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::OuiConfig;
use crate::error::Result;

/// Embedded prefixes, keyed `XX:XX:XX`.
static BUILTIN: &[(&str, &str)] = &[
    ("00:50:56", "VMware"),
    ("00:0C:29", "VMware"),
    ("52:54:00", "QEMU/KVM"),
    ("08:00:27", "VirtualBox"),
    ("DC:A6:32", "Raspberry Pi"),
    ("B8:27:EB", "Raspberry Pi"),
    ("E4:5F:01", "Raspberry Pi"),
    ("3C:22:FB", "Apple, Inc."),
    ("F8:FF:C2", "Apple, Inc."),
    ("A4:83:E7", "Apple, Inc."),
    ("60:03:08", "Apple, Inc."),
    ("AC:DE:48", "Apple, Inc."),
    ("28:6C:07", "XIAOMI"),
    ("7C:49:EB", "Samsung"),
    ("E8:6F:38", "TP-Link"),
    ("30:B5:C2", "TP-Link"),
    ("B0:BE:76", "TP-Link"),
    ("3C:84:6A", "TP-Link"),
    ("FC:EC:DA", "Ubiquiti"),
    ("80:2A:A8", "Ubiquiti"),
    ("68:D7:9A", "Ubiquiti"),
    ("00:1B:63", "Apple, Inc."),
    ("00:11:32", "Synology"),
    ("00:00:0C", "Cisco Systems, Inc"),
];

/// `XX-XX-XX   (hex)		Vendor Name` lines of the IEEE MA-L registry.
static IEEE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9A-Fa-f]{2})-([0-9A-Fa-f]{2})-([0-9A-Fa-f]{2})\s+\(hex\)\s+(.+?)\s*$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Default)]
pub struct OuiDatabase {
    entries: HashMap<String, String>,
}

impl OuiDatabase {
    /// Only the embedded table.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(prefix, vendor)| (prefix.to_string(), vendor.to_string()))
            .collect();
        Self { entries }
    }

    /// Embedded table, then the configured registry file, then custom prefixes.
    pub fn from_config(config: &OuiConfig) -> Result<Self> {
        let mut db = Self::builtin();
        if let Some(path) = &config.database_path {
            let added = db.load_ieee_file(path)?;
            info!(path = %path.display(), entries = added, "Loaded OUI registry");
        }
        db.add_custom(&config.custom);
        Ok(db)
    }

    /// Load an IEEE `oui.txt` file. Returns the number of entries read.
    pub fn load_ieee_file(&mut self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        Ok(self.load_ieee_str(&contents))
    }

    /// Load IEEE registry text; lines that are not `(hex)` entries are ignored.
    pub fn load_ieee_str(&mut self, contents: &str) -> usize {
        let mut added = 0;
        for caps in contents.lines().filter_map(|l| IEEE_LINE.captures(l)) {
            let prefix = format!("{}:{}:{}", &caps[1], &caps[2], &caps[3]).to_ascii_uppercase();
            self.entries.insert(prefix, caps[4].to_string());
            added += 1;
        }
        added
    }

    /// Add user prefixes. Keys may be written in any MAC notation
    /// (`aa:bb:cc`, `AA-BB-CC`, `aabbcc`).
    pub fn add_custom(&mut self, custom: &HashMap<String, String>) {
        for (raw, vendor) in custom {
            match normalize_prefix(raw) {
                Some(prefix) => {
                    self.entries.insert(prefix, vendor.clone());
                }
                None => warn!(prefix = %raw, "Ignoring malformed custom OUI prefix"),
            }
        }
    }

    /// Look up the vendor for a MAC address in any accepted notation.
    pub fn lookup(&self, mac: &str) -> Option<&str> {
        let prefix = crate::mac::oui(mac)?;
        self.entries
            .get(&prefix)
            .map(String::as_str)
            .or_else(|| crate::mac::special_kind(mac))
    }

    /// Entries whose vendor name contains `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<(&str, &str)> {
        let needle = query.to_lowercase();
        let mut hits: Vec<(&str, &str)> = self
            .entries
            .iter()
            .filter(|(_, vendor)| vendor.to_lowercase().contains(&needle))
            .map(|(prefix, vendor)| (prefix.as_str(), vendor.as_str()))
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_prefix(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_uppercase();
    Some(format!("{}:{}:{}", &hex[0..2], &hex[2..4], &hex[4..6]))
}
