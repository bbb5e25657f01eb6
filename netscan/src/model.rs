use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::warn;

/// Vendor value meaning "lookup attempted, no match".
pub const VENDOR_UNKNOWN: &str = "Unknown";

/// Vendor value meaning "no usable MAC, lookup never attempted".
pub const VENDOR_NOT_APPLICABLE: &str = "N/A";

const PIPE: char = '|';

/// A device as every parser and the prober converge to it.
///
/// `ip` is the identity; every other field is optional and represented by an
/// empty string when unknown. `mac` is either empty or canonical
/// `XX:XX:XX:XX:XX:XX` (see [`crate::mac::normalize`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub vendor: String,
}

impl DeviceRecord {
    /// Build a record, normalizing the MAC (a malformed MAC becomes empty).
    pub fn new(ip: impl Into<String>, mac: &str, hostname: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: crate::mac::normalize_or_empty(mac),
            hostname: hostname.into(),
            vendor: String::new(),
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Numeric form of `ip`, used for ordering.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ip.parse().ok()
    }

    /// Whether the vendor still needs resolving.
    pub fn needs_vendor(&self) -> bool {
        !self.mac.is_empty() && self.vendor.is_empty()
    }

    /// Copy every non-empty field of `newer` over `self`.
    ///
    /// Empty fields in `newer` never erase populated fields in `self`.
    /// Returns true if anything changed.
    pub fn absorb(&mut self, newer: &DeviceRecord) -> bool {
        let mut changed = false;
        for (mine, theirs) in [
            (&mut self.mac, &newer.mac),
            (&mut self.hostname, &newer.hostname),
            (&mut self.vendor, &newer.vendor),
        ] {
            if !theirs.is_empty() && *mine != *theirs {
                *mine = theirs.clone();
                changed = true;
            }
        }
        changed
    }

    /// Serialize as `ip|mac|hostname|vendor`.
    ///
    /// The pipe form has no escaping; a `|` inside a field is replaced by
    /// `/`. Use the JSON form when fields may legitimately contain pipes.
    pub fn to_pipe(&self) -> String {
        let fields = [&self.ip, &self.mac, &self.hostname, &self.vendor].map(|f| {
            if f.contains(PIPE) {
                warn!(ip = %self.ip, field = %f, "Pipe character in field replaced");
                f.replace(PIPE, "/")
            } else {
                f.to_string()
            }
        });
        fields.join("|")
    }

    /// Parse one `ip|mac|hostname|vendor` line.
    ///
    /// Returns `None` unless the line has exactly four fields and the first
    /// is a valid IPv4 address.
    pub fn from_pipe(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(PIPE).collect();
        let [ip, mac, hostname, vendor] = fields.as_slice() else {
            return None;
        };
        let ip = ip.trim();
        ip.parse::<Ipv4Addr>().ok()?;
        Some(DeviceRecord::new(ip, mac.trim(), hostname.trim()).with_vendor(vendor.trim()))
    }
}

/// Validate a dotted-quad IPv4 string, returning it trimmed.
pub fn valid_ipv4(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    trimmed.parse::<Ipv4Addr>().ok().map(|_| trimmed.to_string())
}
