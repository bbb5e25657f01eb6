//! Format parsers.
//!
//! Every parser is tolerant: a bad line or object is skipped and counted,
//! never fatal. A record is emitted only when an IPv4 address could be
//! extracted; everything else about a device is optional.

pub mod arp;
pub mod canonical;
pub mod csv;
pub mod json;
pub mod text;
pub mod xml;

use serde::Serialize;
use tracing::{debug, info};

use crate::detect::{self, FormatKind};
use crate::error::NetscanError;
use crate::model::DeviceRecord;

/// Per-parse counters for units that did not make it into the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Lines/objects/host blocks dropped because no IPv4 was extractable.
    pub dropped: usize,
    /// MAC values discarded by normalization (record kept with empty MAC).
    pub malformed_macs: usize,
    /// ARP lines rejected for incomplete or broadcast hardware addresses.
    pub rejected: usize,
}

/// Records produced by one parse, plus counters.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub records: Vec<DeviceRecord>,
    pub stats: ParseStats,
}

impl ParseOutput {
    /// Emit a record built from raw field values, normalizing the MAC.
    ///
    /// Drops (and counts) the unit when `ip` is not a valid IPv4 address.
    pub(crate) fn push_raw(
        &mut self,
        ip: &str,
        mac: &str,
        hostname: &str,
        vendor: &str,
        unit: usize,
    ) -> bool {
        let Some(ip) = crate::model::valid_ipv4(ip) else {
            debug!(unit, ip, "Dropping record without a usable IPv4 address");
            self.stats.dropped += 1;
            return false;
        };

        let mac_raw = mac.trim();
        let mac = if mac_raw.is_empty() {
            String::new()
        } else {
            crate::mac::parse(mac_raw).unwrap_or_else(|err| {
                debug!(unit, "Discarding MAC: {err}");
                self.stats.malformed_macs += 1;
                String::new()
            })
        };

        self.records.push(DeviceRecord {
            ip,
            mac,
            hostname: hostname.trim().to_string(),
            vendor: vendor.trim().to_string(),
        });
        true
    }

    pub(crate) fn drop_unit(&mut self, unit: usize, reason: &str) {
        let err = NetscanError::RecordUnusable(reason.to_string());
        debug!(unit, "Skipping unit: {err}");
        self.stats.dropped += 1;
    }
}

/// Parse `raw` with the parser for `kind`.
pub fn parse(kind: FormatKind, raw: &[u8]) -> ParseOutput {
    let output = match kind {
        FormatKind::XmlReport => xml::parse(raw),
        FormatKind::ArpTable => arp::parse(raw),
        FormatKind::Csv => csv::parse(raw),
        FormatKind::Json => json::parse(raw),
        FormatKind::Canonical => canonical::parse(raw),
        FormatKind::PlainText => text::parse(raw),
    };
    info!(
        format = %kind,
        records = output.records.len(),
        dropped = output.stats.dropped,
        malformed_macs = output.stats.malformed_macs,
        rejected = output.stats.rejected,
        "Parse complete"
    );
    output
}

/// Detect the format of `raw`, then parse it.
pub fn parse_auto(raw: &[u8]) -> (FormatKind, ParseOutput) {
    let kind = detect::detect(raw);
    (kind, parse(kind, raw))
}

/// Decode raw input as text, dropping a UTF-8 BOM. Invalid UTF-8 is replaced
/// rather than rejected so one bad byte cannot sink a whole file.
pub(crate) fn decode(raw: &[u8]) -> std::borrow::Cow<'_, str> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}
