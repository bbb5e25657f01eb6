//! Input format detection.
//!
//! Classification only ever looks at the first [`SAMPLE_LINES`] lines.
//! Rules are evaluated in order and the first match wins, so a JSON array
//! of ARP-looking strings is still JSON.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::model::DeviceRecord;

/// Number of leading lines inspected.
pub const SAMPLE_LINES: usize = 20;

/// First header cell: names a device column.
static CSV_LEAD_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(ip|mac|host|address|device)").expect("valid regex"));

/// Any header cell: an identifier of at most two words (`IP Address`).
static CSV_HEADER_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][\w./-]*(?: [\w./-]+)?$").expect("valid regex")
});

static ARP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\)\s+at\s+\S+").expect("valid regex")
});

/// Source formats understood by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Network-scan XML report (nmap `-oX`).
    #[serde(rename = "xml")]
    XmlReport,
    /// `arp -a` output.
    #[serde(rename = "arp")]
    ArpTable,
    Csv,
    Json,
    /// `ip|mac|hostname|vendor` lines.
    Canonical,
    /// Anything else: per-line IP/MAC token extraction.
    #[serde(rename = "text")]
    PlainText,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::XmlReport => "xml",
            FormatKind::ArpTable => "arp",
            FormatKind::Csv => "csv",
            FormatKind::Json => "json",
            FormatKind::Canonical => "canonical",
            FormatKind::PlainText => "text",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = crate::error::NetscanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "nmap" => Ok(FormatKind::XmlReport),
            "arp" => Ok(FormatKind::ArpTable),
            "csv" => Ok(FormatKind::Csv),
            "json" => Ok(FormatKind::Json),
            "canonical" | "pipe" => Ok(FormatKind::Canonical),
            "text" | "plain" | "txt" => Ok(FormatKind::PlainText),
            other => Err(crate::error::NetscanError::FormatUnrecognized(other.to_string())),
        }
    }
}

/// Decode at most the first `lines` lines of `raw`, dropping a UTF-8 BOM.
pub(crate) fn prefix_lines(raw: &[u8], lines: usize) -> String {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    let end = raw
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(lines.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// A comma-separated row of short column names, the first naming a device
/// field. Prose that merely starts with `host` and contains a comma is not.
fn is_csv_header(line: &str) -> bool {
    let cells: Vec<&str> = line
        .split(',')
        .map(|c| c.trim().trim_matches('"').trim())
        .collect();
    cells.len() >= 2
        && CSV_LEAD_CELL.is_match(cells[0])
        && cells
            .iter()
            .all(|c| c.is_empty() || CSV_HEADER_CELL.is_match(c))
}

/// Classify raw input.
///
/// Never fails: input matching nothing (including empty input) is
/// `PlainText`, which then legitimately yields zero records.
pub fn detect(sample: &[u8]) -> FormatKind {
    let prefix = prefix_lines(sample, SAMPLE_LINES);
    let lower = prefix.to_ascii_lowercase();

    if lower.contains("<?xml") || lower.contains("<nmaprun") {
        return FormatKind::XmlReport;
    }

    let trimmed = prefix.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return FormatKind::Json;
    }

    let first_line = trimmed.lines().next().unwrap_or("");
    if is_csv_header(first_line) {
        return FormatKind::Csv;
    }

    if prefix.lines().any(|l| ARP_LINE.is_match(l)) {
        return FormatKind::ArpTable;
    }

    let mut content_lines = prefix.lines().filter(|l| !l.trim().is_empty()).peekable();
    if content_lines.peek().is_some()
        && content_lines.all(|l| DeviceRecord::from_pipe(l).is_some())
    {
        return FormatKind::Canonical;
    }

    FormatKind::PlainText
}
