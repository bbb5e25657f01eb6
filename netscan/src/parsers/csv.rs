use ::csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use super::{decode, ParseOutput};
use crate::model::valid_ipv4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Ip,
    Mac,
    Hostname,
    Vendor,
}

/// Column positions resolved from the header row (or positional defaults).
#[derive(Debug, Default, PartialEq, Eq)]
struct Layout {
    ip: Option<usize>,
    mac: Option<usize>,
    hostname: Option<usize>,
    vendor: Option<usize>,
}

impl Layout {
    fn positional() -> Self {
        Self {
            ip: Some(0),
            mac: Some(1),
            hostname: Some(2),
            vendor: None,
        }
    }

    fn from_header(header: &StringRecord) -> Self {
        let mut layout = Layout::default();
        for (idx, name) in header.iter().enumerate() {
            let slot = match classify(name) {
                Some(Column::Ip) => &mut layout.ip,
                Some(Column::Mac) => &mut layout.mac,
                Some(Column::Hostname) => &mut layout.hostname,
                Some(Column::Vendor) => &mut layout.vendor,
                None => continue,
            };
            slot.get_or_insert(idx);
        }
        layout
    }

    fn is_recognized(&self) -> bool {
        *self != Layout::default()
    }
}

/// Map a header name to a logical column, case- and separator-insensitively.
fn classify(name: &str) -> Option<Column> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if key.starts_with("mac") || matches!(key.as_str(), "physical" | "hardware" | "hwaddress" | "hwaddr") {
        Some(Column::Mac)
    } else if key.starts_with("ip") || key.starts_with("address") {
        Some(Column::Ip)
    } else if key.starts_with("host") || key.starts_with("name") || key.starts_with("device") {
        Some(Column::Hostname)
    } else if key.starts_with("vendor") || key.starts_with("manufacturer") {
        Some(Column::Vendor)
    } else {
        None
    }
}

/// Pick the delimiter that occurs most on the first line (`,` on ties).
fn sniff_delimiter(text: &str) -> u8 {
    let first = text.lines().next().unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| (first.matches(*d as char).count(), *d == b','))
        .unwrap_or(b',')
}

fn field<'r>(row: &'r StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| row.get(i)).unwrap_or("")
}

/// Parse comma-separated device listings.
///
/// The header row is matched case-insensitively against `ip`/`address`,
/// `mac`, `host`/`name`/`device` and `vendor` prefixes. Without a
/// recognizable header the columns are taken positionally as
/// ip, mac, hostname, but only when the first row starts with an IPv4
/// address; otherwise the file has no usable rows.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut out = ParseOutput::default();

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(sniff_delimiter(&text))
        .from_reader(text.as_bytes());

    let mut rows = reader.records().enumerate();

    let Some((_, first)) = rows.next() else {
        return out;
    };
    let first = match first {
        Ok(row) => row,
        Err(e) => {
            warn!("CSV header row unreadable: {e}");
            return out;
        }
    };

    let first_is_data = valid_ipv4(field(&first, Some(0))).is_some();
    let header_layout = Layout::from_header(&first);

    let (layout, pending_first) = if !first_is_data && header_layout.is_recognized() {
        (header_layout, None)
    } else if first_is_data {
        debug!("No CSV header recognized, using positional columns");
        (Layout::positional(), Some(first))
    } else {
        warn!("CSV has neither a recognizable header nor IPv4 data rows");
        return out;
    };

    if layout.ip.is_none() {
        warn!("CSV header has no IP column, no usable rows");
        return out;
    }

    let emit = |row: &StringRecord, line: usize, out: &mut ParseOutput| {
        out.push_raw(
            field(row, layout.ip),
            field(row, layout.mac),
            field(row, layout.hostname),
            field(row, layout.vendor),
            line,
        );
    };

    if let Some(row) = pending_first {
        emit(&row, 1, &mut out);
    }

    for (idx, row) in rows {
        let line = idx + 1;
        match row {
            Ok(row) if row.iter().all(|f| f.is_empty()) => continue,
            Ok(row) => emit(&row, line, &mut out),
            Err(e) => out.drop_unit(line, &format!("unreadable CSV row: {e}")),
        }
    }

    out
}
