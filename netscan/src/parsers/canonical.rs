use super::{decode, ParseOutput};
use crate::model::DeviceRecord;

/// Parse the `ip|mac|hostname|vendor` interchange form, one record per line.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut out = ParseOutput::default();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(record) = DeviceRecord::from_pipe(line) else {
            out.drop_unit(line_no, "not a four-field pipe record");
            continue;
        };
        let mac_field = line.split('|').nth(1).unwrap_or("").trim();
        out.push_raw(&record.ip, mac_field, &record.hostname, &record.vendor, line_no);
    }

    out
}
