use serde_json::{Map, Value};
use tracing::warn;

use super::{decode, ParseOutput};

/// Candidate key names per logical field, highest priority first.
const IP_KEYS: &[&str] = &["ip", "ipAddress", "ip_address", "IP", "address", "ipv4"];
const MAC_KEYS: &[&str] = &["mac", "macAddress", "mac_address", "MAC", "hwaddr"];
const HOST_KEYS: &[&str] = &["hostname", "host", "name", "deviceName", "device_name"];
const VENDOR_KEYS: &[&str] = &["vendor", "manufacturer", "Vendor"];

/// Keys under which exports commonly nest the device array.
const WRAPPER_KEYS: &[&str] = &["devices", "hosts", "results"];

/// First present, non-null value among `keys`, rendered as a string.
fn lookup(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
        .unwrap_or_default()
}

fn has_any(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| obj.contains_key(*k))
}

/// Flatten a top-level document into the list of candidate device values.
fn items(doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(items) => items,
        Value::Object(obj) if !has_any(&obj, IP_KEYS) => {
            let nested = WRAPPER_KEYS
                .iter()
                .find_map(|k| match obj.get(*k) {
                    Some(Value::Array(items)) => Some(items.clone()),
                    _ => None,
                });
            nested.unwrap_or_else(|| vec![Value::Object(obj)])
        }
        other => vec![other],
    }
}

/// Parse a JSON device listing.
///
/// Accepts a single object, an array of objects, an object wrapping the
/// array under `devices`/`hosts`/`results`, or JSON Lines (one object per
/// line) when the whole input is not a single document.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut out = ParseOutput::default();

    let values: Vec<Value> = match serde_json::from_str::<Value>(&text) {
        Ok(doc) => items(doc),
        Err(whole_err) => {
            let mut values = Vec::new();
            let mut bad_lines = 0usize;
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<Value>(line) {
                    Ok(v) => values.push(v),
                    Err(_) => bad_lines += 1,
                }
            }
            if values.is_empty() {
                warn!("JSON input unparseable: {whole_err}");
                return out;
            }
            out.stats.dropped += bad_lines;
            values
        }
    };

    for (idx, value) in values.into_iter().enumerate() {
        let unit = idx + 1;
        let Value::Object(obj) = value else {
            out.drop_unit(unit, "JSON item is not an object");
            continue;
        };
        out.push_raw(
            &lookup(&obj, IP_KEYS),
            &lookup(&obj, MAC_KEYS),
            &lookup(&obj, HOST_KEYS),
            &lookup(&obj, VENDOR_KEYS),
            unit,
        );
    }

    out
}
