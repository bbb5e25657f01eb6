use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::{decode, ParseOutput};

/// `<name> (<ipv4>) at <mac> ...`. Whatever follows the MAC (`[ether]`,
/// `PERM`/`PUB`/`CM` flags, `on <iface>`, BSD `ifscope`) is ignored.
static ARP_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+\((\d{1,3}(?:\.\d{1,3}){3})\)\s+at\s+(\S+)").expect("valid regex")
});

/// Hardware-address tokens meaning "no resolved MAC".
fn is_unresolved(mac: &str) -> bool {
    let lower = mac.to_ascii_lowercase();
    lower.contains("incomplete") || lower == "-" || crate::mac::is_broadcast(mac)
}

/// Parse `arp -a` output.
///
/// A `?` name means no hostname. Incomplete and broadcast entries are
/// rejected outright rather than emitted with an empty MAC.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut out = ParseOutput::default();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = ARP_ENTRY.captures(line) else {
            out.drop_unit(line_no, "not an ARP cache entry");
            continue;
        };

        let name = &caps[1];
        let ip = &caps[2];
        let mac = &caps[3];

        if is_unresolved(mac) {
            debug!(line = line_no, ip, mac, "Rejecting unresolved ARP entry");
            out.stats.rejected += 1;
            continue;
        }

        let hostname = if name == "?" { "" } else { name };
        out.push_raw(ip, mac, hostname, "", line_no);
    }

    out
}
