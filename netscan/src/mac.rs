//! MAC address normalization and classification.
//!
//! Every parser funnels hardware addresses through [`normalize`] before a
//! record is emitted, so a stored MAC is always `XX:XX:XX:XX:XX:XX`
//! uppercase hex or empty.

/// Special-purpose and virtualisation OUIs (first 3 octets, bare hex).
const SPECIAL_OUIS: &[(&str, &str)] = &[
    ("01005E", "IPv4 Multicast"),
    ("333300", "IPv6 Multicast"),
    ("005056", "VMware"),
    ("000C29", "VMware"),
    ("000569", "VMware"),
    ("080027", "VirtualBox"),
    ("0A0027", "VirtualBox"),
    ("525400", "QEMU/KVM"),
    ("FE5400", "QEMU/KVM"),
    ("00163E", "Xen"),
    ("001C42", "Parallels"),
    ("00155D", "Hyper-V"),
];

/// Normalize a MAC address in any common notation to `XX:XX:XX:XX:XX:XX`.
///
/// Accepted inputs:
/// - colon / dash / space separated pairs (`aa:bb:cc:dd:ee:ff`)
/// - six groups with elided leading zeros (`0:1b:63:a:b:c`, as printed by BSD `arp`)
/// - Cisco dot notation (`aabb.ccdd.eeff`)
/// - bare 12 hex digits (`aabbccddeeff`)
///
/// Returns `None` when the input does not reduce to exactly 12 hex digits.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let groups: Vec<&str> = trimmed.split([':', '-', ' ']).collect();
    let hex: String = if groups.len() == 6
        && groups
            .iter()
            .all(|g| (1..=2).contains(&g.len()) && g.chars().all(|c| c.is_ascii_hexdigit()))
    {
        groups.iter().map(|g| format!("{g:0>2}")).collect()
    } else {
        trimmed
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
            .collect()
    };

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let hex = hex.to_ascii_uppercase();
    let pairs: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Some(pairs.join(":"))
}

/// Normalize, mapping failures to an empty string (the "unknown MAC" value).
pub fn normalize_or_empty(raw: &str) -> String {
    normalize(raw).unwrap_or_default()
}

/// Like [`normalize`], reporting the rejected input as an error.
pub fn parse(raw: &str) -> crate::error::Result<String> {
    normalize(raw).ok_or_else(|| crate::error::NetscanError::MalformedMac(raw.to_string()))
}

/// Whether the input is a MAC address in any accepted notation.
pub fn is_valid(raw: &str) -> bool {
    normalize(raw).is_some()
}

/// First three octets (`XX:XX:XX`) of a MAC address.
pub fn oui(raw: &str) -> Option<String> {
    normalize(raw).map(|m| m[..8].to_string())
}

fn first_octet(raw: &str) -> Option<u8> {
    let mac = normalize(raw)?;
    u8::from_str_radix(&mac[..2], 16).ok()
}

/// Broadcast address `FF:FF:FF:FF:FF:FF`.
pub fn is_broadcast(raw: &str) -> bool {
    normalize(raw).is_some_and(|m| m == "FF:FF:FF:FF:FF:FF")
}

/// Group bit set (multicast or broadcast).
pub fn is_multicast(raw: &str) -> bool {
    first_octet(raw).is_some_and(|b| b & 0x01 != 0)
}

/// Locally administered bit set (randomised / virtual MACs).
pub fn is_locally_administered(raw: &str) -> bool {
    first_octet(raw).is_some_and(|b| b & 0x02 != 0)
}

/// Label for well-known special or virtual-machine OUIs.
pub fn special_kind(raw: &str) -> Option<&'static str> {
    let mac = normalize(raw)?;
    if mac == "FF:FF:FF:FF:FF:FF" {
        return Some("Broadcast");
    }
    let bare: String = mac[..8].chars().filter(|c| *c != ':').collect();
    SPECIAL_OUIS
        .iter()
        .find(|(prefix, _)| *prefix == bare)
        .map(|(_, label)| *label)
}
