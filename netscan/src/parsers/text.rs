use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{decode, ParseOutput};
use crate::model::valid_ipv4;

static IPV4_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("valid regex"));

/// Colon/dash pairs (leading zeros optional), Cisco dotted triplets, bare 12 hex.
static MAC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:[0-9A-Fa-f]{1,2}(?:[:-][0-9A-Fa-f]{1,2}){5}|[0-9A-Fa-f]{4}(?:\.[0-9A-Fa-f]{4}){2}|[0-9A-Fa-f]{12})\b",
    )
    .expect("valid regex")
});

/// First MAC-looking token in `line`. A colon/dash match bordered by a further
/// separator is part of a longer token (IPv6, EUI-64) and is skipped, and a
/// bare 12-digit run needs a hex letter so timestamps and serials are not MACs.
fn mac_token(line: &str) -> Option<&str> {
    MAC_TOKEN
        .find_iter(line)
        .find(|m| {
            let token = m.as_str();
            if token.contains([':', '-']) {
                let before = line[..m.start()].chars().next_back();
                let after = line[m.end()..].chars().next();
                !matches!(before, Some(':' | '-')) && !matches!(after, Some(':' | '-'))
            } else if token.contains('.') {
                true
            } else {
                token.chars().any(|c| c.is_ascii_alphabetic())
            }
        })
        .map(|m| m.as_str())
}

/// Characters trimmed off a word before judging it as a hostname.
const WORD_PUNCT: &[char] = &['(', ')', '[', ']', '{', '}', '<', '>', ',', ';', ':', '"', '\''];

fn looks_like_hostname(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_alphabetic())
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// First word on the line that is neither the IP nor the MAC and reads like a name.
fn hostname_token<'a>(line: &'a str, ip: &str, mac: &str) -> &'a str {
    line.split_whitespace()
        .map(|w| w.trim_matches(WORD_PUNCT))
        .filter(|w| !w.is_empty() && *w != ip && *w != mac)
        .filter(|w| !IPV4_TOKEN.is_match(w) && mac_token(w).is_none())
        .find(|w| looks_like_hostname(w))
        .unwrap_or("")
}

/// Parse free-form text, one candidate device per line.
///
/// Lines are deduplicated verbatim first. A line needs an IPv4 token to
/// produce a record; one with only a MAC is counted as dropped.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut out = ParseOutput::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() || !seen.insert(line) {
            continue;
        }

        let ip = IPV4_TOKEN
            .find_iter(line)
            .map(|m| m.as_str())
            .find(|candidate| valid_ipv4(candidate).is_some());
        let mac = mac_token(line).unwrap_or("");

        match ip {
            Some(ip) => {
                let hostname = hostname_token(line, ip, mac);
                out.push_raw(ip, mac, hostname, "", line_no);
            }
            None if mac.is_empty() => {
                out.drop_unit(line_no, "no IPv4 or MAC token");
            }
            None => {
                out.drop_unit(line_no, "MAC without an IPv4 address");
            }
        }
    }

    out
}
