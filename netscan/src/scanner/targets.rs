use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{NetscanError, Result};

/// What to sweep: a CIDR block, an inclusive address range, or one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTarget {
    /// `192.168.1.0/24`. Network and broadcast addresses are skipped for
    /// prefixes up to /30; a /31 yields both addresses, a /32 its one.
    Network(Ipv4Network),
    /// `192.168.1.10-20` or `10.0.0.250-10.0.1.5`, both ends inclusive.
    Range { start: Ipv4Addr, end: Ipv4Addr },
    Single(Ipv4Addr),
}

impl ProbeTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || NetscanError::InvalidTarget(raw.to_string());

        if raw.contains('/') {
            let net: Ipv4Network = raw.parse().map_err(|_| invalid())?;
            // Canonicalize `192.168.1.77/24` to its network address.
            let net = Ipv4Network::new(net.network(), net.prefix()).map_err(|_| invalid())?;
            return Ok(ProbeTarget::Network(net));
        }

        if let Some((lhs, rhs)) = raw.split_once('-') {
            let start: Ipv4Addr = lhs.trim().parse().map_err(|_| invalid())?;
            let rhs = rhs.trim();
            let end = if let Ok(last) = rhs.parse::<u8>() {
                let [a, b, c, _] = start.octets();
                Ipv4Addr::new(a, b, c, last)
            } else {
                rhs.parse::<Ipv4Addr>().map_err(|_| invalid())?
            };
            if u32::from(end) < u32::from(start) {
                return Err(invalid());
            }
            return Ok(ProbeTarget::Range { start, end });
        }

        raw.parse::<Ipv4Addr>()
            .map(ProbeTarget::Single)
            .map_err(|_| invalid())
    }

    /// First and last candidate host as integers, inclusive.
    fn bounds(&self) -> (u32, u32) {
        match *self {
            ProbeTarget::Network(net) => {
                let first = u32::from(net.network());
                let last = u32::from(net.broadcast());
                if net.prefix() <= 30 {
                    (first + 1, last - 1)
                } else {
                    (first, last)
                }
            }
            ProbeTarget::Range { start, end } => (u32::from(start), u32::from(end)),
            ProbeTarget::Single(ip) => (u32::from(ip), u32::from(ip)),
        }
    }

    /// Number of candidate hosts.
    pub fn host_count(&self) -> u64 {
        let (first, last) = self.bounds();
        u64::from(last - first) + 1
    }

    /// Candidate hosts in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + Send + 'static {
        let (first, last) = self.bounds();
        (first..=last).map(Ipv4Addr::from)
    }

    /// Materialize the candidate list, refusing targets larger than `limit`.
    pub fn expand(&self, limit: u64) -> Result<Vec<Ipv4Addr>> {
        let hosts = self.host_count();
        if hosts > limit {
            return Err(NetscanError::TargetTooLarge {
                target: self.to_string(),
                hosts,
                limit,
            });
        }
        Ok(self.hosts().collect())
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Network(net) => write!(f, "{net}"),
            ProbeTarget::Range { start, end } => write!(f, "{start}-{end}"),
            ProbeTarget::Single(ip) => write!(f, "{ip}"),
        }
    }
}

impl FromStr for ProbeTarget {
    type Err = NetscanError;

    fn from_str(s: &str) -> Result<Self> {
        ProbeTarget::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(target: &str) -> Vec<String> {
        ProbeTarget::parse(target)
            .expect("valid target")
            .hosts()
            .map(|ip| ip.to_string())
            .collect()
    }

    #[test]
    fn test_slash_30_has_two_hosts() {
        assert_eq!(ips("192.168.1.0/30"), vec!["192.168.1.1", "192.168.1.2"]);
    }

    #[test]
    fn test_slash_24_excludes_network_and_broadcast() {
        let target = ProbeTarget::parse("10.1.2.0/24").expect("valid");
        assert_eq!(target.host_count(), 254);
        let hosts: Vec<Ipv4Addr> = target.hosts().collect();
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(10, 1, 2, 1)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 1, 2, 254)));
    }

    #[test]
    fn test_slash_31_and_32() {
        assert_eq!(ips("10.0.0.0/31"), vec!["10.0.0.0", "10.0.0.1"]);
        assert_eq!(ips("10.0.0.7/32"), vec!["10.0.0.7"]);
    }

    #[test]
    fn test_host_bits_are_masked() {
        let target = ProbeTarget::parse("192.168.1.77/30").expect("valid");
        assert_eq!(target.to_string(), "192.168.1.76/30");
        assert_eq!(ips("192.168.1.77/30"), vec!["192.168.1.77", "192.168.1.78"]);
    }

    #[test]
    fn test_last_octet_range() {
        assert_eq!(ips("192.168.1.10-12"), vec!["192.168.1.10", "192.168.1.11", "192.168.1.12"]);
    }

    #[test]
    fn test_full_range_crosses_octets() {
        let target = ProbeTarget::parse("10.0.0.254 - 10.0.1.1").expect("valid");
        assert_eq!(target.host_count(), 4);
        assert_eq!(
            ips("10.0.0.254-10.0.1.1"),
            vec!["10.0.0.254", "10.0.0.255", "10.0.1.0", "10.0.1.1"]
        );
    }

    #[test]
    fn test_single_host() {
        assert_eq!(ips("172.16.0.9"), vec!["172.16.0.9"]);
    }

    #[test]
    fn test_invalid_targets() {
        for bad in ["", "foo", "10.0.0.0/33", "10.0.0.20-10", "10.0.0.1-300", "fe80::/64"] {
            assert!(
                matches!(ProbeTarget::parse(bad), Err(NetscanError::InvalidTarget(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_expand_enforces_limit() {
        let target = ProbeTarget::parse("10.0.0.0/16").expect("valid");
        assert_eq!(target.host_count(), 65534);
        assert!(target.expand(65536).is_ok());
        match target.expand(1024) {
            Err(NetscanError::TargetTooLarge { hosts, limit, .. }) => {
                assert_eq!(hosts, 65534);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected TargetTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_whole_internet_does_not_overflow() {
        let target = ProbeTarget::parse("0.0.0.0/0").expect("valid");
        assert_eq!(target.host_count(), (1u64 << 32) - 2);
        assert!(target.expand(65536).is_err());
    }
}
