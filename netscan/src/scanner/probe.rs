use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::arp::ArpCache;
use super::hostname::ReverseResolver;
use crate::config::ProberConfig;

/// Ports tried by the TCP reachability fallback.
const FALLBACK_PORTS: [u16; 3] = [80, 443, 22];

const PING_PAYLOAD: [u8; 56] = [0; 56];

/// Outcome of one TCP port attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
    TimedOut,
}

/// The network side of a sweep. Every call is bounded by its timeout.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Round-trip time when the host answered within `timeout`.
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> Option<Duration>;

    async fn port_open(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> PortState;

    async fn mac_for(&self, _ip: Ipv4Addr) -> Option<String> {
        None
    }

    async fn hostname_for(&self, _ip: Ipv4Addr, _timeout: Duration) -> Option<String> {
        None
    }
}

/// Probing over real sockets: ICMP echo via surge-ping, TCP connects,
/// the system ARP table and reverse DNS.
pub struct SystemProbe {
    icmp: Option<Client>,
    next_id: AtomicU16,
    arp: Option<ArpCache>,
    dns: Option<ReverseResolver>,
}

impl SystemProbe {
    pub fn new(config: &ProberConfig) -> Self {
        let icmp = match Client::new(&Config::default()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("ICMP socket unavailable ({e}), falling back to TCP reachability checks");
                None
            }
        };
        Self {
            icmp,
            next_id: AtomicU16::new(1),
            arp: config.resolve_macs.then(ArpCache::new),
            dns: config.resolve_hostnames.then(ReverseResolver::from_system),
        }
    }

    async fn icmp_echo(&self, client: &Client, ip: Ipv4Addr, timeout: Duration) -> Option<Duration> {
        let id = PingIdentifier(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut pinger = client.pinger(IpAddr::V4(ip), id).await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(0), &PING_PAYLOAD).await {
            Ok((_, rtt)) => Some(rtt),
            Err(e) => {
                debug!(%ip, "no echo reply: {e}");
                None
            }
        }
    }

    /// A host is up if any common port accepts or actively refuses.
    async fn tcp_reachable(&self, ip: Ipv4Addr, timeout: Duration) -> Option<Duration> {
        let started = Instant::now();
        let attempts = FALLBACK_PORTS.map(|port| connect(ip, port, timeout));
        let states = futures::future::join_all(attempts).await;
        states
            .iter()
            .any(|s| *s != PortState::TimedOut)
            .then(|| started.elapsed())
    }
}

#[async_trait]
impl HostProbe for SystemProbe {
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> Option<Duration> {
        match &self.icmp {
            Some(client) => self.icmp_echo(client, ip, timeout).await,
            None => self.tcp_reachable(ip, timeout).await,
        }
    }

    async fn port_open(&self, ip: Ipv4Addr, port: u16, timeout: Duration) -> PortState {
        connect(ip, port, timeout).await
    }

    async fn mac_for(&self, ip: Ipv4Addr) -> Option<String> {
        self.arp.as_ref()?.lookup(ip).await
    }

    async fn hostname_for(&self, ip: Ipv4Addr, timeout: Duration) -> Option<String> {
        self.dns.as_ref()?.lookup(ip, timeout).await
    }
}

async fn connect(ip: Ipv4Addr, port: u16, timeout: Duration) -> PortState {
    let addr = SocketAddr::from((ip, port));
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => PortState::Open,
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => PortState::Closed,
        Ok(Err(_)) | Err(_) => PortState::TimedOut,
    }
}
