pub mod arp;
pub mod hostname;
pub mod probe;
pub mod targets;

use futures::stream::{self, Stream, StreamExt};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use probe::{HostProbe, PortState, SystemProbe};
pub use targets::ProbeTarget;

use crate::config::ProberConfig;
use crate::error::Result;
use crate::model::DeviceRecord;

/// How much work each responding host gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Ping,
    PingAndPorts,
}

/// A host that answered the reachability check.
#[derive(Debug, Clone)]
pub struct ProbedHost {
    pub record: DeviceRecord,
    pub rtt: Duration,
    /// Open TCP ports, ascending. Empty in [`ProbeMode::Ping`].
    pub open_ports: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct ProberSettings {
    pub ping_timeout: Duration,
    pub port_timeout: Duration,
    pub max_concurrent_hosts: usize,
    pub max_concurrent_ports: usize,
    pub ports: Vec<u16>,
    pub max_hosts: u64,
}

impl From<&ProberConfig> for ProberSettings {
    fn from(config: &ProberConfig) -> Self {
        Self {
            ping_timeout: Duration::from_millis(config.ping_timeout_ms),
            port_timeout: Duration::from_millis(config.port_timeout_ms),
            max_concurrent_hosts: config.max_concurrent_hosts.max(1),
            max_concurrent_ports: config.max_concurrent_ports.max(1),
            ports: config.ports.clone(),
            max_hosts: config.max_hosts,
        }
    }
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self::from(&ProberConfig::default())
    }
}

/// Bounded-concurrency subnet sweeper.
///
/// Host probes run at most `max_concurrent_hosts` at a time; port connects
/// share a separate pool of `max_concurrent_ports` slots across the sweep.
#[derive(Clone)]
pub struct Prober {
    probe: Arc<dyn HostProbe>,
    settings: Arc<ProberSettings>,
    port_slots: Arc<Semaphore>,
}

impl Prober {
    pub fn new(probe: Arc<dyn HostProbe>, settings: ProberSettings) -> Self {
        let port_slots = Arc::new(Semaphore::new(settings.max_concurrent_ports.max(1)));
        Self {
            probe,
            settings: Arc::new(settings),
            port_slots,
        }
    }

    /// Prober backed by real sockets.
    pub fn system(config: &ProberConfig) -> Self {
        Self::new(Arc::new(SystemProbe::new(config)), ProberSettings::from(config))
    }

    pub fn settings(&self) -> &ProberSettings {
        &self.settings
    }

    /// Sweep `target`, yielding each responding host as soon as it answers.
    ///
    /// Hosts that time out are left out of the stream; nothing is retried.
    /// Fails up front if the target expands beyond `max_hosts`.
    pub fn probe(
        &self,
        target: &ProbeTarget,
        mode: ProbeMode,
    ) -> Result<impl Stream<Item = ProbedHost> + Send + 'static> {
        let candidates = target.expand(self.settings.max_hosts)?;
        let total = candidates.len();
        info!(%target, candidates = total, ?mode, "Probe sweep started");

        let responded = Arc::new(AtomicUsize::new(0));
        let counter = responded.clone();
        let this = self.clone();
        let hosts = stream::iter(candidates)
            .map(move |ip| {
                let this = this.clone();
                async move { this.probe_host(ip, mode).await }
            })
            .buffer_unordered(self.settings.max_concurrent_hosts.max(1))
            .filter_map(futures::future::ready)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });

        let label = target.to_string();
        let finished = stream::once(async move {
            info!(
                target = %label,
                candidates = total,
                responded = responded.load(Ordering::Relaxed),
                "Probe sweep finished"
            );
            None::<ProbedHost>
        })
        .filter_map(futures::future::ready);

        Ok(hosts.chain(finished))
    }

    /// [`Prober::probe`] that stops yielding once `cancel` fires. Hosts
    /// already yielded stay valid.
    pub fn probe_until(
        &self,
        target: &ProbeTarget,
        mode: ProbeMode,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = ProbedHost> + Send + 'static> {
        let hosts = self.probe(target, mode)?;
        let label = target.to_string();
        let stop = async move {
            cancel.cancelled_owned().await;
            info!(target = %label, "Probe sweep cancelled");
        };
        Ok(hosts.take_until(stop))
    }

    /// Run a whole sweep and collect the responding hosts in address order.
    pub async fn sweep(
        &self,
        target: &ProbeTarget,
        mode: ProbeMode,
        cancel: CancellationToken,
    ) -> Result<Vec<ProbedHost>> {
        let mut hosts: Vec<ProbedHost> = self.probe_until(target, mode, cancel)?.collect().await;
        hosts.sort_by_key(|h| h.record.ipv4());
        Ok(hosts)
    }

    async fn probe_host(&self, ip: Ipv4Addr, mode: ProbeMode) -> Option<ProbedHost> {
        let timeout = self.settings.ping_timeout;
        let rtt = tokio::time::timeout(timeout, self.probe.ping(ip, timeout))
            .await
            .ok()
            .flatten()?;

        let ports = async {
            match mode {
                ProbeMode::Ping => Vec::new(),
                ProbeMode::PingAndPorts => self.scan_ports(ip).await,
            }
        };
        let mac = async {
            tokio::time::timeout(timeout, self.probe.mac_for(ip))
                .await
                .ok()
                .flatten()
        };
        let hostname = async {
            tokio::time::timeout(timeout, self.probe.hostname_for(ip, timeout))
                .await
                .ok()
                .flatten()
        };
        let (mac, hostname, open_ports) = tokio::join!(mac, hostname, ports);

        debug!(%ip, rtt_ms = rtt.as_millis() as u64, open = ?open_ports, "Host responded");
        Some(ProbedHost {
            record: DeviceRecord::new(
                ip.to_string(),
                mac.as_deref().unwrap_or_default(),
                hostname.unwrap_or_default(),
            ),
            rtt,
            open_ports,
        })
    }

    /// Each connect is bounded by `port_timeout` here as well, so a probe
    /// that never resolves counts as timed out instead of stalling the host.
    async fn scan_ports(&self, ip: Ipv4Addr) -> Vec<u16> {
        let timeout = self.settings.port_timeout;
        let checks = self.settings.ports.iter().map(|&port| async move {
            let _slot = self.port_slots.acquire().await.ok()?;
            let state = tokio::time::timeout(timeout, self.probe.port_open(ip, port, timeout))
                .await
                .unwrap_or(PortState::TimedOut);
            (state == PortState::Open).then_some(port)
        });

        let mut open: Vec<u16> = futures::future::join_all(checks)
            .await
            .into_iter()
            .flatten()
            .collect();
        open.sort_unstable();
        open.dedup();
        open
    }
}
