use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::debug;

/// Reverse DNS (PTR) lookups for responding hosts.
#[derive(Clone)]
pub struct ReverseResolver {
    resolver: TokioAsyncResolver,
}

impl ReverseResolver {
    /// Use the system resolver configuration, falling back to the
    /// library defaults when it cannot be read.
    pub fn from_system() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!("system resolver config unavailable ({e}), using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }

    /// First PTR name for `ip`, without the trailing dot. `None` on
    /// NXDOMAIN, error, or when `timeout` elapses.
    pub async fn lookup(&self, ip: Ipv4Addr, timeout: Duration) -> Option<String> {
        let lookup = tokio::time::timeout(timeout, self.resolver.reverse_lookup(IpAddr::V4(ip)))
            .await
            .ok()?
            .map_err(|e| debug!(%ip, "reverse lookup failed: {e}"))
            .ok()?;

        lookup
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .filter(|name| !name.is_empty())
    }
}
