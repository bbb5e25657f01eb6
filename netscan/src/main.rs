use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netscan::config::{AppConfig, VendorConfig};
use netscan::detect::FormatKind;
use netscan::ingest;
use netscan::oui::OuiDatabase;
use netscan::registry::DeviceRegistry;
use netscan::scanner::{ProbeMode, ProbeTarget, Prober};
use netscan::vendor::{
    self, CacheStore, MacVendorsClient, MemoryCacheStore, ResolverSettings, SqliteCacheStore,
    VendorResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Network discovery artifact parser, MAC vendor resolver and subnet prober.
#[derive(Parser, Debug)]
#[command(name = "netscan", version, about)]
struct Cli {
    /// Path to a TOML configuration file (optional).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected format of a file.
    Detect { file: PathBuf },

    /// Parse discovery artifacts into one device list.
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Skip detection: xml, arp, csv, json, canonical or text.
        #[arg(short, long)]
        format: Option<FormatKind>,

        #[arg(short, long, value_enum, default_value_t = Output::Pipe)]
        output: Output,

        /// Resolve missing vendors through the remote service and cache.
        #[arg(long, conflicts_with = "offline")]
        resolve: bool,

        /// Resolve missing vendors from the offline OUI database only.
        #[arg(long)]
        offline: bool,
    },

    /// Look up the vendor of one or more MAC addresses.
    Resolve {
        #[arg(required = true)]
        macs: Vec<String>,

        #[arg(long)]
        offline: bool,
    },

    /// List offline OUI prefixes whose vendor name contains `query`.
    Oui { query: String },

    /// Sweep a CIDR block, range or single address.
    Probe {
        target: ProbeTarget,

        /// Also check the configured TCP ports on responding hosts.
        #[arg(long)]
        ports: bool,

        /// Resolve vendors of discovered MACs.
        #[arg(long)]
        resolve: bool,

        #[arg(short, long, value_enum, default_value_t = Output::Pipe)]
        output: Output,
    },

    /// Sweep repeatedly and report hosts appearing and disappearing.
    Watch {
        target: ProbeTarget,

        /// Seconds between sweeps.
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
    },

    /// Vendor cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum CacheAction {
    /// Show total, fresh and expired entry counts.
    Stats,
    /// Delete expired entries.
    Cleanup,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Pipe,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the data.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netscan=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting netscan");

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    // Ctrl-C cancels in-flight sweeps and lookups; partial results are kept.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Detect { file } => {
            let raw = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            println!("{}", netscan::detect::detect(&raw));
        }

        Command::Parse {
            files,
            format,
            output,
            resolve,
            offline,
        } => {
            let mut registry = DeviceRegistry::new();
            for file in &files {
                let summary = ingest::ingest_file(&mut registry, file, format)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?;
                info!(
                    source = %summary.source,
                    format = %summary.format,
                    records = summary.parsed,
                    dropped = summary.stats.dropped,
                    rejected = summary.merge.rejected,
                    "Parsed input"
                );
            }
            if offline {
                let filled = registry.enrich_offline(&OuiDatabase::from_config(&config.oui)?);
                info!(filled, "Offline vendor enrichment complete");
            } else if resolve {
                let resolver = build_resolver(&config.vendor).await?;
                registry.enrich_until(&resolver, &cancel).await;
            }
            print_registry(&registry, output)?;
        }

        Command::Resolve { macs, offline } => {
            if offline {
                let oui = OuiDatabase::from_config(&config.oui)?;
                for mac in &macs {
                    let vendor = oui.lookup(mac).unwrap_or(netscan::model::VENDOR_UNKNOWN);
                    println!("{mac}|{vendor}|offline");
                }
            } else {
                let resolver = build_resolver(&config.vendor).await?;
                let results = resolver.resolve_batch_until(&macs, &cancel).await;
                for mac in &macs {
                    if let Some(result) = results.get(mac) {
                        println!("{mac}|{}|{}", result.vendor, result.source);
                    }
                }
            }
        }

        Command::Oui { query } => {
            let oui = OuiDatabase::from_config(&config.oui)?;
            for (prefix, vendor) in oui.search(&query) {
                println!("{prefix}|{vendor}");
            }
        }

        Command::Probe {
            target,
            ports,
            resolve,
            output,
        } => {
            let prober = Prober::system(&config.prober);
            let mode = if ports {
                ProbeMode::PingAndPorts
            } else {
                ProbeMode::Ping
            };
            let hosts = prober.sweep(&target, mode, cancel.clone()).await?;
            if ports {
                for host in &hosts {
                    info!(ip = %host.record.ip, open = ?host.open_ports, "Open ports");
                }
            }

            let mut registry = DeviceRegistry::new();
            registry.merge_probe(hosts);
            if resolve {
                let resolver = build_resolver(&config.vendor).await?;
                registry.enrich_until(&resolver, &cancel).await;
            }
            print_registry(&registry, output)?;
        }

        Command::Watch { target, interval } => {
            watch(&config, target, Duration::from_secs(interval.max(1)), cancel).await?;
        }

        Command::Cache { action } => {
            let store = SqliteCacheStore::open(&config.vendor.cache_url())
                .await
                .with_context(|| format!("opening vendor cache {}", config.vendor.cache_path))?;
            let ttl = config.vendor.ttl();
            match action {
                CacheAction::Stats => {
                    let stats = vendor::retention::stats(&store, ttl).await?;
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                CacheAction::Cleanup => {
                    let deleted = vendor::retention::cleanup_expired(&store, ttl).await?;
                    println!("{deleted}");
                }
            }
        }
    }

    Ok(())
}

/// Repeated sweeps with background cache cleanup, until interrupted.
async fn watch(
    config: &AppConfig,
    target: ProbeTarget,
    every: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let store = open_store(&config.vendor).await;
    let resolver = resolver_with_store(&config.vendor, store.clone())?;
    let cleanup = vendor::retention::start_cleanup_task(
        store,
        config.vendor.ttl(),
        Duration::from_secs(config.vendor.cleanup_interval_secs.max(1)),
        cancel.clone(),
    );

    let prober = Prober::system(&config.prober);
    let mut previous = DeviceRegistry::new();
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let hosts = prober.sweep(&target, ProbeMode::Ping, cancel.clone()).await?;
        if cancel.is_cancelled() {
            break;
        }
        let mut current = DeviceRegistry::new();
        current.merge_probe(hosts);
        current.enrich_until(&resolver, &cancel).await;

        let diff = current.diff(&previous);
        for record in &diff.appeared {
            println!("+{}", record.to_pipe());
        }
        for record in &diff.vanished {
            println!("-{}", record.to_pipe());
        }
        info!(
            hosts = current.len(),
            appeared = diff.appeared.len(),
            vanished = diff.vanished.len(),
            "Sweep complete"
        );
        previous = current;
    }

    cleanup.await.context("cache cleanup task")?;
    Ok(())
}

fn print_registry(registry: &DeviceRegistry, output: Output) -> Result<()> {
    match output {
        Output::Pipe => print!("{}", registry.to_pipe()),
        Output::Json => println!("{}", registry.to_json()?),
    }
    Ok(())
}

/// Durable cache, or an in-memory one when the file cannot be opened
/// (lookups still work, nothing persists).
async fn open_store(config: &VendorConfig) -> Arc<dyn CacheStore> {
    match SqliteCacheStore::open(&config.cache_url()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(path = %config.cache_path, "{e}; continuing without a durable cache");
            Arc::new(MemoryCacheStore::new())
        }
    }
}

async fn build_resolver(config: &VendorConfig) -> Result<VendorResolver> {
    let store = open_store(config).await;
    resolver_with_store(config, store)
}

fn resolver_with_store(config: &VendorConfig, store: Arc<dyn CacheStore>) -> Result<VendorResolver> {
    let api = MacVendorsClient::new(
        &config.api_url,
        Duration::from_secs(config.attempt_timeout_secs),
    )?;
    Ok(VendorResolver::new(
        store,
        Arc::new(api),
        ResolverSettings::from(config),
    ))
}
