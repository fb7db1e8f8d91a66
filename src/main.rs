//! switchmap - discover switch ports and the devices behind them over SNMP

use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use switchmap::{
    config::load_config,
    render::{DotRenderer, JsonRenderer, TopologyRenderer},
    topology::{DiscoveryEngine, collect_hostnames, mark_switch_nodes},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Dot,
}

#[derive(Parser, Debug)]
#[command(name = "switchmap")]
#[command(about = "Map switch ports to the devices learned on them")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchmap.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Leave ports without devices out of the graph (dot only)
    #[arg(long)]
    skip_empty_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the topology
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!("switchmap v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let switches = config.switches()?;
    let arp_sources = config.arp_connections()?;
    let transport = config.transport.build().await?;

    let hostnames = collect_hostnames(transport.as_ref(), &arp_sources, config.discovery.reverse_dns).await;

    let engine = DiscoveryEngine::new(Arc::clone(&transport))
        .with_policy(config.discovery.policy())
        .with_skip_vlans(config.discovery.skip_vlans.iter().copied());
    let outcomes = engine
        .discover_all(switches, Arc::new(hostnames), config.discovery.concurrency)
        .await;

    let total = outcomes.len();
    let mut failed = 0;
    let mut switches = Vec::with_capacity(total);
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => info!(switch = %outcome.switch.name, ?report, "Switch discovered"),
            Err(e) => {
                error!(switch = %outcome.switch.name, error = %e, "Switch discovery failed");
                failed += 1;
            }
        }
        switches.push(outcome.switch);
    }

    let marked = mark_switch_nodes(&mut switches);
    info!(switches = total, failed, inter_switch_links = marked, "Discovery complete");

    let renderer: Box<dyn TopologyRenderer> = match args.format {
        Format::Json => Box::new(JsonRenderer),
        Format::Dot => Box::new(DotRenderer {
            skip_empty_ports: args.skip_empty_ports,
        }),
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    renderer.render(&switches, &mut out)?;
    out.flush()?;

    if failed == total {
        bail!("Discovery failed for every switch");
    }
    Ok(())
}
