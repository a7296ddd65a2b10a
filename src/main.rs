//! vds-gateway: tool-oriented data access gateway for seismic volume datasets.
//!
//! Usage:
//!   vds-gateway                  # Start the MCP server on stdin/stdout
//!   vds-gateway --data-root DIR  # Scan DIR for .vds files in addition to VDS_DATA_PATH

use clap::Parser;
use rmcp::ServiceExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vds_gateway::mount::MountHealthChecker;
use vds_gateway::server::GatewayServer;
use vds_gateway::Config;

#[derive(Parser)]
#[command(name = "vds-gateway")]
#[command(about = "MCP tool server exposing seismic volume datasets to AI assistants")]
#[command(version)]
struct Cli {
    /// Host-side mount root to scan for `.vds` files (repeatable). Falls
    /// back to the `VDS_DATA_PATH` environment variable (colon-separated)
    /// when omitted; demo surveys are served if neither is set.
    #[arg(long = "data-root")]
    data_roots: Vec<PathBuf>,

    /// Container-side path prefix the metadata index reports, substituted
    /// with the first `--data-root` before handing paths to Volume Access.
    #[arg(long)]
    container_root: Option<PathBuf>,

    /// Remote metadata index endpoint. Omit to run the local-scan / demo
    /// fallback tiers only.
    #[arg(long)]
    index_url: Option<String>,

    /// Metadata index request timeout, in seconds.
    #[arg(long, default_value = "10")]
    index_timeout_secs: u64,

    /// Disable the startup mount health check.
    #[arg(long)]
    no_mount_health: bool,

    /// Mount health check timeout, in seconds.
    #[arg(long, default_value = "10")]
    mount_timeout_secs: u64,

    /// Mount health check retry cap.
    #[arg(long, default_value = "3")]
    mount_max_retries: u32,

    /// Maximum number of raw data elements a single extraction may return.
    #[arg(long, default_value_t = vds_gateway::config::DEFAULT_MAX_ELEMENTS)]
    max_elements: usize,

    /// File to write tool-call profiling entries to. Unset disables
    /// profiling entirely (zero overhead).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CRITICAL: Log to stderr only (stdout is JSON-RPC for MCP)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vds_gateway=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    vds_gateway::profiling::init(cli.log_file.as_deref());

    let mut config = Config::default();
    if !cli.data_roots.is_empty() {
        config.data_roots = cli.data_roots;
    } else if let Ok(raw) = std::env::var("VDS_DATA_PATH") {
        config = config.with_data_path_env(&raw);
    }
    config.container_root = cli.container_root;
    config.index_url = cli.index_url.or_else(|| std::env::var("VDS_INDEX_URL").ok());
    config.index_timeout_secs = cli.index_timeout_secs;
    config.mount_health_enabled = !cli.no_mount_health;
    config.mount_timeout_secs = cli.mount_timeout_secs;
    config.mount_max_retries = cli.mount_max_retries;
    config.max_elements = cli.max_elements;
    config.log_file = cli.log_file;

    if config.has_data_roots() {
        tracing::info!(roots = ?config.data_roots, "scanning configured mount roots");
        if config.mount_health_enabled {
            check_mount_health(&config).await;
        }
    } else {
        tracing::info!("no data roots configured; serving demo catalog only");
    }

    let server = GatewayServer::new(&config);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

/// Runs the Mount Health (C4) startup probe and logs the classification for
/// each configured root. A non-healthy mount is not fatal: the gateway
/// still starts, and individual extraction calls against that root will
/// fail with `Unavailable` at request time (spec.md §4.4, §8 "Stale mount").
async fn check_mount_health(config: &Config) {
    let checker = MountHealthChecker::new(
        Duration::from_secs(config.mount_timeout_secs),
        config.mount_max_retries,
    );
    let results = checker.check_multiple_mounts(&config.data_roots).await;
    for result in results {
        if result.status == vds_gateway::mount::MountHealthStatus::Healthy {
            tracing::info!(path = %result.path.display(), entries = ?result.entry_count, "mount healthy");
        } else {
            tracing::warn!(
                path = %result.path.display(),
                status = result.status.as_str(),
                remediation = result.status.remediation_advice(),
                detail = ?result.detail,
                "mount not healthy"
            );
        }
    }
}
