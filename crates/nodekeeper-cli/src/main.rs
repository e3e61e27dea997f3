//! NodeKeeper - headless monerod supervisor.
//!
//! Starts the daemon with the arguments derived from a settings file, logs
//! its output and polls its status until interrupted.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nodekeeper_core::config::{AppConfig, ProcessConfig};
use nodekeeper_core::{device_ip, NodeKeeper, NodeSettings, NodeStats, ProcessState};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "nodekeeper")]
#[command(about = "Run and monitor a Monero daemon")]
struct Args {
    /// Settings file (JSON). Defaults to <config dir>/nodekeeper/settings.json
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Directory searched first for the monerod binary
    #[arg(long)]
    bin_dir: Option<PathBuf>,

    /// Android native library directory holding libmonerod_<arch>.so
    #[arg(long)]
    native_lib_dir: Option<PathBuf>,

    /// Writable directory the binary is staged into on Android
    #[arg(long)]
    private_dir: Option<PathBuf>,

    /// Seconds between status polls
    #[arg(long, default_value = "10")]
    poll_interval: u64,

    /// Free space (GiB) required in the data directory before starting
    #[arg(long, default_value = "0")]
    min_free_gib: f64,

    /// Check for a newer release at startup
    #[arg(long)]
    check_updates: bool,

    /// Restart the daemon whenever it exits or fails to start
    #[arg(long)]
    keep_alive: bool,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon and poll it until Ctrl-C (default)
    Run,
    /// Print the daemon command line derived from the settings
    Args,
    /// Print architecture and binary resolution as JSON
    Info,
    /// Compare the local binary with the latest published release
    CheckUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.debug))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let settings_path = args.settings.clone().or_else(default_settings_path);
    let settings = load_settings(settings_path.as_deref())?;

    let mut builder = NodeKeeper::builder().settings(settings);
    if let Some(dir) = &args.bin_dir {
        builder = builder.bin_dir(dir);
    }
    if let Some(dir) = &args.native_lib_dir {
        builder = builder.native_lib_dir(dir);
    }
    if let Some(dir) = &args.private_dir {
        builder = builder.private_dir(dir);
    }
    let keeper = builder.build().context("Failed to initialize")?;

    match args.command.as_ref().unwrap_or(&Command::Run) {
        Command::Run => run(Arc::new(keeper), &args).await,
        Command::Args => {
            println!("{}", keeper.daemon_args().join(" "));
            Ok(())
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&keeper.status())?);
            Ok(())
        }
        Command::CheckUpdate => {
            let status = keeper.check_for_updates(true).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if status.is_error() {
                bail!(status.error);
            }
            Ok(())
        }
    }
}

/// `--debug` wins; otherwise RUST_LOG, falling back to `info`.
fn log_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| {
        dir.join(AppConfig::APP_NAME)
            .join(AppConfig::SETTINGS_FILE_NAME)
    })
}

/// Read settings from `path`, falling back to defaults when it does not exist.
fn load_settings(path: Option<&Path>) -> Result<NodeSettings> {
    match path {
        Some(path) if path.exists() => {
            info!("Loading settings from {}", path.display());
            NodeSettings::from_json_file(path)
                .with_context(|| format!("Invalid settings file {}", path.display()))
        }
        Some(path) => {
            warn!("{} not found, using defaults", path.display());
            Ok(NodeSettings::default())
        }
        None => Ok(NodeSettings::default()),
    }
}

/// Decides when a daemon that went down is started again.
#[derive(Debug)]
struct RestartPolicy {
    keep_alive: bool,
    backoff: Duration,
    next_attempt: Option<Instant>,
}

impl RestartPolicy {
    fn new(keep_alive: bool, backoff: Duration) -> Self {
        Self {
            keep_alive,
            backoff,
            next_attempt: None,
        }
    }

    /// Called while the daemon is down. Returns true when a restart is due;
    /// the first call only schedules one.
    fn restart_due(&mut self, now: Instant) -> bool {
        if !self.keep_alive {
            return false;
        }
        match self.next_attempt {
            Some(at) if now >= at => {
                self.next_attempt = None;
                true
            }
            Some(_) => false,
            None => {
                self.next_attempt = Some(now + self.backoff);
                false
            }
        }
    }

    fn is_scheduled(&self) -> bool {
        self.next_attempt.is_some()
    }
}

async fn run(keeper: Arc<NodeKeeper>, args: &Args) -> Result<()> {
    let arch = keeper.architecture();
    info!(
        "{} on {} ({})",
        AppConfig::APP_NAME,
        arch.raw,
        arch.platform.as_str()
    );
    if !arch.supported {
        bail!("Unsupported architecture: {}", arch.raw);
    }
    if !arch.ready {
        bail!("monerod binary not found; pass --bin-dir or --native-lib-dir");
    }

    if args.min_free_gib > 0.0 {
        if let Some(check) = keeper.storage_check(args.min_free_gib) {
            if !check.ok {
                bail!(check
                    .reason
                    .unwrap_or_else(|| "Insufficient storage".to_string()));
            }
            info!("{:.1} GiB free in data directory", check.free_gib);
        }
    }

    if let Some(stats) = keeper.detect_existing_node().await {
        warn!(
            "monerod is already serving {}, monitoring it instead of starting another",
            keeper.poller().base_url()
        );
        log_stats(&stats);
        if !watch_external(&keeper, args).await? {
            return Ok(());
        }
        info!("External daemon went away, starting our own");
    }

    let mut restarts = RestartPolicy::new(args.keep_alive, ProcessConfig::RESTART_BACKOFF);
    if keeper.start() {
        log_rpc_address(keeper.settings());
    } else {
        let reason = keeper
            .supervisor()
            .last_error()
            .unwrap_or_else(|| "unknown error".to_string());
        if !args.keep_alive {
            bail!("Failed to start monerod: {}", reason);
        }
        warn!(
            "Failed to start monerod: {}; retrying in {}s",
            reason,
            ProcessConfig::RESTART_BACKOFF.as_secs()
        );
        restarts.restart_due(Instant::now());
    }

    if args.check_updates {
        let keeper = keeper.clone();
        tokio::spawn(async move {
            let status = keeper.check_for_updates(false).await;
            if status.update_available {
                warn!(
                    "monerod {} is available (running {})",
                    status.remote_version, status.local_version
                );
            }
        });
    }

    let mut interval = tokio::time::interval(Duration::from_secs(args.poll_interval.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let outcome = loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = keeper.supervisor().state();
                match state {
                    ProcessState::Running => log_stats(&keeper.poll().await),
                    ProcessState::Error | ProcessState::Stopped if args.keep_alive => {
                        let scheduled = restarts.is_scheduled();
                        if restarts.restart_due(Instant::now()) {
                            if keeper.start() {
                                info!("monerod restarted");
                            } else {
                                let reason = keeper.supervisor().last_error().unwrap_or_default();
                                warn!("Restart failed: {}", reason);
                                restarts.restart_due(Instant::now());
                            }
                        } else if !scheduled {
                            let detail = keeper
                                .supervisor()
                                .last_error()
                                .map(|e| format!(": {}", e))
                                .unwrap_or_default();
                            warn!(
                                "monerod {}{}; restarting in {}s",
                                state.as_str(),
                                detail,
                                ProcessConfig::RESTART_BACKOFF.as_secs()
                            );
                        }
                    }
                    ProcessState::Error => {
                        let reason = keeper.supervisor().last_error().unwrap_or_default();
                        break Err(anyhow::anyhow!("monerod failed: {}", reason));
                    }
                    ProcessState::Stopped => {
                        info!("monerod exited");
                        break Ok(());
                    }
                    _ => {}
                }
            }
            signal = &mut shutdown => {
                signal?;
                info!("Shutdown signal received, stopping monerod");
                break Ok(());
            }
        }
    };

    // stop() blocks while the daemon shuts down
    let stopper = keeper.clone();
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    outcome
}

/// Poll a daemon this process did not start until it goes away or Ctrl-C.
///
/// Returns true when it stopped answering and `--keep-alive` asks us to take
/// over.
async fn watch_external(keeper: &NodeKeeper, args: &Args) -> Result<bool> {
    let mut interval = tokio::time::interval(Duration::from_secs(args.poll_interval.max(1)));
    interval.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = keeper.poller().poll().await;
                if stats.is_offline() {
                    info!("External daemon stopped responding");
                    return Ok(args.keep_alive);
                }
                log_stats(&stats);
            }
            signal = &mut shutdown => {
                signal?;
                info!("Shutdown signal received, leaving external daemon running");
                return Ok(false);
            }
        }
    }
}

fn log_rpc_address(settings: &NodeSettings) {
    let rpc = &settings.rpc;
    let unspecified = rpc
        .bind_ip
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_unspecified());
    if unspecified {
        match device_ip() {
            Some(ip) => info!("RPC reachable on the LAN at {}:{}", ip, rpc.bind_port),
            None => info!("RPC bound to all interfaces on port {}", rpc.bind_port),
        }
    } else {
        info!("RPC at {}:{}", rpc.bind_ip, rpc.bind_port);
    }
}

fn log_stats(stats: &NodeStats) {
    if stats.is_offline() {
        info!("Daemon RPC not responding yet");
        return;
    }
    if stats.synchronized {
        info!(
            "Height {} | {} peers | diff {} | {} | fee {}",
            stats.height,
            stats.total_connections(),
            stats.difficulty_display(),
            stats.hashrate_display(),
            stats.fee_display()
        );
    } else {
        info!(
            "Syncing {}/{} ({:.1}%) | {} peers | {} blocks left",
            stats.height,
            stats.target_height,
            stats.sync_progress(),
            stats.total_connections(),
            stats.blocks_remaining()
        );
    }
}
