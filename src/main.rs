//! SIMBA Guardian - sensor fusion and safety monitoring for a drilling machine
//!
//! Reads JSON-line sensor readings, fuses them at the configured cadence, runs
//! the hazard detectors on every snapshot, and writes each safety alert to
//! stdout as one JSON object per line. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Live feed from the synthetic machine
//! cargo run --bin simulation -- --scenario vibration | cargo run --bin simba-guardian
//!
//! # Explicit config, fatigue checks for one operator, JSON logs
//! simba-guardian --config guardian.toml --operator op-17 --json-logs < feed.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `SIMBA_CONFIG`: Path to the TOML config (when `--config` is not given)
//! - `RUST_LOG`: Logging level (default: info)

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use simba_guardian::config::{defaults, GuardianConfig};
use simba_guardian::pipeline::{ingest, IngestSummary, JsonLineSource, LoopStats, SafetyLoop};
use simba_guardian::safety::{EmergencyController, SafetyMonitor};
use simba_guardian::sensors::{FusionEngine, FusionStats};
use simba_guardian::types::{AlertLevel, SafetyAlert};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simba-guardian")]
#[command(about = "Sensor fusion and safety monitoring for SIMBA drilling machines")]
#[command(version)]
struct CliArgs {
    /// TOML configuration file (default: $SIMBA_CONFIG, then ./guardian.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON-line reading file (default: stdin)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Operator on shift; enables fatigue checks
    #[arg(long, env = "SIMBA_OPERATOR")]
    operator: Option<String>,

    /// Keep fusing this long after the input ends so the last readings are checked
    #[arg(long, default_value = "500", value_name = "MS")]
    linger_ms: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GuardianConfig> {
    match path {
        Some(p) => GuardianConfig::load_from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(GuardianConfig::load()),
    }
}

fn print_alert(alert: &SafetyAlert) -> Result<()> {
    let line = serde_json::to_string(alert)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

// ============================================================================
// Final Report
// ============================================================================

async fn log_final_report(
    engine: &FusionEngine,
    monitor: &Mutex<SafetyMonitor>,
    fusion: &FusionStats,
    ingested: &IngestSummary,
    checked: &LoopStats,
) {
    let monitor = monitor.lock().await;
    let status = monitor.status();
    let stats = monitor.statistics();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Readings accepted:    {}", ingested.accepted);
    info!("   Readings rejected:    {}", ingested.rejected);
    info!("   Malformed lines:      {}", ingested.malformed);
    info!("   Fusion cycles:        {}", fusion.cycles_run);
    info!("   Snapshots published:  {}", fusion.snapshots_published);
    info!("   Cycles skipped:       {}", fusion.cycles_skipped);
    info!("   Snapshots checked:    {}", checked.snapshots_checked);
    info!("   Snapshots dropped:    {}", checked.snapshots_dropped);
    info!("   Alerts raised:        {}", stats.total_alerts_generated);
    info!(
        "   Emergencies ({:.0}h):    {}",
        defaults::ALERT_HISTORY_DEFAULT_HOURS,
        monitor
            .alert_history(defaults::ALERT_HISTORY_DEFAULT_HOURS, Some(AlertLevel::Emergency))
            .len()
    );
    info!("   Active alerts:        {}", status.active_alerts);
    info!("   System health:        {:.0}", status.system_health);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut health: Vec<_> = engine.sensor_health().into_values().collect();
    health.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
    for report in health {
        info!(
            sensor_id = %report.sensor_id,
            status = %report.status,
            rate_hz = report.readings_per_second,
            "{}",
            report.message
        );
    }

    if status.emergency_stop_active {
        let emergency = monitor.emergency_status();
        warn!(
            reason = emergency.state.reason.as_deref().unwrap_or("unknown"),
            "Emergency stop still latched at shutdown, reset required"
        );
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    let config = load_config(args.config.as_ref())?;
    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!(
        machine = %config.machine.name,
        site = %config.machine.site,
        fusion_ms = config.sensors.fusion_interval_ms,
        "SIMBA Guardian starting"
    );

    // Fusion
    let engine = Arc::new(FusionEngine::new(
        config.sensors.clone(),
        config.preprocess.clone(),
    ));

    // Emergency stop: no actuator bridge here, the request is logged for the
    // machine controller to pick up from the alert stream.
    let emergency = Arc::new(EmergencyController::new());
    emergency.register_shutdown_callback(|reason| {
        error!(reason, "Stop request issued to machine control");
        Ok(())
    });

    // Safety
    let mut monitor = SafetyMonitor::new(config.safety.clone(), Arc::clone(&emergency));
    if let Some(operator) = &args.operator {
        monitor.start_operator_session(operator);
    }
    monitor.register_alert_callback(print_alert);
    let monitor = Arc::new(Mutex::new(monitor));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let (safety_loop, safety_observer) = SafetyLoop::attach(
        &engine,
        Arc::clone(&monitor),
        cancel_token.child_token(),
        defaults::SAFETY_CHANNEL_CAPACITY,
    );
    let safety_loop = match &args.operator {
        Some(operator) => safety_loop.with_operator(operator.clone()),
        None => safety_loop,
    };
    let safety_task = tokio::spawn(safety_loop.run());

    let fusion = engine
        .start()
        .context("fusion loop already running")?;

    // Ingest until EOF or Ctrl+C
    let ingested = match &args.input {
        Some(path) => {
            let mut source = JsonLineSource::open(path).await?;
            ingest(&mut source, &engine, &cancel_token).await
        }
        None => {
            let mut source = JsonLineSource::stdin();
            ingest(&mut source, &engine, &cancel_token).await
        }
    };

    if !cancel_token.is_cancelled() && args.linger_ms > 0 {
        tokio::select! {
            () = cancel_token.cancelled() => {}
            () = tokio::time::sleep(Duration::from_millis(args.linger_ms)) => {}
        }
    }

    // Stop fusion first, then close the snapshot channel so the safety loop
    // drains what is queued and exits.
    fusion.stop().await;
    engine.unregister_data_observer(safety_observer);
    let checked = match safety_task.await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Safety loop task failed");
            LoopStats::default()
        }
    };

    log_final_report(&engine, &monitor, &engine.stats(), &ingested, &checked).await;
    info!("SIMBA Guardian shutdown complete");
    Ok(())
}
