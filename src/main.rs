//! procpulse - headless telemetry driver.
//!
//! Starts every collector, then logs one summary line per metric family and
//! the busiest processes on each refresh until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use procpulse::cli::{Args, LogLevel};
use procpulse::config::{render_config, resolve_config};
use procpulse::process::{SortKey, SortSpec};
use procpulse::telemetry::Telemetry;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) -> Result<()> {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {:?}", args.log_level);
    Ok(())
}

/// Resolves once Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Logs one line per metric family and the top processes by CPU.
fn log_summary(telemetry: &Telemetry, args: &Args, round: u64) {
    let cpu = telemetry.get_cpu_summary();
    let cores = telemetry.get_per_core_cpu();
    let busiest_core = cores
        .iter()
        .max_by(|a, b| a.percent.total_cmp(&b.percent));
    info!(
        "[{}] cpu: {:.1}% ({} cores, busiest {})",
        round,
        cpu.percent,
        cores.len(),
        busiest_core.map_or_else(
            || "n/a".to_string(),
            |c| format!("cpu{} {:.1}%", c.index, c.percent)
        )
    );

    let mem = telemetry.get_memory_summary();
    info!(
        "[{}] memory: {:.2}/{:.2} GB used ({:.1}%), swap {:.2}/{:.2} GB",
        round, mem.used_gb, mem.total_gb, mem.used_percent, mem.swap_used_gb, mem.swap_total_gb
    );

    let disk = telemetry.get_disk_summary();
    info!(
        "[{}] disk {}: {:.1}/{:.1} GB used, read {:.1} KB/s, write {:.1} KB/s",
        round,
        disk.mount_path.display(),
        disk.used_gb,
        disk.total_gb,
        disk.read_kbs,
        disk.write_kbs
    );

    let net = telemetry.get_network_summary();
    let primary = net.primary_interface.as_deref().unwrap_or("none");
    let link = net.details.get(primary);
    info!(
        "[{}] network ({} {}, {}): rx {:.1} KB/s, tx {:.1} KB/s, {:.1} err/s",
        round,
        primary,
        link.map_or("unknown", |i| i.operstate.as_str()),
        link.and_then(|i| i.ipv4)
            .map_or_else(|| "no IPv4".to_string(), |ip| ip.to_string()),
        net.rx_kbs,
        net.tx_kbs,
        net.errors_per_sec
    );

    let sys = telemetry.get_system_summary();
    info!(
        "[{}] system {} ({}): load {:.2} {:.2} {:.2}, {} processes, up {}",
        round,
        sys.identity.hostname,
        sys.identity.kernel,
        sys.load.one_min,
        sys.load.five_min,
        sys.load.fifteen_min,
        sys.process_count,
        sys.uptime
    );

    let query = args.filter.as_deref().unwrap_or("");
    let processes = telemetry.get_process_snapshot(SortSpec::descending(SortKey::Cpu), query);
    for p in processes.iter().take(args.top) {
        info!(
            "[{}]   {:>7} {:<10} {:>6.1}% {:>10} KB {:>4} thr  {}",
            round, p.pid, p.user, p.cpu_percent, p.memory_kb, p.threads, p.name
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };

    if args.show_config {
        println!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }
    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }

    setup_logging(&args)?;
    info!(
        "procpulse {} sampling {}",
        env!("CARGO_PKG_VERSION"),
        config.proc_root.display()
    );

    let mut telemetry = Telemetry::new(&config)?;
    telemetry.start();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut round = 0u64;
    loop {
        let interval = std::time::Duration::from_secs_f64(telemetry.refresh_interval());
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }

        round += 1;
        log_summary(&telemetry, &args, round);
        if args.iterations > 0 && round >= args.iterations {
            info!("Completed {} rounds", round);
            break;
        }
    }

    for (name, stats) in telemetry.collector_stats() {
        info!(
            "{} collector: {} ticks, {} failed, {} regressions, mean {:.2} ms, slowest {:?}",
            name,
            stats.ticks,
            stats.failures,
            stats.regressions,
            stats.timing.mean_ms(),
            stats.timing.slowest()
        );
    }

    telemetry.shutdown().await;
    info!("procpulse stopped gracefully");
    Ok(())
}
