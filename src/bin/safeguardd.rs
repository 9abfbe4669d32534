//! safeguardd - SafeGuard Vision monitoring daemon
//!
//! Wires the whole pipeline together:
//! 1. Loads layered configuration (defaults, JSON file, SAFEGUARD_* env)
//! 2. Opens the SQLite incident store
//! 3. Opens the first usable camera candidate (synthetic fallback included)
//! 4. Starts the acquisition thread
//! 5. Serves the HTTP/MJPEG surface until Ctrl-C

use std::sync::{mpsc, Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;

use safeguard_vision::{
    api::{ApiConfig, ApiContext, ApiServer},
    source, AcquisitionThread, AlertManager, MonitorConfig, MonitorState, SharedIncidentStore,
    SourceSpec, SqliteIncidentStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Start with monitoring paused (toggle later via POST /api/monitor).
    #[arg(long)]
    paused: bool,
    /// Override the listen address from configuration.
    #[arg(long, env = "SAFEGUARD_API_ADDR")]
    addr: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = MonitorConfig::load().context("load configuration")?;
    if let Some(addr) = args.addr {
        cfg.api_addr = addr;
    }

    let store: SharedIncidentStore = Arc::new(Mutex::new(
        SqliteIncidentStore::open(&cfg.db_path)
            .with_context(|| format!("open incident store {}", cfg.db_path))?,
    ));
    log::info!("incident store: {}", cfg.db_path);

    let alerts = Arc::new(Mutex::new(AlertManager::new(
        store.clone(),
        &cfg.capture_dir,
        cfg.cooldown,
    )?));

    let specs: Vec<SourceSpec> = cfg
        .camera
        .candidates
        .iter()
        .map(|raw| SourceSpec::parse(raw))
        .collect();
    let camera = source::open_first_available(&specs, &cfg.camera);
    log::info!("capturing from {}", camera.describe());

    let mut acquisition = AcquisitionThread::spawn(camera);
    let state = MonitorState::new(!args.paused);

    let api_handle = ApiServer::new(
        ApiConfig {
            addr: cfg.api_addr.clone(),
            ..ApiConfig::default()
        },
        ApiContext {
            slot: acquisition.slot(),
            state: state.clone(),
            alerts,
            store,
            detector: cfg.detector.clone(),
            zone_fraction: cfg.zone_fraction,
            ppe: cfg.ppe.clone(),
        },
    )
    .spawn()?;
    log::info!("api listening on {}", api_handle.addr);
    log::info!(
        "monitoring {} (danger zone at {:.0}% of frame width, cooldown {}s)",
        if state.is_active() { "active" } else { "paused" },
        cfg.zone_fraction * 100.0,
        cfg.cooldown.as_secs()
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("install signal handler")?;

    shutdown_rx.recv().ok();
    log::info!("shutting down");

    acquisition.stop();
    api_handle.stop()?;
    Ok(())
}
