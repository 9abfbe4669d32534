//! demo - end-to-end synthetic run of the SafeGuard Vision pipeline
//!
//! Drives the synthetic camera through acquisition, detection,
//! classification and alerting with an in-memory incident store, then
//! prints what the pipeline saw. Useful for a quick smoke check without a
//! camera, a model, or a database.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;

use safeguard_vision::{
    detect, AcquisitionThread, AlertManager, Classifier, DetectorSettings, IncidentStore,
    InMemoryIncidentStore, MonitorState, PpeConfig, SharedIncidentStore, StreamOrchestrator,
    SyntheticSource, DEFAULT_ZONE_FRACTION,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// How long to run the synthetic pipeline.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Processing iterations per second.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Directory for evidence captures.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Incident cooldown in seconds.
    #[arg(long, default_value_t = 2)]
    cooldown: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    stage("start synthetic capture");
    let source = SyntheticSource::new(640, 480);
    let mut acquisition = AcquisitionThread::spawn(Box::new(source));

    stage("build pipeline");
    let store: SharedIncidentStore = Arc::new(Mutex::new(InMemoryIncidentStore::new()));
    let alerts = Arc::new(Mutex::new(AlertManager::new(
        store.clone(),
        &PathBuf::from(&args.out),
        Duration::from_secs(args.cooldown),
    )?));
    let backend = detect::build_backend(&DetectorSettings::default())?;
    let classifier = Classifier::new(backend, DEFAULT_ZONE_FRACTION, PpeConfig::default());
    let state = MonitorState::new(true);
    let mut orchestrator =
        StreamOrchestrator::new(acquisition.slot(), state.clone(), classifier, alerts);

    stage("run");
    let interval = Duration::from_secs(1) / args.fps;
    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut iterations = 0u64;
    let mut frames_with_persons = 0u64;
    let mut frames_with_violations = 0u64;
    while Instant::now() < deadline {
        if let Some(stats) = orchestrator.process_once() {
            iterations += 1;
            if stats.total_persons > 0 {
                frames_with_persons += 1;
            }
            if stats.violations > 0 {
                frames_with_violations += 1;
            }
        }
        std::thread::sleep(interval);
    }
    acquisition.stop();

    stage("summary");
    println!("iterations:             {}", iterations);
    println!("frames with persons:    {}", frames_with_persons);
    println!("frames with violations: {}", frames_with_violations);

    let incidents = store
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .recent(10)?;
    println!("incidents recorded:     {}", incidents.len());
    for incident in &incidents {
        println!(
            "  [{}] {} ({})",
            incident.timestamp, incident.kind, incident.image_path
        );
    }
    Ok(())
}

fn stage(name: &str) {
    println!("\n== {} ==", name);
}
