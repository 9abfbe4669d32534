//! Rate-limited incident alerting.
//!
//! One `AlertManager` exists per process; its cooldown is the system-wide
//! guarantee that at most one incident is persisted per window, no matter
//! how many violations occur within it or how many stream loops observe
//! them. Evidence writes and store appends are best-effort: failures are
//! logged and the cooldown advances anyway, preserving the
//! one-attempt-per-window policy.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::classify::FrameStats;
use crate::frame::Frame;
use crate::store::{Incident, IncidentStore};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

pub type SharedIncidentStore = Arc<Mutex<dyn IncidentStore>>;

pub struct AlertManager {
    store: SharedIncidentStore,
    capture_dir: PathBuf,
    cooldown: Duration,
    last_alert: Option<Instant>,
}

impl AlertManager {
    /// Create the manager and its evidence directory (idempotent).
    pub fn new(store: SharedIncidentStore, capture_dir: &Path, cooldown: Duration) -> Result<Self> {
        std::fs::create_dir_all(capture_dir)
            .with_context(|| format!("create capture dir {}", capture_dir.display()))?;
        Ok(Self {
            store,
            capture_dir: capture_dir.to_path_buf(),
            cooldown,
            last_alert: None,
        })
    }

    /// Persist one incident for this frame's violations, if any and if the
    /// cooldown window has elapsed. Returns whether an alert was attempted.
    pub fn maybe_alert(&mut self, stats: &FrameStats, annotated: &Frame) -> bool {
        self.maybe_alert_at(Instant::now(), stats, annotated)
    }

    // Clock injected for deterministic cooldown tests.
    pub(crate) fn maybe_alert_at(
        &mut self,
        now: Instant,
        stats: &FrameStats,
        annotated: &Frame,
    ) -> bool {
        if stats.violations == 0 {
            return false;
        }
        if let Some(last) = self.last_alert {
            // Strict: exactly-at-cooldown is still inside the window.
            if now.duration_since(last) <= self.cooldown {
                return false;
            }
        }

        // First reason in encounter order, not the most severe. Changing
        // this tie-break silently alters which incidents get persisted.
        let kind = stats
            .violation_reasons
            .first()
            .cloned()
            .unwrap_or_else(|| "Violación de Seguridad".to_string());

        if let Err(err) = self.persist(&kind, annotated) {
            log::warn!("incident persistence failed (cooldown still advances): {:#}", err);
        }
        self.last_alert = Some(now);
        true
    }

    fn persist(&mut self, kind: &str, annotated: &Frame) -> Result<()> {
        let now = Local::now();
        let filename = format!("capture_{}.jpg", now.format("%Y%m%d_%H%M%S"));
        let filepath = self.capture_dir.join(&filename);
        write_jpeg(&filepath, annotated)
            .with_context(|| format!("write evidence image {}", filepath.display()))?;
        log::info!("alert evidence saved: {}", filepath.display());

        let incident = Incident {
            timestamp: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            kind: kind.to_string(),
            image_path: format!("captures/{}", filename),
            details: format!("Violación detectada: {}", kind),
        };
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.append(&incident).context("append incident record")?;
        Ok(())
    }
}

/// Encode a frame as JPEG at the given path.
pub fn write_jpeg(path: &Path, frame: &Frame) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), 85);
    encoder.encode(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

/// In-memory JPEG encoding for the stream transport.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode(
        frame.pixels(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}
