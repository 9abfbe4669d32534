//! The per-viewer streaming loop and the shared monitoring state.
//!
//! Each connected stream viewer drives its own `StreamOrchestrator`. The
//! orchestrator reads the latest captured frame, classifies it while
//! monitoring is active (publishing the stats snapshot and feeding the
//! alert manager) or stamps it "SISTEMA PAUSADO" while paused, then encodes
//! a JPEG for the multipart transport. Pausing bypasses detection entirely
//! to conserve compute and leaves the last published snapshot untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use crate::alert::{encode_jpeg, AlertManager};
use crate::classify::{Classifier, FrameStats};
use crate::frame::FrameSlot;
use crate::render;

const JPEG_QUALITY: u8 = 80;
/// Polling interval while no frame is available yet.
const NO_FRAME_WAIT: Duration = Duration::from_millis(100);

/// Process-wide monitoring state: the active/paused flag plus the latest
/// published stats snapshot. Cross-thread visibility is all that is
/// required; the snapshot is advisory telemetry, last writer wins.
#[derive(Default)]
pub struct MonitorState {
    active: AtomicBool,
    stats: Mutex<FrameStats>,
}

impl MonitorState {
    pub fn new(active: bool) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(active),
            stats: Mutex::new(FrameStats::default()),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn publish_stats(&self, stats: FrameStats) {
        let mut guard = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        *guard = stats;
    }

    pub fn stats_snapshot(&self) -> FrameStats {
        let guard = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }
}

pub struct StreamOrchestrator {
    slot: Arc<FrameSlot>,
    state: Arc<MonitorState>,
    classifier: Classifier,
    alerts: Arc<Mutex<AlertManager>>,
}

impl StreamOrchestrator {
    pub fn new(
        slot: Arc<FrameSlot>,
        state: Arc<MonitorState>,
        classifier: Classifier,
        alerts: Arc<Mutex<AlertManager>>,
    ) -> Self {
        Self {
            slot,
            state,
            classifier,
            alerts,
        }
    }

    /// Produce the next encoded frame for the stream.
    ///
    /// Blocks (politely) while no frame has ever been published; once the
    /// acquisition thread publishes, every call returns promptly with the
    /// newest available frame, processed or passed through according to the
    /// monitoring flag.
    pub fn next_jpeg(&mut self) -> Result<Vec<u8>> {
        let frame = loop {
            match self.slot.latest() {
                Some(frame) => break frame,
                None => std::thread::sleep(NO_FRAME_WAIT),
            }
        };

        let output = if self.state.is_active() {
            let (annotated, stats) = self.classifier.classify(&frame);
            if stats.violations > 0 {
                let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
                alerts.maybe_alert(&stats, &annotated);
            }
            self.state.publish_stats(stats);
            annotated
        } else {
            // Paused: raw pass-through with a marker, no detection cost,
            // snapshot left as-is.
            let mut copy = (*frame).clone();
            let y = copy.height() / 2;
            render::draw_text(&mut copy, 50, y, "SISTEMA PAUSADO", render::ORANGE, 2);
            copy
        };

        encode_jpeg(&output, JPEG_QUALITY)
    }

    /// One processing step without JPEG encoding; drives tests and the
    /// demo binary at full speed.
    pub fn process_once(&mut self) -> Option<FrameStats> {
        let frame = self.slot.latest()?;
        if !self.state.is_active() {
            return None;
        }
        let (annotated, stats) = self.classifier.classify(&frame);
        if stats.violations > 0 {
            let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
            alerts.maybe_alert(&stats, &annotated);
        }
        self.state.publish_stats(stats.clone());
        Some(stats)
    }
}
