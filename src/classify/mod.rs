//! Per-frame safety classification and annotation.
//!
//! One `classify` call runs the detection backend, applies the zone and
//! PPE rules to every detected person, renders the annotated frame and
//! returns the aggregate stats. The classifier carries no state between
//! frames except the wall-clock timer behind the FPS estimate.

pub mod ppe;

use std::time::Instant;

use chrono::Local;
use serde::Serialize;

use crate::detect::{BoundingBox, Detection, DetectorBackend};
use crate::frame::Frame;
use crate::render;

pub use ppe::{HsvRange, PpeConfig};

/// Default vertical partition: the right 30% of the frame is the danger zone.
pub const DEFAULT_ZONE_FRACTION: f32 = 0.7;

/// Safety verdict for one person.
///
/// Safe requires full PPE outside the danger zone; full PPE inside the zone
/// is a Warning; missing any equipment is Danger regardless of position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplianceState {
    Safe,
    Warning,
    Danger,
}

impl ComplianceState {
    pub fn from_flags(has_helmet: bool, has_vest: bool, in_danger_zone: bool) -> Self {
        if !(has_helmet && has_vest) {
            ComplianceState::Danger
        } else if in_danger_zone {
            ComplianceState::Warning
        } else {
            ComplianceState::Safe
        }
    }

    fn color(self) -> render::Color {
        match self {
            ComplianceState::Safe => render::GREEN,
            ComplianceState::Warning => render::YELLOW,
            ComplianceState::Danger => render::RED,
        }
    }
}

/// Per-person assessment, recomputed every frame and never stored.
#[derive(Clone, Debug)]
pub struct PersonAssessment {
    pub bbox: BoundingBox,
    pub has_helmet: bool,
    pub has_vest: bool,
    pub in_danger_zone: bool,
    pub state: ComplianceState,
}

/// Aggregate result of one processed frame. The most recent value is
/// published as the globally observable stats snapshot.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameStats {
    pub total_persons: u32,
    pub violations: u32,
    pub alerts: Vec<String>,
    /// Raw violation reason strings in encounter order; the alert manager
    /// persists the first one as the incident type.
    #[serde(skip)]
    pub violation_reasons: Vec<String>,
}

/// Danger-zone membership: strict comparison, the boundary column itself
/// is outside the zone.
pub fn in_danger_zone(bbox: &BoundingBox, danger_zone_x: u32) -> bool {
    bbox.x_mid() > danger_zone_x
}

/// Assess one person bounding box against the zone and PPE rules.
pub fn assess_person(
    frame: &Frame,
    bbox: &BoundingBox,
    danger_zone_x: u32,
    ppe: &PpeConfig,
) -> PersonAssessment {
    let (has_helmet, has_vest) = ppe::assess_ppe(frame, bbox, ppe);
    let in_zone = in_danger_zone(bbox, danger_zone_x);
    PersonAssessment {
        bbox: *bbox,
        has_helmet,
        has_vest,
        in_danger_zone: in_zone,
        state: ComplianceState::from_flags(has_helmet, has_vest, in_zone),
    }
}

fn violation_reason(assessment: &PersonAssessment) -> String {
    let mut parts = Vec::new();
    if !assessment.has_helmet {
        parts.push("SIN CASCO");
    }
    if !assessment.has_vest {
        parts.push("SIN CHALECO");
    }
    if assessment.in_danger_zone {
        parts.push("ZONA PELIGROSA");
    }
    parts.join(", ")
}

pub struct Classifier {
    backend: Box<dyn DetectorBackend>,
    zone_fraction: f32,
    ppe: PpeConfig,
    last_frame_time: Option<Instant>,
}

impl Classifier {
    pub fn new(backend: Box<dyn DetectorBackend>, zone_fraction: f32, ppe: PpeConfig) -> Self {
        Self {
            backend,
            zone_fraction,
            ppe,
            last_frame_time: None,
        }
    }

    /// Classify and annotate one frame.
    ///
    /// Never fails: an empty frame returns an untouched copy with empty
    /// stats, and a detection-backend error degrades to "no detections".
    pub fn classify(&mut self, frame: &Frame) -> (Frame, FrameStats) {
        if frame.is_empty() {
            return (frame.clone(), FrameStats::default());
        }

        let detections = match self.backend.infer(frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("detector {} failed on frame: {:#}", self.backend.name(), err);
                Vec::new()
            }
        };

        let danger_zone_x = (frame.width() as f32 * self.zone_fraction) as u32;
        let mut annotated = frame.clone();
        let mut stats = FrameStats::default();

        for detection in detections.iter().filter(|d| d.is_person()) {
            stats.total_persons += 1;
            let assessment = assess_person(frame, &detection.bbox, danger_zone_x, &self.ppe);
            self.annotate_person(&mut annotated, detection, &assessment, &mut stats);
        }

        self.annotate_zone(&mut annotated, danger_zone_x);
        self.annotate_stamps(&mut annotated);
        (annotated, stats)
    }

    fn annotate_person(
        &self,
        annotated: &mut Frame,
        detection: &Detection,
        assessment: &PersonAssessment,
        stats: &mut FrameStats,
    ) {
        let label = match assessment.state {
            ComplianceState::Safe => "Seguro".to_string(),
            ComplianceState::Warning => {
                let reason = violation_reason(assessment);
                stats.violations += 1;
                stats.alerts.push(format!("Aviso: {}", reason));
                stats.violation_reasons.push(reason.clone());
                format!("AVISO: {}", reason)
            }
            ComplianceState::Danger => {
                let reason = violation_reason(assessment);
                stats.violations += 1;
                stats.alerts.push(format!("Peligro: {}", reason));
                stats.violation_reasons.push(reason.clone());
                format!("PELIGRO: {}", reason)
            }
        };

        let color = assessment.state.color();
        let bbox = detection.bbox;
        render::draw_rect(annotated, bbox.x1, bbox.y1, bbox.x2, bbox.y2, color, 2);
        render::draw_text(annotated, bbox.x1, bbox.y1.saturating_sub(12), &label, color, 1);
    }

    fn annotate_zone(&self, annotated: &mut Frame, danger_zone_x: u32) {
        let w = annotated.width();
        let h = annotated.height();
        render::blend_rect(annotated, danger_zone_x, 0, w, h, render::RED, 0.2);
        render::draw_vline(annotated, danger_zone_x, render::RED, 2);
        render::draw_text(
            annotated,
            danger_zone_x.saturating_add(10),
            16,
            "ZONA DE PELIGRO",
            render::RED,
            1,
        );
    }

    fn annotate_stamps(&mut self, annotated: &mut Frame) {
        let h = annotated.height();
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        render::draw_text(annotated, 10, h.saturating_sub(20), &stamp, render::WHITE, 1);

        let now = Instant::now();
        let fps = match self.last_frame_time {
            Some(last) => {
                let dt = now.duration_since(last).as_secs_f32();
                if dt > 0.0 {
                    1.0 / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_frame_time = Some(now);
        render::draw_text(
            annotated,
            10,
            10,
            &format!("FPS: {}", fps as u32),
            render::GREEN,
            1,
        );
    }
}
