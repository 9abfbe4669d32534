//! Color-heuristic PPE check.
//!
//! Helmets and vests are inferred from the dominant colors of two bands of
//! the person's bounding box: a head band (top 25% of the height, central
//! 60% of the width, to keep walls and background out) and a torso band
//! (20%-60% of the height, full width). Pixels are matched against
//! configured HSV ranges and a flag is raised when the matching density
//! strictly exceeds the threshold.
//!
//! The heuristic is approximate and lighting-sensitive, so every range and
//! threshold lives in `PpeConfig` and can be tuned or replaced without
//! touching the compliance rules.

use serde::Deserialize;

use crate::detect::BoundingBox;
use crate::frame::Frame;

/// Inclusive HSV range in OpenCV scaling: H 0-180, S and V 0-255.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct HsvRange {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub s_max: u8,
    pub v_min: u8,
    pub v_max: u8,
}

impl HsvRange {
    pub const fn new(h_min: u8, h_max: u8, s_min: u8, s_max: u8, v_min: u8, v_max: u8) -> Self {
        Self {
            h_min,
            h_max,
            s_min,
            s_max,
            v_min,
            v_max,
        }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        let [h, s, v] = hsv;
        (self.h_min..=self.h_max).contains(&h)
            && (self.s_min..=self.s_max).contains(&s)
            && (self.v_min..=self.v_max).contains(&v)
    }
}

// Default target colors for safety equipment.
const WHITE: HsvRange = HsvRange::new(0, 180, 0, 45, 180, 255);
const YELLOW_GREEN: HsvRange = HsvRange::new(20, 50, 50, 255, 70, 255);
const YELLOW_GREEN_LOOSE: HsvRange = HsvRange::new(20, 50, 20, 255, 50, 255);
const RED_LOW: HsvRange = HsvRange::new(0, 10, 100, 255, 100, 255);
const RED_HIGH: HsvRange = HsvRange::new(160, 180, 100, 255, 100, 255);
const BLUE: HsvRange = HsvRange::new(90, 130, 80, 255, 80, 255);
const ORANGE: HsvRange = HsvRange::new(10, 25, 100, 255, 100, 255);

/// Tunable PPE heuristic parameters.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PpeConfig {
    pub helmet_ranges: Vec<HsvRange>,
    pub vest_ranges: Vec<HsvRange>,
    /// Matching-pixel density above which a band counts as equipped.
    /// Comparison is strict (`>`).
    pub density_threshold: f32,
}

impl Default for PpeConfig {
    fn default() -> Self {
        Self {
            helmet_ranges: vec![WHITE, YELLOW_GREEN, RED_LOW, RED_HIGH, BLUE, ORANGE],
            vest_ranges: vec![ORANGE, YELLOW_GREEN_LOOSE, RED_LOW, RED_HIGH],
            density_threshold: 0.15,
        }
    }
}

/// RGB -> HSV in OpenCV 8-bit scaling (H halved into 0..=180).
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let r = rgb[0] as f32;
    let g = rgb[1] as f32;
    let b = rgb[2] as f32;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        let mut h = 60.0 * (g - b) / delta;
        if h < 0.0 {
            h += 360.0;
        }
        h
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };

    [(h / 2.0) as u8, s as u8, v as u8]
}

/// Evaluate helmet and vest presence inside the person's bounding box.
///
/// Returns `(has_helmet, has_vest)`. A zero-area person region or band
/// yields `(false, false)`; densities are computed against the literal
/// pixel count of the evaluated band.
pub fn assess_ppe(frame: &Frame, bbox: &BoundingBox, config: &PpeConfig) -> (bool, bool) {
    let x1 = bbox.x1.min(frame.width());
    let y1 = bbox.y1.min(frame.height());
    let x2 = bbox.x2.min(frame.width());
    let y2 = bbox.y2.min(frame.height());
    if x1 >= x2 || y1 >= y2 {
        return (false, false);
    }
    let w = x2 - x1;
    let h = y2 - y1;

    // Head band: top quarter, central 60% of the width.
    let w_offset = (w as f32 * 0.2) as u32;
    let head_y2 = y1 + (h as f32 * 0.25) as u32;
    let head_x1 = x1 + w_offset;
    let head_x2 = x2 - w_offset;

    // Torso band: 20%-60% of the height, full width.
    let torso_y1 = y1 + (h as f32 * 0.2) as u32;
    let torso_y2 = y1 + (h as f32 * 0.6) as u32;

    if head_x1 >= head_x2 || y1 >= head_y2 || torso_y1 >= torso_y2 {
        return (false, false);
    }

    let has_helmet = band_density(frame, head_x1, y1, head_x2, head_y2, &config.helmet_ranges)
        > config.density_threshold;
    let has_vest = band_density(frame, x1, torso_y1, x2, torso_y2, &config.vest_ranges)
        > config.density_threshold;
    (has_helmet, has_vest)
}

fn band_density(frame: &Frame, x1: u32, y1: u32, x2: u32, y2: u32, ranges: &[HsvRange]) -> f32 {
    let area = ((x2 - x1) as u64) * ((y2 - y1) as u64);
    if area == 0 {
        return 0.0;
    }
    let mut matched = 0u64;
    for y in y1..y2 {
        for x in x1..x2 {
            let hsv = rgb_to_hsv(frame.pixel(x, y));
            if ranges.iter().any(|range| range.contains(hsv)) {
                matched += 1;
            }
        }
    }
    matched as f32 / area as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render;

    #[test]
    fn hsv_conversion_matches_opencv_scaling() {
        // Pure white: zero saturation, full value.
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        // Safety orange lands in the orange hue band.
        let [h, s, v] = rgb_to_hsv([255, 165, 0]);
        assert!((10..=25).contains(&h), "orange hue {}", h);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
        // Pure blue.
        let [h, ..] = rgb_to_hsv([0, 0, 255]);
        assert_eq!(h, 120);
    }

    fn person_frame(head: render::Color, torso: render::Color) -> (Frame, BoundingBox) {
        let mut frame = Frame::black(640, 480, 1);
        render::fill_circle(&mut frame, 320, 200, 40, head);
        render::fill_rect(&mut frame, 280, 240, 360, 400, torso);
        (frame, BoundingBox::new(280, 160, 360, 400))
    }

    #[test]
    fn white_helmet_and_orange_vest_are_recognized() {
        let (frame, bbox) = person_frame(render::WHITE, render::ORANGE);
        let (helmet, vest) = assess_ppe(&frame, &bbox, &PpeConfig::default());
        assert!(helmet);
        assert!(vest);
    }

    #[test]
    fn dark_head_and_grey_torso_fail_the_check() {
        let (frame, bbox) = person_frame([50, 50, 50], [100, 100, 100]);
        let (helmet, vest) = assess_ppe(&frame, &bbox, &PpeConfig::default());
        assert!(!helmet);
        assert!(!vest);
    }

    #[test]
    fn helmet_without_vest_is_detected_independently() {
        let (frame, bbox) = person_frame(render::WHITE, [100, 100, 100]);
        let (helmet, vest) = assess_ppe(&frame, &bbox, &PpeConfig::default());
        assert!(helmet);
        assert!(!vest);
    }

    #[test]
    fn zero_area_bbox_yields_no_equipment() {
        let frame = Frame::black(64, 64, 1);
        // Clamped to the frame edge, the region collapses to zero area.
        let bbox = BoundingBox::new(60, 60, 63, 63);
        let tiny = BoundingBox::new(62, 62, 63, 63);
        let cfg = PpeConfig::default();
        let _ = assess_ppe(&frame, &bbox, &cfg);
        let (helmet, vest) = assess_ppe(&frame, &tiny, &cfg);
        assert!(!helmet);
        assert!(!vest);
    }

    #[test]
    fn density_comparison_is_strict() {
        // A band exactly at the threshold must not count as equipped.
        let mut cfg = PpeConfig::default();
        cfg.density_threshold = 1.0;
        let (frame, bbox) = person_frame(render::WHITE, render::ORANGE);
        let (helmet, _) = assess_ppe(&frame, &bbox, &cfg);
        assert!(!helmet, "density can never strictly exceed 1.0");
    }
}
