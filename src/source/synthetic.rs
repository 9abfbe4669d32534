//! Procedural fallback camera.
//!
//! Generates a black scene with a moving yellow marker, a "MODO SIMULACION"
//! banner and a simulated person whose equipment toggles over time: the head
//! alternates white (helmet) and dark every 30 frames, the torso alternates
//! orange (vest) and grey every 60 frames. Pointing the classifier at this
//! stream exercises the full Safe/Danger cycle with no camera attached.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::frame::Frame;
use crate::render;
use crate::source::FrameSource;

/// Generation cadence. Matches the nominal 60 fps capture target and bounds
/// CPU use when the consumer is paused.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

const HEAD_TOGGLE_FRAMES: u64 = 30;
const TORSO_TOGGLE_FRAMES: u64 = 60;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_count: u64,
    last_read: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        log::info!("synthetic camera started ({}x{})", width, height);
        Self {
            width: width.max(64),
            height: height.max(64),
            frame_count: 0,
            last_read: None,
        }
    }

    fn generate(&mut self) -> Frame {
        self.frame_count += 1;
        let mut frame = Frame::black(self.width, self.height, self.frame_count);
        let (w, h) = (self.width as f32, self.height as f32);

        // Moving marker on a sine/cosine path.
        let t = self.frame_count as f32 * 0.05;
        let x = ((t.sin() + 1.0) * 0.5 * (w - 50.0)) as i32 + 25;
        let y = ((t.cos() + 1.0) * 0.5 * (h - 50.0)) as i32 + 25;
        render::fill_circle(&mut frame, x, y, 20, render::YELLOW);

        render::draw_text(&mut frame, 100, 40, "MODO SIMULACION", render::RED, 2);

        // Simulated person, centered left of the default danger zone.
        let cx = (self.width / 2) as i32;
        let head_on = (self.frame_count / HEAD_TOGGLE_FRAMES) % 2 == 0;
        let head_color = if head_on {
            render::WHITE
        } else {
            [50, 50, 50]
        };
        render::fill_circle(&mut frame, cx, (self.height as i32 * 5) / 12, 40, head_color);

        let torso_on = (self.frame_count / TORSO_TOGGLE_FRAMES) % 2 == 0;
        let torso_color = if torso_on {
            render::ORANGE
        } else {
            [100, 100, 100]
        };
        let (tx1, ty1) = (self.width / 2 - 40, self.height / 2);
        let (tx2, ty2) = (self.width / 2 + 40, (self.height * 5) / 6);
        render::fill_rect(&mut frame, tx1, ty1, tx2, ty2, torso_color);

        frame
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Frame> {
        // Self-throttle to the generation cadence.
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < FRAME_INTERVAL {
                std::thread::sleep(FRAME_INTERVAL - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
        Ok(self.generate())
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_monotonic_sequence_numbers() -> Result<()> {
        let mut source = SyntheticSource::new(320, 240);
        let first = source.read()?;
        let second = source.read()?;
        assert!(second.seq > first.seq);
        assert_eq!(first.width(), 320);
        assert_eq!(first.height(), 240);
        Ok(())
    }

    #[test]
    fn head_color_toggles_on_its_cadence() -> Result<()> {
        let mut source = SyntheticSource::new(640, 480);
        // Frame 1: head is white (count / 30 even).
        let early = source.read()?;
        let head = early.pixel(320, 200);
        assert_eq!(head, [255, 255, 255]);

        // Skip ahead past the toggle point.
        source.frame_count = HEAD_TOGGLE_FRAMES;
        source.last_read = None;
        let late = source.generate();
        assert_eq!(late.pixel(320, 200), [50, 50, 50]);
        Ok(())
    }

    #[test]
    fn torso_toggles_between_vest_and_plain() {
        let mut source = SyntheticSource::new(640, 480);
        source.frame_count = 0;
        let equipped = source.generate();
        assert_eq!(equipped.pixel(320, 300), [255, 165, 0]);

        source.frame_count = TORSO_TOGGLE_FRAMES;
        let plain = source.generate();
        assert_eq!(plain.pixel(320, 300), [100, 100, 100]);
    }
}
