use anyhow::Result;

use crate::frame::Frame;

/// COCO class id for a person; the only class the safety rules act on.
pub const CLASS_PERSON: u32 = 0;

/// Pixel-space bounding box, `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        debug_assert!(x1 < x2 && y1 < y2);
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Integer horizontal midpoint, matching the zone-membership rule.
    pub fn x_mid(&self) -> u32 {
        (self.x1 + self.x2) / 2
    }
}

/// One detected object, fresh per inference call.
#[derive(Clone, Debug)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn is_person(&self) -> bool {
        self.class_id == CLASS_PERSON
    }
}

/// Opaque detection capability.
///
/// The classifier treats this as a black box mapping a frame to bounding
/// boxes; its latency directly bounds the achievable stream frame rate.
/// Implementations must not retain pixel data across calls.
pub trait DetectorBackend: Send {
    /// Backend identifier for logs and configuration.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
