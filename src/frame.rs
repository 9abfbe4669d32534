//! Frame buffer types and the shared latest-frame slot.
//!
//! - `Frame`: an RGB8 pixel buffer tagged with a monotonic sequence number.
//! - `FrameSlot`: a single-slot, last-write-wins exchange between the
//!   acquisition thread (writer) and any number of stream loops (readers).
//!
//! The slot is deliberately lossy: publishing replaces the previous frame,
//! it never queues. Readers may observe a stale frame but never a torn one,
//! because the slot hands out `Arc<Frame>` clones under a mutex.

use std::sync::{Arc, Mutex};

/// One captured or generated video frame. RGB, 8 bits per channel,
/// row-major, `height * width * 3` bytes. Immutable once produced by a
/// source; annotation always works on a copy.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    /// Monotonically increasing per source. Lets consumers tell fresh
    /// frames from repeats of the same slot value.
    pub seq: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, seq: u64) -> Self {
        debug_assert_eq!(pixels.len(), (width as usize) * (height as usize) * 3);
        Self {
            pixels,
            width,
            height,
            seq,
        }
    }

    /// All-black frame of the given size.
    pub fn black(width: u32, height: u32, seq: u64) -> Self {
        Self::new(
            vec![0u8; (width as usize) * (height as usize) * 3],
            width,
            height,
            seq,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True when the frame carries no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGB triple at (x, y). Out-of-bounds reads return black rather than
    /// panicking; heuristic sub-regions are clamped by their callers.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        self.pixels[idx] = rgb[0];
        self.pixels[idx + 1] = rgb[1];
        self.pixels[idx + 2] = rgb[2];
    }
}

// ----------------------------------------------------------------------------
// FrameSlot: single-slot frame exchange
// ----------------------------------------------------------------------------

/// Shared latest-frame slot.
///
/// Exactly one writer (the acquisition thread) replaces the slot value;
/// readers clone the `Arc` out. The writer never blocks on slow readers
/// and readers never block the writer beyond the mutex hand-off.
#[derive(Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
        }
    }

    /// Publish a frame, superseding whatever was there. The previous frame
    /// is dropped as soon as the last reader releases its `Arc`.
    pub fn publish(&self, frame: Frame) {
        let mut guard = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::new(frame));
    }

    /// Non-blocking read of the most recent published frame. May return the
    /// same frame repeatedly if the producer is slower than the consumer.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let guard = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }
}
