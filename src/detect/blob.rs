//! Model-free person finder.
//!
//! Downsamples the frame into a coarse occupancy grid of "lit" cells
//! (cells whose pixels rise above the dark background), groups occupied
//! cells into connected components, and reports tall components as person
//! detections. This keeps the whole pipeline operable without a trained
//! model and reliably finds the synthetic source's silhouette; a real
//! deployment swaps in the ONNX backend.

use anyhow::Result;

use crate::detect::backend::{BoundingBox, Detection, DetectorBackend, CLASS_PERSON};
use crate::frame::Frame;

const CELL: u32 = 16;
/// A cell is occupied when more than this fraction of its pixels are lit.
const CELL_OCCUPANCY: f32 = 0.3;
/// Channel value above which a pixel counts as lit.
const LIT_THRESHOLD: u8 = 40;
/// Components shorter than this are noise (markers, captions), not people.
const MIN_PERSON_HEIGHT: u32 = 96;

pub struct BlobBackend {
    min_height: u32,
}

impl BlobBackend {
    pub fn new() -> Self {
        Self {
            min_height: MIN_PERSON_HEIGHT,
        }
    }

    pub fn with_min_height(mut self, min_height: u32) -> Self {
        self.min_height = min_height;
        self
    }

    fn occupancy_grid(frame: &Frame) -> (Vec<bool>, u32, u32) {
        let cols = frame.width().div_ceil(CELL);
        let rows = frame.height().div_ceil(CELL);
        let mut grid = vec![false; (cols * rows) as usize];

        for row in 0..rows {
            for col in 0..cols {
                let x0 = col * CELL;
                let y0 = row * CELL;
                let x1 = (x0 + CELL).min(frame.width());
                let y1 = (y0 + CELL).min(frame.height());
                let total = ((x1 - x0) * (y1 - y0)) as f32;
                let mut lit = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let [r, g, b] = frame.pixel(x, y);
                        if r.max(g).max(b) > LIT_THRESHOLD {
                            lit += 1;
                        }
                    }
                }
                if total > 0.0 && lit as f32 / total > CELL_OCCUPANCY {
                    grid[(row * cols + col) as usize] = true;
                }
            }
        }
        (grid, cols, rows)
    }
}

impl Default for BlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for BlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let (grid, cols, rows) = Self::occupancy_grid(frame);
        let mut visited = vec![false; grid.len()];
        let mut detections = Vec::new();

        for start in 0..grid.len() {
            if !grid[start] || visited[start] {
                continue;
            }

            // Flood-fill one connected component (4-neighborhood).
            let mut stack = vec![start];
            visited[start] = true;
            let (mut min_c, mut max_c) = (cols, 0u32);
            let (mut min_r, mut max_r) = (rows, 0u32);
            let mut cells = 0u32;
            while let Some(idx) = stack.pop() {
                let (row, col) = (idx as u32 / cols, idx as u32 % cols);
                min_c = min_c.min(col);
                max_c = max_c.max(col);
                min_r = min_r.min(row);
                max_r = max_r.max(row);
                cells += 1;

                let mut visit = |r: u32, c: u32| {
                    let n = (r * cols + c) as usize;
                    if grid[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                };
                if col > 0 {
                    visit(row, col - 1);
                }
                if col + 1 < cols {
                    visit(row, col + 1);
                }
                if row > 0 {
                    visit(row - 1, col);
                }
                if row + 1 < rows {
                    visit(row + 1, col);
                }
            }

            let x1 = min_c * CELL;
            let y1 = min_r * CELL;
            let x2 = ((max_c + 1) * CELL).min(frame.width());
            let y2 = ((max_r + 1) * CELL).min(frame.height());
            if x1 >= x2 || y1 >= y2 {
                continue;
            }
            let bbox = BoundingBox::new(x1, y1, x2, y2);

            // People are tall blobs; markers and captions are short or wide.
            if bbox.height() < self.min_height || bbox.height() <= bbox.width() {
                continue;
            }

            let bbox_cells = (max_c - min_c + 1) * (max_r - min_r + 1);
            let confidence = cells as f32 / bbox_cells as f32;
            detections.push(Detection {
                class_id: CLASS_PERSON,
                confidence,
                bbox,
            });
        }

        Ok(detections)
    }
}
