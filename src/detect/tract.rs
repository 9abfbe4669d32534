#![cfg(feature = "backend-tract")]

//! ONNX person detector via tract.
//!
//! Loads a local model file and runs it on RGB frames. The model is
//! expected to emit one row per detection as
//! `[x1, y1, x2, y2, confidence, class]` in input-pixel coordinates
//! (the layout produced by YOLO-family exports with NMS baked in).

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{BoundingBox, Detection, DetectorBackend};
use crate::frame::Frame;

type OnnxModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct TractBackend {
    model: OnnxModel,
    width: u32,
    height: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.5,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let width = self.width as usize;
        let pixels = frame.pixels();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn parse_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = view.iter().copied().collect();

        let mut detections = Vec::new();
        for row in flat.chunks_exact(6) {
            let confidence = row[4];
            if confidence <= self.confidence_threshold {
                continue;
            }
            let x1 = row[0].max(0.0) as u32;
            let y1 = row[1].max(0.0) as u32;
            let x2 = (row[2] as u32).min(self.width);
            let y2 = (row[3] as u32).min(self.height);
            if x1 >= x2 || y1 >= y2 {
                continue;
            }
            detections.push(Detection {
                class_id: row[5].max(0.0) as u32,
                confidence,
                bbox: BoundingBox::new(x1, y1, x2, y2),
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.parse_output(outputs)
    }
}
