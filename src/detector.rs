/// Object detector interface
///
/// The model itself is opaque. A detector turns a frame into labelled,
/// scored boxes plus an annotated copy of the frame for display.

use crate::frame::Frame;
use image::Rgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Axis-aligned box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// A single detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class name
    pub label: String,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Detector output for one frame
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub detections: Vec<Detection>,

    /// Frame with predictions drawn on it
    pub annotated: Frame,
}

#[cfg_attr(test, mockall::automock)]
pub trait ObjectDetector: Send {
    /// Run inference on `frame` (blocking)
    fn detect(&mut self, frame: &Frame) -> Result<DetectionOutput, DetectorError>;
}

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;

/// Copy of `frame` with each detection's box outlined
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut out = frame.clone();
    let (w, h) = out.dimensions();
    if w == 0 || h == 0 {
        return out;
    }

    for det in detections {
        let b = det.bbox;
        if b.x >= w || b.y >= h || b.width == 0 || b.height == 0 {
            continue;
        }
        let x1 = (b.x + b.width - 1).min(w - 1);
        let y1 = (b.y + b.height - 1).min(h - 1);

        for t in 0..BOX_THICKNESS {
            for x in b.x..=x1 {
                out.put_pixel(x, (b.y + t).min(y1), BOX_COLOR);
                out.put_pixel(x, y1.saturating_sub(t).max(b.y), BOX_COLOR);
            }
            for y in b.y..=y1 {
                out.put_pixel((b.x + t).min(x1), y, BOX_COLOR);
                out.put_pixel(x1.saturating_sub(t).max(b.x), y, BOX_COLOR);
            }
        }
    }

    out
}

/// Replays a fixed list of per-frame detections, looping at the end.
///
/// Stands in for a real model in offline runs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    next: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, next: 0 }
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionOutput, DetectorError> {
        let detections = if self.script.is_empty() {
            Vec::new()
        } else {
            let step = self.script[self.next].clone();
            self.next = (self.next + 1) % self.script.len();
            step
        };

        Ok(DetectionOutput {
            annotated: annotate(frame, &detections),
            detections,
        })
    }
}
