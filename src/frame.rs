/// Frame capture
///
/// A frame source hands out RGB frames one at a time. `None` means no frame
/// this cycle; the tracker treats it as transient and simply tries again.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Frame type used across the tracker
pub type Frame = RgbImage;

/// Image extensions picked up by `ImageDirectorySource`
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send {
    /// Grab the next frame (blocking)
    fn capture(&mut self) -> Option<Frame>;
}

/// Scale `frame` to `width`x`height`, skipping the work when it already fits
pub fn resize_frame(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.dimensions() == (width, height) {
        return frame;
    }
    imageops::resize(&frame, width, height, FilterType::Triangle)
}

/// Cycles through the images of a directory in name order
pub struct ImageDirectorySource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        debug!("Frame source {}: {} images", dir.display(), paths.len());
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirectorySource {
    fn capture(&mut self) -> Option<Frame> {
        if self.paths.is_empty() {
            return None;
        }

        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();

        match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                warn!("Failed to read frame {}: {}", path.display(), e);
                None
            }
        }
    }
}
