/// Display sinks
///
/// Receive the annotated frame after each processed cycle and the ledger
/// whenever it may have changed.

use crate::frame::Frame;
use crate::ledger::LedgerSnapshot;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg_attr(test, mockall::automock)]
pub trait DisplaySink: Send + Sync {
    fn show_frame(&self, frame: &Frame);

    fn show_ledger(&self, snapshot: &LedgerSnapshot);
}

/// Text panel for the ledger: one block per object, then the total
pub fn render_ledger_text(snapshot: &LedgerSnapshot) -> String {
    let mut out = String::new();

    for record in &snapshot.records {
        let _ = writeln!(out, "Name: {}", record.label);
        let _ = writeln!(out, "What it is: {}", record.description);
        let _ = writeln!(out, "Purpose: {}", record.usage);
        let _ = writeln!(out, "Quantity: {}", record.count);
        let _ = writeln!(out, "---");
    }
    let _ = write!(out, "Total objects detected: {}", snapshot.total);

    out
}

/// Logs ledger changes, drops frames
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn show_frame(&self, frame: &Frame) {
        debug!("Frame {}x{}", frame.width(), frame.height());
    }

    fn show_ledger(&self, snapshot: &LedgerSnapshot) {
        info!(
            "Ledger: {} classes, {} sightings",
            snapshot.records.len(),
            snapshot.total
        );
    }
}

/// Writes the latest frame and ledger into a directory, overwriting each time
#[derive(Debug, Clone)]
pub struct DirectoryDisplay {
    dir: PathBuf,
}

impl DirectoryDisplay {
    pub const FRAME_FILE: &'static str = "latest_frame.png";
    pub const LEDGER_JSON_FILE: &'static str = "ledger.json";
    pub const LEDGER_TEXT_FILE: &'static str = "ledger.txt";

    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_frame(&self, frame: &Frame) -> Result<(), DisplayError> {
        frame.save(self.dir.join(Self::FRAME_FILE))?;
        Ok(())
    }

    fn write_ledger(&self, snapshot: &LedgerSnapshot) -> Result<(), DisplayError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.dir.join(Self::LEDGER_JSON_FILE), json)?;
        std::fs::write(
            self.dir.join(Self::LEDGER_TEXT_FILE),
            render_ledger_text(snapshot),
        )?;
        Ok(())
    }
}

impl DisplaySink for DirectoryDisplay {
    fn show_frame(&self, frame: &Frame) {
        if let Err(e) = self.write_frame(frame) {
            warn!("Failed to write frame: {}", e);
        }
    }

    fn show_ledger(&self, snapshot: &LedgerSnapshot) {
        if let Err(e) = self.write_ledger(snapshot) {
            warn!("Failed to write ledger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DetectedObject;
    use image::RgbImage;

    fn sample_snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            records: vec![
                DetectedObject {
                    label: "cup".to_string(),
                    description: "small open container".to_string(),
                    usage: "cup".to_string(),
                    count: 2,
                },
                DetectedObject {
                    label: "widget".to_string(),
                    description: "No description available".to_string(),
                    usage: "No usage information available".to_string(),
                    count: 1,
                },
            ],
            total: 3,
        }
    }

    #[test]
    fn test_render_ledger_text() {
        let text = render_ledger_text(&sample_snapshot());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Name: cup");
        assert_eq!(lines[1], "What it is: small open container");
        assert_eq!(lines[2], "Purpose: cup");
        assert_eq!(lines[3], "Quantity: 2");
        assert_eq!(lines[4], "---");
        assert_eq!(lines[5], "Name: widget");
        assert_eq!(*lines.last().unwrap(), "Total objects detected: 3");
    }

    #[test]
    fn test_render_empty_ledger() {
        assert_eq!(
            render_ledger_text(&LedgerSnapshot::default()),
            "Total objects detected: 0"
        );
    }

    #[test]
    fn test_directory_display_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let display = DirectoryDisplay::new(dir.path().join("out")).unwrap();

        display.show_frame(&RgbImage::new(8, 6));
        display.show_ledger(&sample_snapshot());

        let frame = image::open(display.dir().join(DirectoryDisplay::FRAME_FILE)).unwrap().to_rgb8();
        assert_eq!(frame.dimensions(), (8, 6));

        let raw = std::fs::read_to_string(display.dir().join(DirectoryDisplay::LEDGER_JSON_FILE)).unwrap();
        let parsed: LedgerSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, sample_snapshot());

        let text = std::fs::read_to_string(display.dir().join(DirectoryDisplay::LEDGER_TEXT_FILE)).unwrap();
        assert!(text.ends_with("Total objects detected: 3"));
    }
}
