/// Object sighting tracker library
///
/// Tracks which object classes a live video detector has seen, debounces
/// repeat sightings, keeps a running count per class, and announces new and
/// repeated sightings through a text-to-speech sink.

pub mod config;
pub mod debounce;
pub mod detector;
pub mod display;
pub mod enrichment;
pub mod frame;
pub mod ledger;
pub mod narrator;
pub mod tracker;

// Re-export main types
pub use config::{ConfigError, LookupConfig, TrackerConfig};
pub use debounce::DebounceCache;
pub use detector::{
    annotate, BoundingBox, Detection, DetectionOutput, DetectorError, ObjectDetector,
    ScriptedDetector,
};
pub use display::{render_ledger_text, DirectoryDisplay, DisplayError, DisplaySink, LogDisplay};
pub use enrichment::{Enrichment, EnrichmentLookup, LookupError, StaticLookup, WikidataLookup};
pub use frame::{resize_frame, Frame, FrameSource, ImageDirectorySource};
pub use ledger::{DetectedObject, LedgerSnapshot, ObjectLedger, SightingOutcome};
pub use narrator::{
    Announcement, CommandNarrator, LogNarrator, NarrationDispatcher, NarrationError, Narrator,
};
pub use tracker::{
    Collaborators, LoopState, SightingEvent, SightingTracker, TrackerError, TrackerStats,
};
