/// Sighting tracker
///
/// Owns the detection loop and its two stores. Each cycle captures a frame,
/// runs the detector, and passes every confident detection through the
/// debounce cache and the ledger, announcing accepted sightings.
///
/// The tracker handle doubles as the control surface: start, pause/resume
/// and clear.

use crate::config::{ConfigError, TrackerConfig};
use crate::debounce::DebounceCache;
use crate::detector::{Detection, DetectionOutput, DetectorError, ObjectDetector};
use crate::display::DisplaySink;
use crate::enrichment::EnrichmentLookup;
use crate::frame::{resize_frame, FrameSource};
use crate::ledger::{LedgerSnapshot, ObjectLedger};
use crate::narrator::{Announcement, NarrationDispatcher, Narrator};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Detection loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started yet
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Stopped => "stopped",
            LoopState::Running => "running",
            LoopState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Published for every accepted sighting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SightingEvent {
    pub label: String,

    /// Ledger count after this sighting
    pub count: u64,

    /// First sighting since start or the last clear
    pub is_new: bool,

    /// Microseconds since epoch
    pub timestamp: i64,
}

/// Tracker statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub low_confidence: u64,
    pub sightings_accepted: u64,
    pub sightings_debounced: u64,
    pub state: LoopState,
}

/// External collaborators the tracker drives
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn ObjectDetector>,
    pub lookup: Arc<dyn EnrichmentLookup>,
    pub narrator: Arc<dyn Narrator>,
    pub display: Arc<dyn DisplaySink>,
}

/// Capture and inference, run together on a blocking thread
struct FrameStage {
    source: Box<dyn FrameSource>,
    detector: Box<dyn ObjectDetector>,
}

enum StageResult {
    NoFrame,
    Failed(DetectorError),
    Detected(DetectionOutput),
}

struct TrackerStatus {
    state: LoopState,
    frames_processed: u64,
    frames_skipped: u64,
    low_confidence: u64,
    sightings_accepted: u64,
    sightings_debounced: u64,
}

/// State shared between the handle and the loop worker
struct TrackerCore {
    config: TrackerConfig,
    stage: Arc<Mutex<FrameStage>>,
    ledger: RwLock<ObjectLedger>,
    debounce: RwLock<DebounceCache>,
    status: RwLock<TrackerStatus>,
    /// Held for a whole detection step and by `clear`, so neither sees the
    /// other half-done
    step_gate: tokio::sync::Mutex<()>,
    lookup: Arc<dyn EnrichmentLookup>,
    narration: NarrationDispatcher,
    display: Arc<dyn DisplaySink>,
    event_tx: mpsc::UnboundedSender<SightingEvent>,
}

impl TrackerCore {
    async fn run_once(&self) -> Vec<SightingEvent> {
        let stage = Arc::clone(&self.stage);
        let (width, height) = (self.config.frame_width, self.config.frame_height);

        let result = tokio::task::spawn_blocking(move || {
            let mut stage = stage.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

            let Some(frame) = stage.source.capture() else {
                return StageResult::NoFrame;
            };
            let frame = resize_frame(frame, width, height);

            match stage.detector.detect(&frame) {
                Ok(output) => StageResult::Detected(output),
                Err(e) => StageResult::Failed(e),
            }
        })
        .await;

        let output = match result {
            Ok(StageResult::Detected(output)) => output,
            Ok(StageResult::NoFrame) => {
                trace!("No frame captured, skipping cycle");
                self.status.write().await.frames_skipped += 1;
                return Vec::new();
            }
            Ok(StageResult::Failed(e)) => {
                warn!("Detector error: {}", e);
                self.status.write().await.frames_skipped += 1;
                return Vec::new();
            }
            Err(e) => {
                error!("Capture/inference worker panicked: {}", e);
                self.status.write().await.frames_skipped += 1;
                return Vec::new();
            }
        };

        let events = self.process_detections(&output.detections, Instant::now()).await;

        self.display.show_frame(&output.annotated);
        if !events.is_empty() {
            self.display.show_ledger(&self.ledger.read().await.snapshot());
        }

        let mut status = self.status.write().await;
        status.frames_processed += 1;
        if status.frames_processed % 100 == 0 {
            debug!(
                "Processed {} frames, accepted {} sightings",
                status.frames_processed, status.sightings_accepted
            );
        }

        events
    }

    async fn process_detections(&self, detections: &[Detection], now: Instant) -> Vec<SightingEvent> {
        let _step = self.step_gate.lock().await;
        let mut events = Vec::new();

        for det in detections {
            if det.confidence <= self.config.confidence_threshold {
                self.status.write().await.low_confidence += 1;
                continue;
            }

            let label = det.label.as_str();

            let accepted = self.debounce.write().await.should_accept(label, now);
            if !accepted {
                self.status.write().await.sightings_debounced += 1;
                continue;
            }

            let known = self.ledger.read().await.contains(label);
            let enrichment = if known {
                None
            } else {
                Some(self.lookup.lookup(label).await)
            };

            let outcome = self
                .ledger
                .write()
                .await
                .record_sighting(label, |_| enrichment.unwrap_or_default());

            info!(
                "Sighting accepted: {} (count={}, new={}, confidence={:.2})",
                label, outcome.count, outcome.is_new, det.confidence
            );

            // Detached; may finish after later announcements
            self.narration
                .announce(&Announcement::for_sighting(label, outcome.is_new, outcome.count));

            let event = SightingEvent {
                label: label.to_string(),
                count: outcome.count,
                is_new: outcome.is_new,
                timestamp: current_timestamp_micros(),
            };
            if self.event_tx.send(event.clone()).is_err() {
                debug!("Sighting event dropped, no receiver");
            }

            self.status.write().await.sightings_accepted += 1;
            events.push(event);
        }

        events
    }
}

async fn run_loop(core: Arc<TrackerCore>) {
    let interval = core.config.frame_interval();
    info!("Detection loop started");

    loop {
        let state = core.status.read().await.state;
        match state {
            LoopState::Running => {
                core.run_once().await;
            }
            LoopState::Paused => {}
            LoopState::Stopped => break,
        }

        tokio::time::sleep(interval).await;
    }

    info!("Detection loop exited");
}

/// Object sighting tracker and its control surface
pub struct SightingTracker {
    core: Arc<TrackerCore>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    event_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SightingEvent>>,
}

impl SightingTracker {
    /// Create a tracker. The loop does not run until `start`.
    pub fn new(config: TrackerConfig, parts: Collaborators) -> Result<Self, TrackerError> {
        config.validate()?;

        info!("Initializing sighting tracker");
        info!("Debounce window: {:?}", config.debounce_window());
        info!("Confidence threshold: {}", config.confidence_threshold);
        info!("Frame size: {}x{}", config.frame_width, config.frame_height);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let core = TrackerCore {
            stage: Arc::new(Mutex::new(FrameStage {
                source: parts.source,
                detector: parts.detector,
            })),
            ledger: RwLock::new(ObjectLedger::new()),
            debounce: RwLock::new(DebounceCache::new(config.debounce_window())),
            step_gate: tokio::sync::Mutex::new(()),
            status: RwLock::new(TrackerStatus {
                state: LoopState::Stopped,
                frames_processed: 0,
                frames_skipped: 0,
                low_confidence: 0,
                sightings_accepted: 0,
                sightings_debounced: 0,
            }),
            lookup: parts.lookup,
            narration: NarrationDispatcher::new(parts.narrator, config.max_concurrent_narrations),
            display: parts.display,
            event_tx,
            config,
        };

        Ok(Self {
            core: Arc::new(core),
            worker: tokio::sync::Mutex::new(None),
            event_rx: tokio::sync::Mutex::new(event_rx),
        })
    }

    /// Start the detection loop. No-op when already started.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        let mut status = self.core.status.write().await;

        if status.state != LoopState::Stopped {
            warn!("Tracker already started");
            return;
        }

        status.state = LoopState::Running;
        *worker = Some(tokio::spawn(run_loop(Arc::clone(&self.core))));
        info!("Sighting tracker started");
    }

    /// Flip between running and paused. Returns the new state.
    pub async fn toggle_pause(&self) -> LoopState {
        let mut status = self.core.status.write().await;

        status.state = match status.state {
            LoopState::Running => LoopState::Paused,
            LoopState::Paused => LoopState::Running,
            LoopState::Stopped => {
                warn!("Pause requested before start");
                LoopState::Stopped
            }
        };

        info!("Tracker {}", status.state);
        status.state
    }

    /// Pause or resume explicitly. No-op before start. Returns the new state.
    pub async fn set_paused(&self, paused: bool) -> LoopState {
        let mut status = self.core.status.write().await;

        status.state = match (status.state, paused) {
            (LoopState::Stopped, _) => {
                warn!("Pause/resume requested before start");
                LoopState::Stopped
            }
            (_, true) => LoopState::Paused,
            (_, false) => LoopState::Running,
        };

        info!("Tracker {}", status.state);
        status.state
    }

    /// Empty the ledger and the debounce cache, then refresh the display.
    ///
    /// Waits for an in-flight detection step (including its lookup) to finish.
    pub async fn clear(&self) {
        let _step = self.core.step_gate.lock().await;
        self.core.ledger.write().await.clear();
        self.core.debounce.write().await.clear();

        info!("Detections cleared");
        self.core.display.show_ledger(&LedgerSnapshot::default());
    }

    /// Stop the loop worker. Used on process exit.
    pub async fn shutdown(&self) {
        let handle = self.worker.lock().await.take();
        self.core.status.write().await.state = LoopState::Stopped;

        if let Some(handle) = handle {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Detection loop failed: {}", e);
                }
            }
        }

        info!("Sighting tracker stopped");
    }

    /// Run a single capture/detect/track cycle regardless of loop state
    pub async fn run_once(&self) -> Vec<SightingEvent> {
        self.core.run_once().await
    }

    /// Track already-computed detections as if seen at `now`
    pub async fn process_detections(&self, detections: &[Detection], now: Instant) -> Vec<SightingEvent> {
        self.core.process_detections(detections, now).await
    }

    pub async fn state(&self) -> LoopState {
        self.core.status.read().await.state
    }

    /// Label for the pause/resume control
    pub async fn pause_label(&self) -> &'static str {
        match self.state().await {
            LoopState::Paused => "Resume",
            LoopState::Running | LoopState::Stopped => "Pause",
        }
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.core.ledger.read().await.snapshot()
    }

    pub async fn total(&self) -> u64 {
        self.core.ledger.read().await.total()
    }

    pub async fn stats(&self) -> TrackerStats {
        let status = self.core.status.read().await;

        TrackerStats {
            frames_processed: status.frames_processed,
            frames_skipped: status.frames_skipped,
            low_confidence: status.low_confidence,
            sightings_accepted: status.sightings_accepted,
            sightings_debounced: status.sightings_debounced,
            state: status.state,
        }
    }

    /// Get the next sighting event (non-blocking)
    pub async fn try_recv_event(&self) -> Option<SightingEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.try_recv().ok()
    }

    /// Get the next sighting event (blocking)
    pub async fn recv_event(&self) -> Option<SightingEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }
}

impl Drop for SightingTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.abort();
        }
    }
}

fn current_timestamp_micros() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}
