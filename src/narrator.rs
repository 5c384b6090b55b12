/// Spoken announcements
///
/// The narrator speaks blocking; `NarrationDispatcher` turns every
/// announcement into a detached task so the detection loop never waits on
/// speech synthesis.

use std::fmt;
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("Failed to launch speech command {command}: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("Speech command exited with {0}")]
    Failed(String),
}

/// What gets announced for an accepted sighting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    NewObject { label: String },
    SeenAgain { label: String, count: u64 },
}

impl Announcement {
    pub fn for_sighting(label: &str, is_new: bool, count: u64) -> Self {
        if is_new {
            Announcement::NewObject {
                label: label.to_string(),
            }
        } else {
            Announcement::SeenAgain {
                label: label.to_string(),
                count,
            }
        }
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::NewObject { label } => write!(f, "New object detected: {},", label),
            Announcement::SeenAgain { label, count } => {
                write!(f, "{} detected again. Total: {}.", label, count)
            }
        }
    }
}

/// Text-to-speech sink
#[cfg_attr(test, mockall::automock)]
pub trait Narrator: Send + Sync {
    /// Speak `text`, blocking until done
    fn speak(&self, text: &str) -> Result<(), NarrationError>;
}

/// Speaks through an external program, text passed as the last argument
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: String,
    args: Vec<String>,
}

impl CommandNarrator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `espeak -v en`
    pub fn espeak() -> Self {
        Self::new("espeak").arg("-v").arg("en")
    }
}

impl Narrator for CommandNarrator {
    fn speak(&self, text: &str) -> Result<(), NarrationError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .status()
            .map_err(|source| NarrationError::Launch {
                command: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(NarrationError::Failed(status.to_string()));
        }

        Ok(())
    }
}

/// Writes announcements to the log instead of speaking
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNarrator;

impl Narrator for LogNarrator {
    fn speak(&self, text: &str) -> Result<(), NarrationError> {
        info!("Narration: {}", text);
        Ok(())
    }
}

/// Fire-and-forget front for a narrator
#[derive(Clone)]
pub struct NarrationDispatcher {
    narrator: Arc<dyn Narrator>,
    permits: Arc<Semaphore>,
}

impl NarrationDispatcher {
    pub fn new(narrator: Arc<dyn Narrator>, max_concurrent: usize) -> Self {
        Self {
            narrator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Queue `text` for speaking and return immediately.
    ///
    /// Failures are logged and dropped. Order between dispatches is not kept.
    /// The handle may be ignored; it exists so callers can wait in tests.
    pub fn dispatch(&self, text: String) -> JoinHandle<()> {
        let narrator = Arc::clone(&self.narrator);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            debug!("Speaking: {}", text);
            let result = tokio::task::spawn_blocking(move || narrator.speak(&text)).await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Narration failed: {}", e),
                Err(e) => warn!("Narration task panicked: {}", e),
            }
        })
    }

    pub fn announce(&self, announcement: &Announcement) -> JoinHandle<()> {
        self.dispatch(announcement.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_announcement_text() {
        assert_eq!(
            Announcement::for_sighting("cup", true, 1).to_string(),
            "New object detected: cup,"
        );
        assert_eq!(
            Announcement::for_sighting("cup", false, 3).to_string(),
            "cup detected again. Total: 3."
        );
    }

    #[tokio::test]
    async fn test_dispatch_reaches_narrator() {
        let mut mock = MockNarrator::new();
        mock.expect_speak()
            .withf(|text| text.to_string() == "New object detected: cup,")
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = NarrationDispatcher::new(Arc::new(mock), 2);
        dispatcher
            .announce(&Announcement::for_sighting("cup", true, 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let mut mock = MockNarrator::new();
        mock.expect_speak()
            .returning(|_| Err(NarrationError::Failed("exit status: 1".to_string())));

        let dispatcher = NarrationDispatcher::new(Arc::new(mock), 1);
        assert!(dispatcher.dispatch("hello".to_string()).await.is_ok());
    }

    struct SlowNarrator {
        active: AtomicUsize,
        peak: AtomicUsize,
        spoken: Mutex<Vec<String>>,
    }

    impl Narrator for SlowNarrator {
        fn speak(&self, text: &str) -> Result<(), NarrationError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.spoken.lock().unwrap().push(text.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let narrator = Arc::new(SlowNarrator {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        });
        let dispatcher = NarrationDispatcher::new(narrator.clone(), 2);

        let handles: Vec<_> = (0..6)
            .map(|i| dispatcher.dispatch(format!("line {}", i)))
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(narrator.spoken.lock().unwrap().len(), 6);
        assert!(narrator.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_missing_program_reports_launch_error() {
        let narrator = CommandNarrator::new("definitely-not-a-speech-engine-xyz");
        assert!(matches!(
            narrator.speak("hello"),
            Err(NarrationError::Launch { .. })
        ));
    }
}
