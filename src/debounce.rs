/// Debounce cache
///
/// Remembers when each object class was last counted and rejects repeat
/// sightings that arrive inside the debounce window.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Per-class last-seen timestamps
#[derive(Debug, Clone)]
pub struct DebounceCache {
    window: Duration,
    last_seen: HashMap<String, Instant>,
}

impl DebounceCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    /// Decide whether a sighting of `label` at `now` should be counted.
    ///
    /// Accepted when the label has no entry yet or more than `window` has
    /// elapsed since the last accepted sighting. Acceptance stores `now`;
    /// rejection leaves the cache untouched.
    pub fn should_accept(&mut self, label: &str, now: Instant) -> bool {
        if let Some(last) = self.last_seen.get(label) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed <= self.window {
                trace!("Debounced {} ({:?} since last sighting)", label, elapsed);
                return false;
            }
        }

        self.last_seen.insert(label.to_string(), now);
        true
    }

    /// Last accepted sighting of `label`
    pub fn last_seen(&self, label: &str) -> Option<Instant> {
        self.last_seen.get(label).copied()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_first_sighting_accepted() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let now = Instant::now();

        assert!(cache.should_accept("cup", now));
        assert_eq!(cache.last_seen("cup"), Some(now));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_repeat_inside_window_rejected() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let base = Instant::now();

        assert!(cache.should_accept("cup", base));
        assert!(!cache.should_accept("cup", at(base, 1.0)));
        // Exactly on the window edge still counts as inside
        assert!(!cache.should_accept("cup", at(base, 2.0)));

        // Rejections never move the timestamp
        assert_eq!(cache.last_seen("cup"), Some(base));
    }

    #[test]
    fn test_repeat_after_window_accepted() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let base = Instant::now();

        assert!(cache.should_accept("cup", base));
        assert!(cache.should_accept("cup", at(base, 2.5)));
        assert_eq!(cache.last_seen("cup"), Some(at(base, 2.5)));

        // Window restarts from the new acceptance
        assert!(!cache.should_accept("cup", at(base, 4.0)));
        assert!(cache.should_accept("cup", at(base, 4.6)));
    }

    #[test]
    fn test_labels_are_independent() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let base = Instant::now();

        assert!(cache.should_accept("cup", base));
        assert!(cache.should_accept("bottle", at(base, 0.1)));
        assert!(!cache.should_accept("cup", at(base, 0.2)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_earlier_timestamp_rejected() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let base = Instant::now();

        assert!(cache.should_accept("cup", at(base, 5.0)));
        assert!(!cache.should_accept("cup", base));
    }

    #[test]
    fn test_clear() {
        let mut cache = DebounceCache::new(Duration::from_secs(2));
        let base = Instant::now();

        cache.should_accept("cup", base);
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.should_accept("cup", at(base, 0.5)));
    }
}
