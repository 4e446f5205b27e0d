//! Per-class cooldown for video detections.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Suppresses repeated alerts for the same object class.
///
/// A detected object usually stays in frame for many consecutive frames;
/// one alert per class per cooldown window is enough.
#[derive(Debug)]
pub struct ClassCooldown {
    cooldown: Duration,
    last_alerted: HashMap<String, Instant>,
}

impl ClassCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alerted: HashMap::new(),
        }
    }

    /// Whether an alert for this class may go out now; admitting starts
    /// the class's cooldown.
    pub fn admit(&mut self, class: &str) -> bool {
        self.admit_at(class, Instant::now())
    }

    pub fn admit_at(&mut self, class: &str, now: Instant) -> bool {
        if let Some(last) = self.last_alerted.get(class) {
            if now.duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last_alerted.insert(class.to_string(), now);
        true
    }
}
