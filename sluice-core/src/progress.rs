//! Relay progress instrumentation.
//!
//! Purely observational: nothing here can fail or influence the relay.

use serde::Serialize;
use tracing::debug;

/// Snapshot of relay progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub delivered: u64,
    pub total: Option<u64>,
    /// Percentage delivered, `None` when the total is unknown or zero.
    pub percent: Option<f64>,
}

impl Progress {
    pub fn is_indeterminate(&self) -> bool {
        self.percent.is_none()
    }
}

/// Counts delivered bytes against an optional expected total.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    delivered: u64,
    total: Option<u64>,
    /// Last 10% step that was logged.
    last_milestone: u64,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            delivered: 0,
            total: total.filter(|t| *t > 0),
            last_milestone: 0,
        }
    }

    /// Records `chunk_len` more bytes delivered and returns the new progress.
    pub fn observe(&mut self, chunk_len: usize) -> Progress {
        self.delivered = self.delivered.saturating_add(chunk_len as u64);
        let progress = self.snapshot();

        if let Some(percent) = progress.percent {
            let milestone = (percent / 10.0).floor() as u64;
            if milestone > self.last_milestone {
                self.last_milestone = milestone;
                debug!(
                    delivered = self.delivered,
                    total = ?self.total,
                    "Relay progress {:.0}%",
                    percent
                );
            }
        }

        progress
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn snapshot(&self) -> Progress {
        let percent = self
            .total
            .map(|total| self.delivered as f64 / total as f64 * 100.0);
        Progress {
            delivered: self.delivered,
            total: self.total,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_total_reports_percentage() {
        let mut tracker = ProgressTracker::new(Some(200));
        assert_eq!(tracker.observe(50).percent, Some(25.0));
        let progress = tracker.observe(150);
        assert_eq!(progress.delivered, 200);
        assert_eq!(progress.percent, Some(100.0));
    }

    #[test]
    fn test_unknown_or_zero_total_is_indeterminate() {
        let mut unknown = ProgressTracker::new(None);
        assert!(unknown.observe(1024).is_indeterminate());
        assert_eq!(unknown.delivered(), 1024);

        let mut zero = ProgressTracker::new(Some(0));
        let progress = zero.observe(10);
        assert!(progress.is_indeterminate());
        assert_eq!(progress.total, None);
    }

    #[test]
    fn test_overshooting_total_does_not_panic() {
        let mut tracker = ProgressTracker::new(Some(10));
        let progress = tracker.observe(25);
        assert_eq!(progress.percent, Some(250.0));
    }
}
