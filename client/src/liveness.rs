//! Staleness detection from traffic timestamps
//!
//! A connection counts as alive while traffic in either direction is recent.
//! It is stale only when neither direction has seen traffic within the
//! threshold; a direction that never saw traffic counts as old.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    last_sent: Option<Instant>,
    last_received: Option<Instant>,
    stale_after: Duration,
}

impl LivenessMonitor {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            last_sent: None,
            last_received: None,
            stale_after,
        }
    }

    pub fn packet_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    pub fn packet_received(&mut self, now: Instant) {
        self.last_received = Some(now);
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    fn is_fresh(&self, at: Option<Instant>, now: Instant) -> bool {
        at.is_some_and(|at| now.saturating_duration_since(at) <= self.stale_after)
    }

    /// Either fresh direction keeps the connection alive
    pub fn is_stale(&self, now: Instant) -> bool {
        !self.is_fresh(self.last_sent, now) && !self.is_fresh(self.last_received, now)
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_received = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(30);

    #[test]
    fn test_unset_timestamps_are_stale() {
        let monitor = LivenessMonitor::new(THRESHOLD);
        assert!(monitor.is_stale(Instant::now()));
    }

    #[test]
    fn test_both_old_is_stale() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD);
        monitor.packet_sent(start);
        monitor.packet_received(start);

        assert!(!monitor.is_stale(start + THRESHOLD));
        assert!(monitor.is_stale(start + THRESHOLD + Duration::from_secs(1)));
    }

    #[test]
    fn test_fresh_send_alone_keeps_alive() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD);
        monitor.packet_received(start);
        monitor.packet_sent(start + Duration::from_secs(50));

        assert!(!monitor.is_stale(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_fresh_receive_alone_keeps_alive() {
        let start = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD);
        monitor.packet_received(start + Duration::from_secs(50));

        assert!(!monitor.is_stale(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_reset_clears_both() {
        let now = Instant::now();
        let mut monitor = LivenessMonitor::new(THRESHOLD);
        monitor.packet_sent(now);
        monitor.reset();
        assert_eq!(monitor.last_sent(), None);
        assert!(monitor.is_stale(now));
    }
}
