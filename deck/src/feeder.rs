//! Feed-switch debounce policy.
//!
//! The feeder task polls a mechanical toggle switch between actuator pulse
//! phases, so samples arrive at a coarse, irregular cadence. A hold-time
//! policy fits that: a changed raw level is accepted only once it has held
//! for the full debounce window.

/// Hold-time debouncer for a polled level input.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window_ms: u32,
    accepted: bool,
    candidate: bool,
    candidate_since: u64,
}

impl Debouncer {
    /// `initial` seeds both the accepted and candidate level.
    pub const fn new(window_ms: u32, initial: bool) -> Self {
        Self {
            window_ms,
            accepted: initial,
            candidate: initial,
            candidate_since: 0,
        }
    }

    /// Feed one raw sample; returns the debounced level.
    ///
    /// `now_ms` must be monotonic across calls.
    pub fn update(&mut self, now_ms: u64, raw: bool) -> bool {
        if raw == self.accepted {
            // Any excursion ended before it matured.
            self.candidate = raw;
            return self.accepted;
        }
        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = now_ms;
        } else if now_ms.saturating_sub(self.candidate_since) >= u64::from(self.window_ms) {
            self.accepted = raw;
        }
        self.accepted
    }

    pub fn level(&self) -> bool {
        self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_change_is_accepted_after_window() {
        let mut d = Debouncer::new(200, false);
        assert!(!d.update(0, true));
        assert!(!d.update(100, true));
        assert!(d.update(200, true));
        assert!(d.level());
    }

    #[test]
    fn glitch_shorter_than_window_is_rejected() {
        let mut d = Debouncer::new(200, false);
        assert!(!d.update(0, true));
        assert!(!d.update(150, false));
        // The bounce restarts the window.
        assert!(!d.update(160, true));
        assert!(!d.update(300, true));
        assert!(d.update(360, true));
    }

    #[test]
    fn release_debounces_symmetrically() {
        let mut d = Debouncer::new(200, true);
        assert!(d.update(0, false));
        assert!(d.update(199, false));
        assert!(!d.update(200, false));
    }
}
