use std::time::{Duration, Instant};

use crate::workspace::PlotSettings;

use super::timer::DebounceTimer;

/// Guard that keeps external sync from overwriting a structure choice the
/// author just made, until the optimistic save has had time to land.
#[derive(Debug, Clone)]
pub struct ProtectionWindow {
    timer: DebounceTimer,
}

impl ProtectionWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            timer: DebounceTimer::new(duration),
        }
    }

    pub fn from_settings(settings: &PlotSettings) -> Self {
        Self::new(settings.protection_window())
    }

    /// Starts or restarts the window.
    pub fn arm(&mut self, now: Instant) {
        self.timer.restart(now);
    }

    pub fn clear(&mut self) {
        self.timer.cancel();
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.timer.is_running(now)
    }

    pub fn duration(&self) -> Duration {
        self.timer.delay()
    }
}
