use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// What a poll tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Pull,
    Skip,
}

/// Fallback pull timer. Only pulls while the push channel is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollScheduler {
    period: Duration,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// First tick fires one period from now; startup already pulled once.
    pub fn interval(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub fn on_tick(&self, connected: bool) -> PollDecision {
        if connected {
            PollDecision::Skip
        } else {
            PollDecision::Pull
        }
    }
}
