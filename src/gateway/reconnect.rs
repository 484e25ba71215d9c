use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 5;
pub const STEP: Duration = Duration::from_secs(5);
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Linear, capped backoff between gateway connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            step: STEP,
            cap: MAX_DELAY,
        }
    }
}

/// What to do after a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

impl ReconnectPolicy {
    /// `min(attempt * step, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step
            .checked_mul(attempt)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Count one more consecutive failure on top of `failures` and decide.
    pub fn after_failure(&self, failures: u32) -> Step {
        let attempt = failures.saturating_add(1);
        if self.should_give_up(attempt) {
            Step::GiveUp { attempts: attempt }
        } else {
            Step::Retry {
                attempt,
                delay: self.delay_for(attempt),
            }
        }
    }
}
