use std::fmt::Display;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Source of delays between attempts, swappable in tests.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached, sleeping
/// `policy.delay` between attempts. Returns the last error on exhaustion.
pub fn retry<T, E, F>(policy: &RetryPolicy, sleeper: &dyn Sleeper, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(attempt, max = attempts, error = %e, "Attempt failed, retrying");
                sleeper.sleep(policy.delay);
                attempt += 1;
            }
        }
    }
}
