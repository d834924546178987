//! Bounded polling
//!
//! Analyzers answer some queries with a placeholder until their display has
//! settled, and report sweep completion only through status polling. Both
//! become a loop around [`poll_until`] with a deadline and a cancellation
//! check on every iteration.

use std::thread;
use std::time::{Duration, Instant};

use sa_protocol::CancelToken;
use tracing::trace;

use crate::error::AcquireError;

/// Deadline and pacing for one polling loop
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between attempts
    pub interval: Duration,
}

/// What to report when a loop runs out of time
#[derive(Debug, Clone, Copy)]
pub enum Expiry<'a> {
    /// A value that never became valid
    Settle(&'a str),
    /// A sweep that never completed
    Sweep,
}

/// Call `attempt` until it yields a value, the deadline passes, or `cancel` fires
///
/// `attempt` returns `Ok(None)` for "not yet"; an error ends the loop
/// immediately. The first attempt is always made, even with a zero timeout.
pub fn poll_until<T>(
    policy: PollPolicy,
    cancel: &CancelToken,
    expiry: Expiry<'_>,
    mut attempt: impl FnMut() -> Result<Option<T>, AcquireError>,
) -> Result<T, AcquireError> {
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        attempts += 1;
        if let Some(value) = attempt()? {
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            trace!("Gave up after {} attempts", attempts);
            return Err(match expiry {
                Expiry::Settle(what) => AcquireError::SettleTimeout {
                    what: what.to_string(),
                    waited,
                },
                Expiry::Sweep => AcquireError::SweepTimeout(waited),
            });
        }
        thread::sleep(policy.interval);
    }
}
