use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rhai::{Dynamic, EvalAltResult, Position};

/// Token carried by the termination error raised when a deadline passes.
pub const DEADLINE_TOKEN: &str = "deadline exceeded";

/// Cooperative run deadline shared by the engine progress hook and blocking
/// host functions such as `sleep`.
#[derive(Clone, Debug, Default)]
pub struct Deadline {
    at: Arc<Mutex<Option<Instant>>>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, timeout: Duration) {
        *self.at.lock() = Instant::now().checked_add(timeout);
    }

    pub fn disarm(&self) {
        *self.at.lock() = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.lock().is_some()
    }

    pub fn expired(&self) -> bool {
        matches!(*self.at.lock(), Some(at) if Instant::now() >= at)
    }

    /// Time left before the deadline, `None` when no deadline is armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .lock()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), Box<EvalAltResult>> {
        if self.expired() {
            return Err(terminated());
        }
        Ok(())
    }

    /// Sleeps for `duration`, waking early with a termination error once the
    /// deadline passes.
    pub fn sleep(&self, duration: Duration) -> Result<(), Box<EvalAltResult>> {
        const SLICE: Duration = Duration::from_millis(10);
        let Some(until) = Instant::now().checked_add(duration) else {
            return Err(format!("sleep: duration {:?} is out of range", duration).into());
        };
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep((until - now).min(SLICE));
        }
    }
}

pub(crate) fn terminated() -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorTerminated(
        Dynamic::from(DEADLINE_TOKEN.to_string()),
        Position::NONE,
    ))
}

/// Restores an unarmed deadline when dropped, even if the run unwinds.
pub(crate) struct ArmedDeadline {
    deadline: Deadline,
}

impl ArmedDeadline {
    pub(crate) fn arm(deadline: Deadline, timeout: Duration) -> Self {
        deadline.arm(timeout);
        Self { deadline }
    }
}

impl Drop for ArmedDeadline {
    fn drop(&mut self) {
        self.deadline.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unarmed_deadline_never_expires() {
        let deadline = Deadline::new();
        assert!(!deadline.expired());
        assert_eq!(deadline.remaining(), None);
        deadline.sleep(Duration::from_millis(5)).expect("sleep");
    }

    #[test]
    fn sleep_wakes_early_when_deadline_passes() {
        let deadline = Deadline::new();
        deadline.arm(Duration::from_millis(30));
        let started = Instant::now();
        let error = deadline
            .sleep(Duration::from_secs(5))
            .expect_err("deadline should interrupt");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(*error, EvalAltResult::ErrorTerminated(..)));
    }

    #[test]
    fn unrepresentable_sleep_is_an_error() {
        let deadline = Deadline::new();
        let error = deadline.sleep(Duration::MAX).expect_err("overflow");
        assert!(error.to_string().contains("out of range"));
    }

    #[test]
    fn guard_disarms_on_drop() {
        let deadline = Deadline::new();
        {
            let _armed = ArmedDeadline::arm(deadline.clone(), Duration::from_secs(60));
            assert!(deadline.is_armed());
            assert!(deadline.remaining().is_some());
        }
        assert!(!deadline.is_armed());
    }
}
