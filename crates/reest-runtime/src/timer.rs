//! Timer abstraction for the inter-cycle delay
//!
//! The orchestrator never sleeps on the OS clock directly, so tests can run
//! whole schedules on tokio's paused clock and configs can compress delays.

use std::time::Duration;

use tokio::time::Instant;

/// Source of delays and timestamps for the control task
pub trait Timer {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Timer backed by `tokio::time`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TokioTimer {
    /// Multiplier applied to every requested delay
    scale: f64,
}

impl TokioTimer {
    pub fn new() -> Self {
        TokioTimer { scale: 1.0 }
    }

    /// Compress (`scale < 1.0`) or stretch delays.
    /// Non-finite or non-positive factors fall back to real time.
    pub fn scaled(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        TokioTimer { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Delay actually slept for a requested duration
    pub fn effective(&self, duration: Duration) -> Duration {
        if self.scale == 1.0 {
            duration
        } else {
            duration.mul_f64(self.scale)
        }
    }
}

impl Default for TokioTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(self.effective(duration)).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_timer() {
        let timer = TokioTimer::scaled(0.1);
        assert_eq!(timer.effective(Duration::from_secs(10)), Duration::from_secs(1));

        assert_eq!(TokioTimer::scaled(0.0).scale(), 1.0);
        assert_eq!(TokioTimer::scaled(f64::NAN).scale(), 1.0);
        assert_eq!(TokioTimer::new().effective(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_advances_paused_clock() {
        let timer = TokioTimer::scaled(0.5);
        let start = timer.now();
        timer.sleep(Duration::from_secs(10)).await;
        assert_eq!(timer.now() - start, Duration::from_secs(5));
    }
}
