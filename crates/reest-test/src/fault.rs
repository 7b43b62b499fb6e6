//! Fault profiles for the simulated RAN
//!
//! Random faults are drawn from a seeded RNG, so a profile and a seed
//! always give the same outcome. Scripted faults fire exactly once.

use std::time::Duration;

use reest_core::ClientHandle;

/// Probabilities and latencies of the simulated testbed
#[derive(Clone, Debug, PartialEq)]
pub struct FaultProfile {
    pub seed: u64,
    /// Bring-up fails with "failed to start"
    pub start_failure_prob: f64,
    /// Attach times out
    pub attach_timeout_prob: f64,
    /// A reestablishment request is declined
    pub rejection_prob: f64,
    /// A traffic run reports packet loss
    pub traffic_failure_prob: f64,
    /// A reestablishment falls back to a full reattach
    pub reattach_prob: f64,
    /// Time per traffic packet
    pub packet_interval: Duration,
    pub injection_latency: Duration,
    pub bringup_latency: Duration,
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self::clean()
    }
}

impl FaultProfile {
    /// No random faults
    pub fn clean() -> Self {
        FaultProfile {
            seed: 0,
            start_failure_prob: 0.0,
            attach_timeout_prob: 0.0,
            rejection_prob: 0.0,
            traffic_failure_prob: 0.0,
            reattach_prob: 0.0,
            packet_interval: Duration::from_secs(1),
            injection_latency: Duration::from_millis(100),
            bringup_latency: Duration::from_secs(2),
        }
    }

    /// Environment that often fails to come up
    pub fn flaky_bringup() -> Self {
        FaultProfile {
            start_failure_prob: 0.5,
            attach_timeout_prob: 0.2,
            ..Self::clean()
        }
    }

    /// Every kind of fault, at low rates
    pub fn hostile() -> Self {
        FaultProfile {
            start_failure_prob: 0.1,
            attach_timeout_prob: 0.05,
            rejection_prob: 0.02,
            traffic_failure_prob: 0.02,
            reattach_prob: 0.02,
            ..Self::clean()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Multiply every latency by `scale`, to match a scaled driver timer
    pub fn time_scaled(mut self, scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 && scale != 1.0 {
            self.packet_interval = self.packet_interval.mul_f64(scale);
            self.injection_latency = self.injection_latency.mul_f64(scale);
            self.bringup_latency = self.bringup_latency.mul_f64(scale);
        }
        self
    }
}

/// Deterministic one-shot fault
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedFault {
    /// Next bring-up fails with "failed to start"
    FailStart,
    /// Next attach fails with "Attach timeout reached"
    AttachTimeout,
    /// Next attach also reports a record for a client that was not asked for
    ExtraAttach(ClientHandle),
    /// The injection RPC for `cycle` of `client` is aborted
    AbortInjection { client: ClientHandle, cycle: u32 },
    /// The network declines `cycle` of `client`
    RejectInjection { client: ClientHandle, cycle: u32 },
    /// `cycle` of `client` ends in a full reattach
    Reattach { client: ClientHandle, cycle: u32 },
    /// The `run`-th traffic run of `client` (zero-based) reports loss
    FailTraffic { client: ClientHandle, run: u32 },
    /// The `run`-th traffic run of `client` lasts `duration`
    TrafficDuration {
        client: ClientHandle,
        run: u32,
        duration: Duration,
    },
    /// The `call`-th `start_traffic` request (zero-based) fails outright
    FailTrafficStart { call: u32 },
    /// The next reattach query cannot reach the validator
    FailReattachQuery,
    /// Teardown finds this warning in the element logs
    TeardownWarning(String),
    /// Teardown itself fails
    FailTeardown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let clean = FaultProfile::clean();
        assert_eq!(clean.rejection_prob, 0.0);
        assert_eq!(clean.packet_interval, Duration::from_secs(1));

        let hostile = FaultProfile::hostile().with_seed(99);
        assert_eq!(hostile.seed, 99);
        assert!(hostile.reattach_prob > 0.0);
        assert_eq!(hostile.packet_interval, clean.packet_interval);

        assert!(FaultProfile::flaky_bringup().start_failure_prob > 0.0);
    }

    #[test]
    fn test_time_scaled() {
        let fast = FaultProfile::clean().time_scaled(0.01);
        assert_eq!(fast.packet_interval, Duration::from_millis(10));
        assert_eq!(fast.injection_latency, Duration::from_millis(1));
        assert_eq!(FaultProfile::clean().time_scaled(-1.0), FaultProfile::clean());
    }
}
