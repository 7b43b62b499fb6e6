//! Scenario configuration
//!
//! A scenario binds one radio configuration to one fault-injection
//! schedule. Both halves are fixed once the scenario is built.

use std::time::Duration;

use crate::{RadioConfig, ScenarioError, ScenarioResult};

/// Traffic packet count of the steady-state run after all faults
pub const DEFAULT_FINAL_PACKET_COUNT: u32 = 20;

/// Per-client fault-injection schedule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaultSchedule {
    duration_per_client: Duration,
    interval: Duration,
    cycle_count: u32,
    final_packet_count: u32,
}

impl FaultSchedule {
    /// Derive a schedule from the per-client test duration and the spacing
    /// between reestablishments. `cycle_count = duration / interval`.
    ///
    /// A schedule with no cycle (duration shorter than interval) is rejected.
    pub fn new(duration_per_client: Duration, interval: Duration) -> ScenarioResult<Self> {
        if interval.is_zero() {
            return Err(ScenarioError::InvalidScenario(
                "reestablishment interval must be greater than zero".into(),
            ));
        }

        let cycles = duration_per_client.as_nanos() / interval.as_nanos();
        if cycles == 0 {
            return Err(ScenarioError::InvalidScenario(format!(
                "test duration {:?} is shorter than reestablishment interval {:?}",
                duration_per_client, interval
            )));
        }
        let cycle_count = u32::try_from(cycles).map_err(|_| {
            ScenarioError::InvalidScenario(format!("too many reestablishment cycles: {}", cycles))
        })?;

        Ok(FaultSchedule {
            duration_per_client,
            interval,
            cycle_count,
            final_packet_count: DEFAULT_FINAL_PACKET_COUNT,
        })
    }

    pub fn with_final_packet_count(mut self, count: u32) -> Self {
        self.final_packet_count = count;
        self
    }

    pub fn duration_per_client(&self) -> Duration {
        self.duration_per_client
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Packet count of each background traffic run (one packet per second)
    pub fn traffic_packet_count(&self) -> u32 {
        u32::try_from(self.duration_per_client.as_secs())
            .unwrap_or(u32::MAX)
            .max(1)
    }

    pub fn final_packet_count(&self) -> u32 {
        self.final_packet_count
    }
}

/// One end-to-end scenario run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    id: String,
    radio: RadioConfig,
    schedule: FaultSchedule,
}

impl ScenarioConfig {
    pub fn new(radio: RadioConfig, schedule: FaultSchedule) -> Self {
        ScenarioConfig {
            id: radio.params.id(),
            radio,
            schedule,
        }
    }

    /// Reporting identifier, e.g. `band:3-scs:15-bandwidth:50-noise:0`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn radio(&self) -> &RadioConfig {
        &self.radio
    }

    pub fn schedule(&self) -> &FaultSchedule {
        &self.schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RadioParams;

    #[test]
    fn test_cycle_count_derivation() {
        let schedule = FaultSchedule::new(Duration::from_secs(50), Duration::from_secs(10)).unwrap();
        assert_eq!(schedule.cycle_count(), 5);
        assert_eq!(schedule.traffic_packet_count(), 50);
        assert_eq!(schedule.final_packet_count(), DEFAULT_FINAL_PACKET_COUNT);

        // Truncates like integer division
        let schedule = FaultSchedule::new(Duration::from_secs(59), Duration::from_secs(10)).unwrap();
        assert_eq!(schedule.cycle_count(), 5);
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let result = FaultSchedule::new(Duration::from_secs(5), Duration::from_secs(10));
        assert!(matches!(result, Err(ScenarioError::InvalidScenario(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = FaultSchedule::new(Duration::from_secs(50), Duration::ZERO);
        assert!(matches!(result, Err(ScenarioError::InvalidScenario(_))));
    }

    #[test]
    fn test_sub_second_duration_keeps_one_packet() {
        let schedule =
            FaultSchedule::new(Duration::from_millis(500), Duration::from_millis(100)).unwrap();
        assert_eq!(schedule.cycle_count(), 5);
        assert_eq!(schedule.traffic_packet_count(), 1);
    }

    #[test]
    fn test_scenario_id_from_params() {
        let schedule = FaultSchedule::new(Duration::from_secs(50), Duration::from_secs(10))
            .unwrap()
            .with_final_packet_count(7);
        let scenario = ScenarioConfig::new(RadioConfig::new(RadioParams::new(3, 15, 50, 0)), schedule);

        assert_eq!(scenario.id(), "band:3-scs:15-bandwidth:50-noise:0");
        assert_eq!(scenario.schedule().final_packet_count(), 7);
        assert!(scenario.radio().enable_qos_reestablishment);
    }
}
