//! Driver configuration
//!
//! Loaded from JSON. Every field is optional; the defaults reproduce the
//! standard reestablishment suite (4 radio points, 8 clients, 50 s per
//! client, one reestablishment every 10 s).

use std::path::{Path, PathBuf};
use std::time::Duration;

use reest_core::{
    FaultSchedule, RadioAxes, RadioParams, ScenarioConfig, ScenarioError, ScenarioMatrix,
    ScenarioTemplate, TimeAlignmentCalibration, DEFAULT_FINAL_PACKET_COUNT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogConfig;
use crate::orchestrator::{RunOptions, DEFAULT_POST_START_COMMAND};
use crate::suite::DEFAULT_MAX_RERUNS;
use crate::timer::TokioTimer;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Top-level driver configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Explicit radio points, run in order
    pub scenarios: Vec<RadioParams>,
    /// Cross-product axes; replace `scenarios` when set
    pub axes: Option<RadioAxes>,
    #[serde(with = "humantime_serde")]
    pub test_duration_per_client: Duration,
    #[serde(with = "humantime_serde")]
    pub reestablishment_interval: Duration,
    pub final_packet_count: u32,
    pub client_count: usize,
    pub sample_rate: Option<u32>,
    pub global_timing_advance: i32,
    pub time_alignment_calibration: TimeAlignmentCalibration,
    pub enable_qos_reestablishment: bool,
    pub post_start_commands: Vec<String>,
    pub always_collect_artifacts: bool,
    pub warnings_as_errors: bool,
    pub max_reruns: u32,
    /// Multiplier for the delay between reestablishments
    pub time_scale: f64,
    pub log: LogConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            scenarios: ScenarioMatrix::reestablishment_defaults().points().to_vec(),
            axes: None,
            test_duration_per_client: Duration::from_secs(50),
            reestablishment_interval: Duration::from_secs(10),
            final_packet_count: DEFAULT_FINAL_PACKET_COUNT,
            client_count: 8,
            sample_rate: None,
            global_timing_advance: 0,
            time_alignment_calibration: TimeAlignmentCalibration::Disabled,
            enable_qos_reestablishment: true,
            post_start_commands: vec![DEFAULT_POST_START_COMMAND.to_string()],
            always_collect_artifacts: true,
            warnings_as_errors: true,
            max_reruns: DEFAULT_MAX_RERUNS,
            time_scale: 1.0,
            log: LogConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_count == 0 {
            return Err(ConfigError::Invalid("client_count must be at least 1".into()));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        self.schedule()?;
        if self.matrix().is_empty() {
            return Err(ConfigError::Invalid("no scenario to run".into()));
        }
        Ok(())
    }

    pub fn schedule(&self) -> Result<FaultSchedule, ConfigError> {
        let schedule = FaultSchedule::new(self.test_duration_per_client, self.reestablishment_interval)?;
        Ok(schedule.with_final_packet_count(self.final_packet_count))
    }

    pub fn matrix(&self) -> ScenarioMatrix {
        match &self.axes {
            Some(axes) => ScenarioMatrix::cross_product(axes),
            None => ScenarioMatrix::enumerated(self.scenarios.iter().copied()),
        }
    }

    pub fn template(&self) -> Result<ScenarioTemplate, ConfigError> {
        Ok(ScenarioTemplate {
            schedule: self.schedule()?,
            sample_rate: self.sample_rate,
            global_timing_advance: self.global_timing_advance,
            time_alignment_calibration: self.time_alignment_calibration,
            enable_qos_reestablishment: self.enable_qos_reestablishment,
        })
    }

    pub fn scenarios(&self) -> Result<Vec<ScenarioConfig>, ConfigError> {
        Ok(self.matrix().expand(&self.template()?))
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            post_start_commands: self.post_start_commands.clone(),
            always_collect_artifacts: self.always_collect_artifacts,
            warnings_as_errors: self.warnings_as_errors,
        }
    }

    pub fn timer(&self) -> TokioTimer {
        TokioTimer::scaled(self.time_scale)
    }
}
