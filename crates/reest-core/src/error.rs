//! Error types for the reestablishment driver

use std::fmt;

use thiserror::Error;

use crate::ClientHandle;

/// Step of the schedule that talks to the testbed environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Configure,
    BringUp,
    Attach,
    Traffic,
    Injection,
    Validation,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::BringUp => "bring-up",
            Stage::Attach => "attach",
            Stage::Traffic => "traffic",
            Stage::Injection => "injection",
            Stage::Validation => "validation",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Errors reported by external collaborators (testbed RPC surface)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestbedError {
    /// Environment did not come up in time, or the RPC was aborted
    #[error("transient testbed failure: {0}")]
    Transient(String),

    /// The network declined the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The operation ran and reported non-success
    #[error("operation failed: {0}")]
    Failed(String),
}

impl TestbedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TestbedError::Transient(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            TestbedError::Transient(r) | TestbedError::Rejected(r) | TestbedError::Failed(r) => r,
        }
    }
}

/// Scenario failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Environment failure during {stage}: {reason}")]
    Environment {
        stage: Stage,
        reason: String,
        transient: bool,
    },

    #[error("Traffic failed for {client} (index {index}): {reason}")]
    Traffic {
        client: ClientHandle,
        index: usize,
        reason: String,
    },

    #[error("Traffic for {client} (index {index}) ended before reestablishment cycle {cycle} completed")]
    TrafficEndedEarly {
        client: ClientHandle,
        index: usize,
        cycle: u32,
    },

    #[error("Reestablishment rejected for {client} (index {index}) at cycle {cycle}: {reason}")]
    InjectionRejected {
        client: ClientHandle,
        index: usize,
        cycle: u32,
        reason: String,
    },

    #[error("Unwanted reattach detected for {client} (index {index}): {count} event(s)")]
    UnwantedReattach {
        client: ClientHandle,
        index: usize,
        count: u32,
    },

    #[error("Teardown failed: {reason}")]
    Teardown { reason: String },
}

impl ScenarioError {
    /// Only transient environment failures qualify for a whole-scenario rerun
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScenarioError::Environment {
                transient: true,
                ..
            }
        )
    }

    /// Index of the client the failure is attributed to, if any
    pub fn client_index(&self) -> Option<usize> {
        match self {
            ScenarioError::Traffic { index, .. }
            | ScenarioError::TrafficEndedEarly { index, .. }
            | ScenarioError::InjectionRejected { index, .. }
            | ScenarioError::UnwantedReattach { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn environment(stage: Stage, err: TestbedError) -> Self {
        ScenarioError::Environment {
            stage,
            transient: err.is_transient(),
            reason: err.reason().to_string(),
        }
    }
}

/// Result type for driver operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;
