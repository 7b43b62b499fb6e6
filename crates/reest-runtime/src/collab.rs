//! Contracts of the external collaborators driven by the orchestrator
//!
//! Transport, radio simulation and protocol behavior live behind these
//! traits. The orchestrator only sequences calls and interprets results.

use std::time::Duration;

use reest_core::{AttachMap, ClientHandle, RadioConfig, TestbedError};

/// Applies a radio/channel configuration before bring-up
pub trait ConfigBinder {
    async fn apply_config(&self, radio: &RadioConfig) -> Result<(), TestbedError>;
}

/// Options for tearing the network down
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopOptions {
    pub collect_artifacts: bool,
    pub warnings_as_errors: bool,
}

/// What teardown left behind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Names of the collected diagnostic artifacts
    pub artifacts: Vec<String>,
    /// Warnings found in the element logs
    pub warnings: Vec<String>,
}

/// Starts and stops base station, core network and clients
pub trait NetworkDriver {
    /// Start every element; must fail if the clients cannot be brought up
    async fn start_network(
        &self,
        clients: &[ClientHandle],
        post_start_commands: &[String],
    ) -> Result<(), TestbedError>;

    /// Attach the clients and return one record per client
    async fn attach(&self, clients: &[ClientHandle]) -> Result<AttachMap, TestbedError>;

    async fn stop(
        &self,
        clients: &[ClientHandle],
        options: StopOptions,
    ) -> Result<TeardownReport, TestbedError>;
}

/// Completed traffic run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrafficReport {
    pub client: ClientHandle,
    pub sent: u32,
    pub received: u32,
}

/// An in-flight traffic run; consumed by [`TrafficGenerator::wait_traffic`]
pub trait TrafficRun {
    fn client(&self) -> ClientHandle;

    /// True once the run completed, whether or not it has been waited
    fn is_finished(&self) -> bool;
}

/// Launches asynchronous traffic runs and waits for their completion
pub trait TrafficGenerator {
    type Run: TrafficRun;

    /// Launch one run per client in `targets` without blocking on completion
    async fn start_traffic(
        &self,
        targets: &AttachMap,
        packet_count: u32,
    ) -> Result<Vec<Self::Run>, TestbedError>;

    /// Block until `run` completes. Non-success is reported as an error.
    async fn wait_traffic(&self, run: Self::Run) -> Result<TrafficReport, TestbedError>;
}

/// Triggers one reestablishment for one client
pub trait FaultInjector {
    async fn inject_fault(&self, client: ClientHandle, duration: Duration) -> Result<(), TestbedError>;
}

/// Reports full reattaches since the previous query
pub trait OutcomeValidator {
    async fn count_reattaches(&self, client: ClientHandle) -> Result<u32, TestbedError>;
}

/// Everything a scenario needs from its environment
pub trait Testbed:
    ConfigBinder + NetworkDriver + TrafficGenerator + FaultInjector + OutcomeValidator
{
}

impl<T> Testbed for T where
    T: ConfigBinder + NetworkDriver + TrafficGenerator + FaultInjector + OutcomeValidator
{
}
