//! Reestablishment suites over the simulated RAN

use std::time::Duration;

use reest_core::{
    ClientHandle, FaultSchedule, RadioConfig, RadioParams, ScenarioConfig, ScenarioResult,
};
use reest_runtime::{ConfigError, DriverConfig, Orchestrator, RunOptions, ScenarioRun, SuiteRunner, TokioTimer};
use tracing::debug;

use crate::fault::{FaultProfile, ScriptedFault};
use crate::sim::{provision_clients, SimulatedRan};

/// First default radio point with the standard 50 s / 10 s schedule
pub fn standard_scenario() -> ScenarioResult<ScenarioConfig> {
    let schedule = FaultSchedule::new(Duration::from_secs(50), Duration::from_secs(10))?;
    Ok(ScenarioConfig::new(
        RadioConfig::new(RadioParams::new(3, 15, 50, 0)),
        schedule,
    ))
}

/// Run one scenario on `sim`. The returned handle shares the event log.
pub async fn run_simulated(
    scenario: &ScenarioConfig,
    clients: &[ClientHandle],
    sim: SimulatedRan,
    options: RunOptions,
) -> ScenarioRun {
    Orchestrator::with_timer(sim, TokioTimer::new())
        .with_options(options)
        .run(scenario, clients)
        .await
}

/// Run the scripted faults against a fresh clean testbed
pub async fn run_scripted(
    scenario: &ScenarioConfig,
    client_count: usize,
    script: Vec<ScriptedFault>,
    options: RunOptions,
) -> (ScenarioRun, SimulatedRan) {
    let sim = SimulatedRan::with_script(FaultProfile::clean(), script);
    let clients = provision_clients(client_count);
    let run = run_simulated(scenario, &clients, sim.clone(), options).await;
    (run, sim)
}

/// Run the whole configured matrix, one fresh simulated testbed per
/// attempt. Reruns draw from a different seed. The simulated latencies
/// follow the configured time scale.
pub async fn run_reestablishment_suite(
    config: &DriverConfig,
    profile: FaultProfile,
) -> Result<SuiteRunner, ConfigError> {
    config.validate()?;
    let clients = provision_clients(config.client_count);
    let profile = profile.time_scaled(config.time_scale);

    let mut runner = SuiteRunner::new(config.run_options()).with_max_reruns(config.max_reruns);
    runner.add_scenarios(config.scenarios()?);

    runner
        .run_all(&clients, config.timer(), |scenario, attempt| {
            let seed = profile.seed.wrapping_add(u64::from(attempt));
            debug!(scenario = %scenario.id(), attempt, seed, "provisioning simulated testbed");
            SimulatedRan::new(profile.clone().with_seed(seed))
        })
        .await;

    Ok(runner)
}
