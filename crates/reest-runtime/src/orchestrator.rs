//! Scenario orchestrator
//!
//! Drives one scenario end to end on a single control task. Traffic runs
//! progress on their own; fault injection and the inter-cycle delay block
//! the control task.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reest_core::{
    AttachMap, ClientHandle, ScenarioConfig, ScenarioError, ScenarioResult, Stage, TestbedError,
};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::collab::{StopOptions, TeardownReport, Testbed, TrafficRun};
use crate::timer::{Timer, TokioTimer};

/// Command sent to the base station once the network is up
pub const DEFAULT_POST_START_COMMAND: &str = "log --mac_level=debug --cu_level=debug";

/// Per-run settings that are not part of the scenario itself
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub post_start_commands: Vec<String>,
    /// Collect artifacts even when the scenario passes
    pub always_collect_artifacts: bool,
    /// Fail a passing scenario if teardown finds warnings in the logs
    pub warnings_as_errors: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            post_start_commands: vec![DEFAULT_POST_START_COMMAND.to_string()],
            always_collect_artifacts: true,
            warnings_as_errors: true,
        }
    }
}

/// Which part of the schedule a traffic completion belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrafficPhase {
    /// Background traffic during fault injection
    Staggered,
    /// Steady-state round after every fault
    Final,
}

/// Counters of one scenario run, indexed by client position
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub injections: Vec<u32>,
    pub traffic_launches: Vec<u32>,
    pub staggered_waits: Vec<u32>,
    pub final_waits: Vec<u32>,
    /// Slots whose run was still in flight and kept for the next client
    pub reused_runs: u32,
    pub validations: u32,
}

impl ScheduleStats {
    pub fn new(clients: usize) -> Self {
        ScheduleStats {
            injections: vec![0; clients],
            traffic_launches: vec![0; clients],
            staggered_waits: vec![0; clients],
            final_waits: vec![0; clients],
            reused_runs: 0,
            validations: 0,
        }
    }

    pub fn total_injections(&self) -> u32 {
        self.injections.iter().sum()
    }

    /// Traffic completions observed for the client at `index`
    pub fn completion_waits(&self, index: usize) -> u32 {
        self.staggered_waits.get(index).copied().unwrap_or(0)
            + self.final_waits.get(index).copied().unwrap_or(0)
    }

    fn record_wait(&mut self, index: usize, phase: TrafficPhase) {
        match phase {
            TrafficPhase::Staggered => self.staggered_waits[index] += 1,
            TrafficPhase::Final => self.final_waits[index] += 1,
        }
    }
}

/// Outcome of one scenario
#[derive(Clone, Debug)]
pub struct ScenarioRun {
    pub id: String,
    pub stats: ScheduleStats,
    /// `None` if teardown was not reached or failed
    pub teardown: Option<TeardownReport>,
    pub elapsed: Duration,
    pub result: ScenarioResult<()>,
}

impl ScenarioRun {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ScenarioError> {
        self.result.as_ref().err()
    }
}

/// Reject client lists the schedule cannot run with
pub fn check_clients(clients: &[ClientHandle]) -> ScenarioResult<()> {
    if clients.is_empty() {
        return Err(ScenarioError::InvalidScenario("no clients to test".into()));
    }
    let mut seen = HashSet::with_capacity(clients.len());
    for &client in clients {
        if !seen.insert(client) {
            return Err(ScenarioError::InvalidScenario(format!(
                "{} listed more than once",
                client
            )));
        }
    }
    Ok(())
}

fn traffic_error(err: TestbedError, client: ClientHandle, index: usize) -> ScenarioError {
    if err.is_transient() {
        ScenarioError::environment(Stage::Traffic, err)
    } else {
        ScenarioError::Traffic {
            client,
            index,
            reason: err.reason().to_string(),
        }
    }
}

fn injection_error(err: TestbedError, client: ClientHandle, index: usize, cycle: u32) -> ScenarioError {
    if err.is_transient() {
        ScenarioError::environment(Stage::Injection, err)
    } else {
        ScenarioError::InjectionRejected {
            client,
            index,
            cycle,
            reason: err.reason().to_string(),
        }
    }
}

fn ensure_in_flight<R: TrafficRun>(
    slot: &Option<R>,
    client: ClientHandle,
    index: usize,
    cycle: u32,
) -> ScenarioResult<()> {
    match slot {
        Some(run) if !run.is_finished() => Ok(()),
        _ => Err(ScenarioError::TrafficEndedEarly {
            client,
            index,
            cycle,
        }),
    }
}

/// Executes scenarios against one testbed
pub struct Orchestrator<B, T = TokioTimer> {
    testbed: B,
    timer: T,
    options: RunOptions,
}

impl<B: Testbed> Orchestrator<B, TokioTimer> {
    pub fn new(testbed: B) -> Self {
        Self::with_timer(testbed, TokioTimer::new())
    }
}

impl<B: Testbed, T: Timer> Orchestrator<B, T> {
    pub fn with_timer(testbed: B, timer: T) -> Self {
        Orchestrator {
            testbed,
            timer,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `scenario` with `clients` in the given (attach) order.
    ///
    /// Teardown runs whenever bring-up was attempted, including after a
    /// failure part-way through the schedule.
    pub async fn run(&self, scenario: &ScenarioConfig, clients: &[ClientHandle]) -> ScenarioRun {
        let span = info_span!("scenario", id = %scenario.id());
        self.run_inner(scenario, clients).instrument(span).await
    }

    async fn run_inner(&self, scenario: &ScenarioConfig, clients: &[ClientHandle]) -> ScenarioRun {
        let started = self.timer.now();
        let mut stats = ScheduleStats::new(clients.len());

        if let Err(err) = check_clients(clients) {
            warn!(%err, "scenario rejected before bring-up");
            return ScenarioRun {
                id: scenario.id().to_string(),
                stats,
                teardown: None,
                elapsed: Duration::ZERO,
                result: Err(err),
            };
        }

        let schedule = scenario.schedule();
        info!(
            clients = clients.len(),
            cycles = schedule.cycle_count(),
            interval = ?schedule.interval(),
            "reestablishment / traffic scenario"
        );

        let mut result = self.execute(scenario, clients, &mut stats).await;
        let teardown = self.teardown(clients, &mut result).await;
        let elapsed = self.timer.now() - started;

        match &result {
            Ok(()) => info!(?elapsed, "scenario passed"),
            Err(err) => error!(%err, retryable = err.is_retryable(), "scenario failed"),
        }

        ScenarioRun {
            id: scenario.id().to_string(),
            stats,
            teardown,
            elapsed,
            result,
        }
    }

    async fn execute(
        &self,
        scenario: &ScenarioConfig,
        clients: &[ClientHandle],
        stats: &mut ScheduleStats,
    ) -> ScenarioResult<()> {
        let schedule = scenario.schedule();

        self.testbed
            .apply_config(scenario.radio())
            .await
            .map_err(|e| ScenarioError::environment(Stage::Configure, e))?;
        self.testbed
            .start_network(clients, &self.options.post_start_commands)
            .await
            .map_err(|e| ScenarioError::environment(Stage::BringUp, e))?;

        let attach = self
            .testbed
            .attach(clients)
            .await
            .map_err(|e| ScenarioError::environment(Stage::Attach, e))?;
        if let Some(missing) = attach.first_missing(clients) {
            return Err(ScenarioError::Environment {
                stage: Stage::Attach,
                reason: format!("no attach record for {}", missing),
                transient: false,
            });
        }
        if attach.len() > clients.len() {
            warn!(
                records = attach.len(),
                clients = clients.len(),
                "ignoring attach records of clients outside the schedule"
            );
        }
        // Every later phase only sees the scheduled clients
        let attach = attach.subset(clients);

        let positions: HashMap<ClientHandle, usize> =
            clients.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let mut slots: Vec<Option<B::Run>> = clients.iter().map(|_| None).collect();

        for (index, &client) in clients.iter().enumerate() {
            info!(
                %client,
                index,
                ipv4 = ?attach.get(client).map(|info| info.ipv4),
                "starting reestablishments with traffic running for all clients"
            );
            self.refill_slots(
                &attach,
                clients,
                &positions,
                &mut slots,
                schedule.traffic_packet_count(),
                stats,
            )
            .await?;

            for cycle in 0..schedule.cycle_count() {
                ensure_in_flight(&slots[index], client, index, cycle)?;
                debug!(%client, cycle, "triggering reestablishment");
                self.testbed
                    .inject_fault(client, schedule.interval())
                    .await
                    .map_err(|e| injection_error(e, client, index, cycle))?;
                stats.injections[index] += 1;
                ensure_in_flight(&slots[index], client, index, cycle)?;
                self.timer.sleep(schedule.interval()).await;
            }

            let run = slots[index].take().ok_or_else(|| ScenarioError::Traffic {
                client,
                index,
                reason: "no traffic run in flight".into(),
            })?;
            self.await_run(run, index, TrafficPhase::Staggered, stats).await?;
        }

        for (index, slot) in slots.iter_mut().enumerate() {
            if let Some(run) = slot.take() {
                self.await_run(run, index, TrafficPhase::Staggered, stats).await?;
            }
        }

        info!("starting traffic after all reestablishments have been completed");
        self.final_round(&attach, clients, &positions, schedule.final_packet_count(), stats)
            .await?;

        self.validate(clients, stats).await
    }

    /// Give every client an in-flight run. Finished runs are reaped and
    /// replaced; runs still in flight are kept.
    async fn refill_slots(
        &self,
        attach: &AttachMap,
        clients: &[ClientHandle],
        positions: &HashMap<ClientHandle, usize>,
        slots: &mut [Option<B::Run>],
        packet_count: u32,
        stats: &mut ScheduleStats,
    ) -> ScenarioResult<()> {
        let mut idle = Vec::new();
        for index in 0..slots.len() {
            if slots[index].as_ref().is_some_and(|run| run.is_finished()) {
                if let Some(run) = slots[index].take() {
                    self.await_run(run, index, TrafficPhase::Staggered, stats).await?;
                }
            }
            match slots[index] {
                Some(_) => stats.reused_runs += 1,
                None => idle.push(clients[index]),
            }
        }

        let Some(&first) = idle.first() else {
            return Ok(());
        };

        debug!(count = idle.len(), packet_count, "starting background traffic");
        let runs = self
            .testbed
            .start_traffic(&attach.subset(&idle), packet_count)
            .await
            .map_err(|e| traffic_error(e, first, positions[&first]))?;

        for run in runs {
            let client = run.client();
            let index = match positions.get(&client) {
                Some(&i) if slots[i].is_none() => i,
                Some(_) => {
                    return Err(ScenarioError::Environment {
                        stage: Stage::Traffic,
                        reason: format!("second traffic run started for {}", client),
                        transient: false,
                    })
                }
                None => {
                    return Err(ScenarioError::Environment {
                        stage: Stage::Traffic,
                        reason: format!("traffic run started for unknown {}", client),
                        transient: false,
                    })
                }
            };
            stats.traffic_launches[index] += 1;
            slots[index] = Some(run);
        }

        for &client in &idle {
            let index = positions[&client];
            if slots[index].is_none() {
                return Err(ScenarioError::Traffic {
                    client,
                    index,
                    reason: "traffic generator returned no run".into(),
                });
            }
        }
        Ok(())
    }

    async fn await_run(
        &self,
        run: B::Run,
        index: usize,
        phase: TrafficPhase,
        stats: &mut ScheduleStats,
    ) -> ScenarioResult<()> {
        let client = run.client();
        let report = self
            .testbed
            .wait_traffic(run)
            .await
            .map_err(|e| traffic_error(e, client, index))?;
        debug!(
            %client,
            sent = report.sent,
            received = report.received,
            ?phase,
            "traffic run completed"
        );
        stats.record_wait(index, phase);
        Ok(())
    }

    /// One simultaneous run per client with no faults. Every run is waited
    /// before the first failure (in client order) is reported.
    async fn final_round(
        &self,
        attach: &AttachMap,
        clients: &[ClientHandle],
        positions: &HashMap<ClientHandle, usize>,
        packet_count: u32,
        stats: &mut ScheduleStats,
    ) -> ScenarioResult<()> {
        let runs = self
            .testbed
            .start_traffic(attach, packet_count)
            .await
            .map_err(|e| traffic_error(e, clients[0], 0))?;

        let mut ordered: Vec<Option<B::Run>> = clients.iter().map(|_| None).collect();
        for run in runs {
            let client = run.client();
            match positions.get(&client) {
                Some(&i) if ordered[i].is_none() => {
                    stats.traffic_launches[i] += 1;
                    ordered[i] = Some(run);
                }
                _ => {
                    return Err(ScenarioError::Environment {
                        stage: Stage::Traffic,
                        reason: format!("unexpected final traffic run for {}", client),
                        transient: false,
                    })
                }
            }
        }

        let mut first_error = None;
        for (index, slot) in ordered.into_iter().enumerate() {
            let outcome = match slot {
                Some(run) => self.await_run(run, index, TrafficPhase::Final, stats).await,
                None => Err(ScenarioError::Traffic {
                    client: clients[index],
                    index,
                    reason: "traffic generator returned no run".into(),
                }),
            };
            if let Err(err) = outcome {
                warn!(%err, "final traffic round failed");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn validate(&self, clients: &[ClientHandle], stats: &mut ScheduleStats) -> ScenarioResult<()> {
        let mut first_error = None;
        for (index, &client) in clients.iter().enumerate() {
            let count = self
                .testbed
                .count_reattaches(client)
                .await
                .map_err(|e| ScenarioError::environment(Stage::Validation, e))?;
            stats.validations += 1;

            if count > 0 {
                error!(%client, index, count, "unwanted reattach detected");
                first_error.get_or_insert(ScenarioError::UnwantedReattach {
                    client,
                    index,
                    count,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn teardown(
        &self,
        clients: &[ClientHandle],
        result: &mut ScenarioResult<()>,
    ) -> Option<TeardownReport> {
        let options = StopOptions {
            collect_artifacts: result.is_err() || self.options.always_collect_artifacts,
            warnings_as_errors: self.options.warnings_as_errors,
        };

        match self.testbed.stop(clients, options).await {
            Ok(report) => {
                debug!(artifacts = report.artifacts.len(), warnings = report.warnings.len(), "network stopped");
                if options.warnings_as_errors && result.is_ok() {
                    if let Some(first) = report.warnings.first() {
                        *result = Err(ScenarioError::Teardown {
                            reason: format!(
                                "{} warning(s) in element logs, first: {}",
                                report.warnings.len(),
                                first
                            ),
                        });
                    }
                }
                Some(report)
            }
            Err(err) => {
                warn!(%err, "teardown failed");
                if result.is_ok() {
                    *result = Err(ScenarioError::Teardown {
                        reason: err.to_string(),
                    });
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_clients() {
        assert!(matches!(
            check_clients(&[]),
            Err(ScenarioError::InvalidScenario(_))
        ));
        assert!(matches!(
            check_clients(&[ClientHandle::new(1), ClientHandle::new(1)]),
            Err(ScenarioError::InvalidScenario(_))
        ));
        assert!(check_clients(&[ClientHandle::new(1), ClientHandle::new(2)]).is_ok());
    }

    #[test]
    fn test_schedule_stats_counters() {
        let mut stats = ScheduleStats::new(2);
        stats.injections[0] = 5;
        stats.injections[1] = 5;
        stats.record_wait(1, TrafficPhase::Staggered);
        stats.record_wait(1, TrafficPhase::Final);

        assert_eq!(stats.total_injections(), 10);
        assert_eq!(stats.completion_waits(1), 2);
        assert_eq!(stats.completion_waits(0), 0);
        assert_eq!(stats.completion_waits(9), 0);
    }

    #[test]
    fn test_error_mapping() {
        let client = ClientHandle::new(4);

        let err = injection_error(TestbedError::Rejected("not allowed".into()), client, 3, 1);
        assert!(matches!(err, ScenarioError::InjectionRejected { index: 3, cycle: 1, .. }));
        assert!(!err.is_retryable());

        let err = injection_error(TestbedError::Transient("StatusCode.ABORTED".into()), client, 3, 1);
        assert!(err.is_retryable());

        let err = traffic_error(TestbedError::Failed("100% packet loss".into()), client, 3);
        assert!(matches!(err, ScenarioError::Traffic { index: 3, .. }));
    }

    #[test]
    fn test_run_options_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.post_start_commands, vec![DEFAULT_POST_START_COMMAND.to_string()]);
        assert!(options.always_collect_artifacts);
        assert!(options.warnings_as_errors);
    }
}
