//! Simulated RAN testbed
//!
//! Implements every collaborator contract on top of tokio tasks and
//! timers. Traffic runs are spawned tasks that sleep for
//! `packets * packet_interval`; under a paused tokio clock a full
//! scenario completes instantly.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reest_core::{AttachInfo, AttachMap, ClientHandle, RadioConfig, TestbedError};
use reest_runtime::{
    ConfigBinder, FaultInjector, NetworkDriver, OutcomeValidator, StopOptions, TeardownReport,
    TrafficGenerator, TrafficReport, TrafficRun,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::fault::{FaultProfile, ScriptedFault};
use crate::recorder::{EventRecorder, SimEvent};

/// Handles `ue1..=ueN`, in attach order
pub fn provision_clients(count: usize) -> Vec<ClientHandle> {
    (1..=count as u64).map(ClientHandle::new).collect()
}

/// Address the simulated core network assigns to the `index`-th client
pub fn client_address(index: usize) -> Ipv4Addr {
    let host = index + 2;
    Ipv4Addr::new(10, 45, (host / 256) as u8, (host % 256) as u8)
}

struct SimState {
    rng: StdRng,
    radio: Option<RadioConfig>,
    running: bool,
    attached: Vec<ClientHandle>,
    injections: HashMap<ClientHandle, u32>,
    runs_started: HashMap<ClientHandle, u32>,
    pending_reattaches: HashMap<ClientHandle, u32>,
    next_run_id: u64,
    traffic_calls: u32,
    script: Vec<ScriptedFault>,
}

impl SimState {
    /// Remove and return the first scripted fault matching `pred`
    fn take_scripted(&mut self, pred: impl Fn(&ScriptedFault) -> bool) -> Option<ScriptedFault> {
        let pos = self.script.iter().position(pred)?;
        Some(self.script.remove(pos))
    }

    fn roll(&mut self, prob: f64) -> bool {
        prob > 0.0 && self.rng.gen::<f64>() < prob
    }
}

struct Inner {
    profile: FaultProfile,
    state: Mutex<SimState>,
    recorder: EventRecorder,
}

/// Cloneable handle to one simulated testbed
#[derive(Clone)]
pub struct SimulatedRan {
    inner: Arc<Inner>,
}

impl SimulatedRan {
    pub fn new(profile: FaultProfile) -> Self {
        Self::with_script(profile, Vec::new())
    }

    pub fn with_script(profile: FaultProfile, script: Vec<ScriptedFault>) -> Self {
        let state = SimState {
            rng: StdRng::seed_from_u64(profile.seed),
            radio: None,
            running: false,
            attached: Vec::new(),
            injections: HashMap::new(),
            runs_started: HashMap::new(),
            pending_reattaches: HashMap::new(),
            next_run_id: 0,
            traffic_calls: 0,
            script,
        };
        SimulatedRan {
            inner: Arc::new(Inner {
                profile,
                state: Mutex::new(state),
                recorder: EventRecorder::new(),
            }),
        }
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.inner.recorder
    }

    /// Configuration bound by the last `apply_config`
    pub fn radio(&self) -> Option<RadioConfig> {
        self.inner.state.lock().radio.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Scripted faults that never fired
    pub fn remaining_script(&self) -> Vec<ScriptedFault> {
        self.inner.state.lock().script.clone()
    }
}

/// In-flight simulated traffic run
pub struct SimTrafficRun {
    client: ClientHandle,
    run: u64,
    task: JoinHandle<Result<TrafficReport, TestbedError>>,
}

impl TrafficRun for SimTrafficRun {
    fn client(&self) -> ClientHandle {
        self.client
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl ConfigBinder for SimulatedRan {
    async fn apply_config(&self, radio: &RadioConfig) -> Result<(), TestbedError> {
        self.inner.state.lock().radio = Some(radio.clone());
        self.inner.recorder.record(SimEvent::ConfigApplied {
            id: radio.params.id(),
        });
        Ok(())
    }
}

impl NetworkDriver for SimulatedRan {
    async fn start_network(
        &self,
        clients: &[ClientHandle],
        post_start_commands: &[String],
    ) -> Result<(), TestbedError> {
        tokio::time::sleep(self.inner.profile.bringup_latency).await;

        {
            let mut state = self.inner.state.lock();
            if state.radio.is_none() {
                return Err(TestbedError::Failed("no radio configuration applied".into()));
            }
            let scripted = state.take_scripted(|f| matches!(f, ScriptedFault::FailStart)).is_some();
            let start_failure_prob = self.inner.profile.start_failure_prob;
            if scripted || state.roll(start_failure_prob) {
                return Err(TestbedError::Transient("gnb failed to start".into()));
            }
            state.running = true;
        }

        self.inner.recorder.record(SimEvent::NetworkStarted {
            clients: clients.len(),
            commands: post_start_commands.to_vec(),
        });
        Ok(())
    }

    async fn attach(&self, clients: &[ClientHandle]) -> Result<AttachMap, TestbedError> {
        let attached = {
            let mut state = self.inner.state.lock();
            if !state.running {
                return Err(TestbedError::Failed("network not running".into()));
            }
            let scripted = state
                .take_scripted(|f| matches!(f, ScriptedFault::AttachTimeout))
                .is_some();
            let attach_timeout_prob = self.inner.profile.attach_timeout_prob;
            if scripted || state.roll(attach_timeout_prob) {
                return Err(TestbedError::Transient("Attach timeout reached".into()));
            }
            state.attached = clients.to_vec();
            if let Some(ScriptedFault::ExtraAttach(extra)) =
                state.take_scripted(|f| matches!(f, ScriptedFault::ExtraAttach(_)))
            {
                state.attached.push(extra);
            }
            state.attached.clone()
        };

        let map = AttachMap::from_entries(
            attached
                .iter()
                .enumerate()
                .map(|(i, &c)| (c, AttachInfo::new(client_address(i)))),
        )
        .map_err(|e| TestbedError::Failed(e.to_string()))?;

        for client in map.clients() {
            self.inner.recorder.record(SimEvent::Attached { client });
        }
        Ok(map)
    }

    async fn stop(
        &self,
        clients: &[ClientHandle],
        options: StopOptions,
    ) -> Result<TeardownReport, TestbedError> {
        let (failed, warnings) = {
            let mut state = self.inner.state.lock();
            state.running = false;
            let failed = state
                .take_scripted(|f| matches!(f, ScriptedFault::FailTeardown))
                .is_some();
            let mut warnings = Vec::new();
            while let Some(ScriptedFault::TeardownWarning(w)) =
                state.take_scripted(|f| matches!(f, ScriptedFault::TeardownWarning(_)))
            {
                warnings.push(w);
            }
            (failed, warnings)
        };

        self.inner.recorder.record(SimEvent::Stopped {
            artifacts: options.collect_artifacts,
        });
        if failed {
            return Err(TestbedError::Failed("stop timed out".into()));
        }

        let artifacts = if options.collect_artifacts {
            let mut names = vec!["gnb.log".to_string(), "5gc.log".to_string()];
            names.extend(clients.iter().map(|c| format!("{}.log", c)));
            names
        } else {
            Vec::new()
        };

        Ok(TeardownReport {
            artifacts,
            warnings,
        })
    }
}

impl TrafficGenerator for SimulatedRan {
    type Run = SimTrafficRun;

    async fn start_traffic(
        &self,
        targets: &AttachMap,
        packet_count: u32,
    ) -> Result<Vec<SimTrafficRun>, TestbedError> {
        {
            let mut state = self.inner.state.lock();
            let call = state.traffic_calls;
            state.traffic_calls += 1;
            let scripted = state
                .take_scripted(|f| matches!(f, ScriptedFault::FailTrafficStart { call: n } if *n == call))
                .is_some();
            if scripted {
                return Err(TestbedError::Failed("traffic generator unavailable".into()));
            }
        }

        let mut runs = Vec::with_capacity(targets.len());

        for (client, info) in targets.iter() {
            let (run, fail, duration) = {
                let mut state = self.inner.state.lock();
                if !state.running {
                    return Err(TestbedError::Failed("network not running".into()));
                }
                let run = state.next_run_id;
                state.next_run_id += 1;
                let nth = {
                    let counter = state.runs_started.entry(client).or_default();
                    let nth = *counter;
                    *counter += 1;
                    nth
                };

                let scripted_fail = state
                    .take_scripted(|f| {
                        matches!(f, ScriptedFault::FailTraffic { client: c, run } if *c == client && *run == nth)
                    })
                    .is_some();
                let traffic_failure_prob = self.inner.profile.traffic_failure_prob;
                let fail = scripted_fail || state.roll(traffic_failure_prob);

                let duration = match state.take_scripted(|f| {
                    matches!(f, ScriptedFault::TrafficDuration { client: c, run, .. } if *c == client && *run == nth)
                }) {
                    Some(ScriptedFault::TrafficDuration { duration, .. }) => duration,
                    _ => self.inner.profile.packet_interval * packet_count,
                };
                (run, fail, duration)
            };

            debug!(%client, ipv4 = %info.ipv4, run, packet_count, ?duration, "sim traffic started");
            self.inner.recorder.record(SimEvent::TrafficStarted {
                client,
                run,
                packets: packet_count,
            });

            let recorder = self.inner.recorder.clone();
            let task = tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                recorder.record(SimEvent::TrafficFinished {
                    client,
                    run,
                    success: !fail,
                });
                if fail {
                    Err(TestbedError::Failed(format!(
                        "{}: packet loss on run {}",
                        client, run
                    )))
                } else {
                    Ok(TrafficReport {
                        client,
                        sent: packet_count,
                        received: packet_count,
                    })
                }
            });

            runs.push(SimTrafficRun { client, run, task });
        }

        Ok(runs)
    }

    async fn wait_traffic(&self, run: SimTrafficRun) -> Result<TrafficReport, TestbedError> {
        let SimTrafficRun { client, run, task } = run;
        let outcome = task
            .await
            .map_err(|e| TestbedError::Failed(format!("traffic task for {} aborted: {}", client, e)))?;
        self.inner.recorder.record(SimEvent::TrafficWaited { client, run });
        outcome
    }
}

impl FaultInjector for SimulatedRan {
    async fn inject_fault(&self, client: ClientHandle, duration: Duration) -> Result<(), TestbedError> {
        let cycle = {
            let mut state = self.inner.state.lock();
            if !state.attached.contains(&client) {
                return Err(TestbedError::Failed(format!("{} is not attached", client)));
            }
            let counter = state.injections.entry(client).or_default();
            let cycle = *counter;
            *counter += 1;
            cycle
        };

        self.inner
            .recorder
            .record(SimEvent::InjectionStarted { client, cycle });
        tokio::time::sleep(self.inner.profile.injection_latency.min(duration)).await;

        let outcome = {
            let mut state = self.inner.state.lock();
            let aborted = state
                .take_scripted(|f| {
                    matches!(f, ScriptedFault::AbortInjection { client: c, cycle: n } if *c == client && *n == cycle)
                })
                .is_some();
            let rejected = state
                .take_scripted(|f| {
                    matches!(f, ScriptedFault::RejectInjection { client: c, cycle: n } if *c == client && *n == cycle)
                })
                .is_some();
            let reattach = state
                .take_scripted(|f| {
                    matches!(f, ScriptedFault::Reattach { client: c, cycle: n } if *c == client && *n == cycle)
                })
                .is_some();
            let rejection_prob = self.inner.profile.rejection_prob;
            let reattach_prob = self.inner.profile.reattach_prob;

            if aborted {
                Err(TestbedError::Transient("StatusCode.ABORTED".into()))
            } else if rejected || state.roll(rejection_prob) {
                Err(TestbedError::Rejected(format!(
                    "reestablishment of {} not accepted",
                    client
                )))
            } else {
                if reattach || state.roll(reattach_prob) {
                    *state.pending_reattaches.entry(client).or_default() += 1;
                }
                Ok(())
            }
        };

        self.inner.recorder.record(SimEvent::InjectionCompleted {
            client,
            cycle,
            accepted: outcome.is_ok(),
        });
        outcome
    }
}

impl OutcomeValidator for SimulatedRan {
    async fn count_reattaches(&self, client: ClientHandle) -> Result<u32, TestbedError> {
        let count = {
            let mut state = self.inner.state.lock();
            if state
                .take_scripted(|f| matches!(f, ScriptedFault::FailReattachQuery))
                .is_some()
            {
                return Err(TestbedError::Failed("validator unreachable".into()));
            }
            state.pending_reattaches.remove(&client).unwrap_or(0)
        };
        self.inner
            .recorder
            .record(SimEvent::ReattachQueried { client, count });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use reest_core::RadioParams;

    use super::*;

    async fn started(sim: &SimulatedRan, clients: &[ClientHandle]) -> AttachMap {
        sim.apply_config(&RadioConfig::new(RadioParams::new(3, 15, 50, 0)))
            .await
            .unwrap();
        sim.start_network(clients, &[]).await.unwrap();
        sim.attach(clients).await.unwrap()
    }

    #[test]
    fn test_client_addresses() {
        assert_eq!(client_address(0), Ipv4Addr::new(10, 45, 0, 2));
        assert_eq!(client_address(300), Ipv4Addr::new(10, 45, 1, 46));
        assert_eq!(provision_clients(3), vec![ClientHandle::new(1), ClientHandle::new(2), ClientHandle::new(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bringup_requires_config() {
        let sim = SimulatedRan::new(FaultProfile::clean());
        let err = sim.start_network(&provision_clients(1), &[]).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_start_failure_fires_once() {
        let sim = SimulatedRan::with_script(FaultProfile::clean(), vec![ScriptedFault::FailStart]);
        let clients = provision_clients(2);
        sim.apply_config(&RadioConfig::new(RadioParams::new(3, 15, 50, 0)))
            .await
            .unwrap();

        let err = sim.start_network(&clients, &[]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(sim.start_network(&clients, &[]).await.is_ok());
        assert!(sim.remaining_script().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_run_lifecycle() {
        let sim = SimulatedRan::new(FaultProfile::clean());
        let clients = provision_clients(2);
        let attach = started(&sim, &clients).await;

        let runs = sim.start_traffic(&attach, 10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| !r.is_finished()));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(runs.iter().all(|r| r.is_finished()));

        for run in runs {
            let report = sim.wait_traffic(run).await.unwrap();
            assert_eq!(report.received, 10);
        }
        assert!(sim.recorder().unbalanced_waits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_traffic_failure() {
        let client = ClientHandle::new(1);
        let sim = SimulatedRan::with_script(
            FaultProfile::clean(),
            vec![ScriptedFault::FailTraffic { client, run: 1 }],
        );
        let attach = started(&sim, &[client]).await;

        let first = sim.start_traffic(&attach, 1).await.unwrap().pop().unwrap();
        assert!(sim.wait_traffic(first).await.is_ok());

        let second = sim.start_traffic(&attach, 1).await.unwrap().pop().unwrap();
        assert!(matches!(sim.wait_traffic(second).await, Err(TestbedError::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_outcomes() {
        let client = ClientHandle::new(1);
        let sim = SimulatedRan::with_script(
            FaultProfile::clean(),
            vec![
                ScriptedFault::AbortInjection { client, cycle: 0 },
                ScriptedFault::RejectInjection { client, cycle: 1 },
                ScriptedFault::Reattach { client, cycle: 2 },
            ],
        );
        started(&sim, &[client]).await;

        let interval = Duration::from_secs(10);
        assert!(matches!(sim.inject_fault(client, interval).await, Err(TestbedError::Transient(_))));
        assert!(matches!(sim.inject_fault(client, interval).await, Err(TestbedError::Rejected(_))));
        assert!(sim.inject_fault(client, interval).await.is_ok());

        assert_eq!(sim.count_reattaches(client).await.unwrap(), 1);
        assert_eq!(sim.count_reattaches(client).await.unwrap(), 0);
        assert_eq!(sim.recorder().injections_for(client), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_requires_attach() {
        let sim = SimulatedRan::new(FaultProfile::clean());
        let err = sim
            .inject_fault(ClientHandle::new(9), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TestbedError::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_outcomes() {
        async fn outcomes(seed: u64) -> Vec<bool> {
            let profile = FaultProfile {
                rejection_prob: 0.5,
                ..FaultProfile::clean().with_seed(seed)
            };
            let sim = SimulatedRan::new(profile);
            let client = ClientHandle::new(1);
            started(&sim, &[client]).await;
            let mut results = Vec::new();
            for _ in 0..20 {
                results.push(sim.inject_fault(client, Duration::from_secs(1)).await.is_ok());
            }
            results
        }

        assert_eq!(outcomes(7).await, outcomes(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_collects_artifacts_and_warnings() {
        let sim = SimulatedRan::with_script(
            FaultProfile::clean(),
            vec![ScriptedFault::TeardownWarning("late HARQ".into())],
        );
        let clients = provision_clients(2);
        started(&sim, &clients).await;

        let report = sim
            .stop(
                &clients,
                StopOptions {
                    collect_artifacts: true,
                    warnings_as_errors: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.artifacts.len(), 4);
        assert!(report.artifacts.contains(&"ue2.log".to_string()));
        assert_eq!(report.warnings, vec!["late HARQ".to_string()]);
        assert!(!sim.is_running());
        assert_eq!(sim.recorder().stopped(), Some(true));
    }
}
