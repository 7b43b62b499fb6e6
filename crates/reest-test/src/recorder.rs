//! Event recorder and schedule invariant checks
//!
//! The simulated RAN records every collaborator call in execution order.
//! The checks replay the log and report violations as readable strings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reest_core::ClientHandle;
use tokio::time::Instant;

/// Something the simulated testbed observed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    ConfigApplied { id: String },
    NetworkStarted { clients: usize, commands: Vec<String> },
    Attached { client: ClientHandle },
    TrafficStarted { client: ClientHandle, run: u64, packets: u32 },
    TrafficFinished { client: ClientHandle, run: u64, success: bool },
    TrafficWaited { client: ClientHandle, run: u64 },
    InjectionStarted { client: ClientHandle, cycle: u32 },
    InjectionCompleted { client: ClientHandle, cycle: u32, accepted: bool },
    ReattachQueried { client: ClientHandle, count: u32 },
    Stopped { artifacts: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Time since the recorder was created
    pub at: Duration,
    pub event: SimEvent,
}

/// Shared, append-only event log
#[derive(Clone, Debug)]
pub struct EventRecorder {
    origin: Instant,
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        EventRecorder {
            origin: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, event: SimEvent) {
        let at = self.origin.elapsed();
        self.events.lock().push(RecordedEvent { at, event });
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(&e.event)).count()
    }

    /// Accepted or not, every injection call that completed
    pub fn injections_for(&self, client: ClientHandle) -> usize {
        self.count(|e| matches!(e, SimEvent::InjectionCompleted { client: c, .. } if *c == client))
    }

    pub fn total_injections(&self) -> usize {
        self.count(|e| matches!(e, SimEvent::InjectionCompleted { .. }))
    }

    pub fn runs_started_for(&self, client: ClientHandle) -> usize {
        self.count(|e| matches!(e, SimEvent::TrafficStarted { client: c, .. } if *c == client))
    }

    pub fn waits_for(&self, client: ClientHandle) -> usize {
        self.count(|e| matches!(e, SimEvent::TrafficWaited { client: c, .. } if *c == client))
    }

    pub fn validations(&self) -> usize {
        self.count(|e| matches!(e, SimEvent::ReattachQueried { .. }))
    }

    pub fn stopped(&self) -> Option<bool> {
        self.events.lock().iter().find_map(|e| match e.event {
            SimEvent::Stopped { artifacts } => Some(artifacts),
            _ => None,
        })
    }

    /// A client never has two runs in flight at once
    pub fn overlapping_runs(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut in_flight: HashMap<ClientHandle, u64> = HashMap::new();

        for e in self.events.lock().iter() {
            match e.event {
                SimEvent::TrafficStarted { client, run, .. } => {
                    if let Some(prev) = in_flight.insert(client, run) {
                        violations.push(format!(
                            "{:?}: run {} of {} started while run {} was in flight",
                            e.at, run, client, prev
                        ));
                    }
                }
                SimEvent::TrafficFinished { client, run, .. } => {
                    if in_flight.get(&client) == Some(&run) {
                        in_flight.remove(&client);
                    }
                }
                _ => {}
            }
        }
        violations
    }

    /// The injected client has traffic in flight for the whole injection
    pub fn injections_without_traffic(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut in_flight: HashSet<ClientHandle> = HashSet::new();

        for e in self.events.lock().iter() {
            match e.event {
                SimEvent::TrafficStarted { client, .. } => {
                    in_flight.insert(client);
                }
                SimEvent::TrafficFinished { client, .. } => {
                    in_flight.remove(&client);
                }
                SimEvent::InjectionStarted { client, cycle }
                | SimEvent::InjectionCompleted { client, cycle, .. } => {
                    if !in_flight.contains(&client) {
                        violations.push(format!(
                            "{:?}: cycle {} of {} ran without traffic in flight",
                            e.at, cycle, client
                        ));
                    }
                }
                _ => {}
            }
        }
        violations
    }

    /// No validator query before every traffic run has been waited
    pub fn validation_before_traffic_done(&self) -> Vec<String> {
        let events = self.events.lock();
        let last_traffic = events.iter().rposition(|e| {
            matches!(
                e.event,
                SimEvent::TrafficWaited { .. } | SimEvent::TrafficStarted { .. }
            )
        });
        let first_query = events
            .iter()
            .position(|e| matches!(e.event, SimEvent::ReattachQueried { .. }));

        match (first_query, last_traffic) {
            (Some(q), Some(t)) if q < t => vec![format!(
                "{:?}: validator queried before traffic completed at {:?}",
                events[q].at, events[t].at
            )],
            _ => Vec::new(),
        }
    }

    /// Every started run is waited exactly once
    pub fn unbalanced_waits(&self) -> Vec<String> {
        let mut started: HashMap<u64, ClientHandle> = HashMap::new();
        let mut waited: HashMap<u64, usize> = HashMap::new();

        for e in self.events.lock().iter() {
            match e.event {
                SimEvent::TrafficStarted { client, run, .. } => {
                    started.insert(run, client);
                }
                SimEvent::TrafficWaited { run, .. } => {
                    *waited.entry(run).or_default() += 1;
                }
                _ => {}
            }
        }

        let mut violations: Vec<String> = started
            .iter()
            .filter_map(|(run, client)| match waited.get(run).copied().unwrap_or(0) {
                1 => None,
                n => Some(format!("run {} of {} waited {} times", run, client, n)),
            })
            .collect();
        violations.extend(
            waited
                .keys()
                .filter(|run| !started.contains_key(run))
                .map(|run| format!("run {} waited but never started", run)),
        );
        violations.sort();
        violations
    }

    /// All checks for a scenario that ran to completion
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = self.overlapping_runs();
        violations.extend(self.injections_without_traffic());
        violations.extend(self.validation_before_traffic_done());
        violations.extend(self.unbalanced_waits());
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(n: u64) -> ClientHandle {
        ClientHandle::new(n)
    }

    #[tokio::test]
    async fn test_clean_log_has_no_violations() {
        let recorder = EventRecorder::new();
        recorder.record(SimEvent::TrafficStarted { client: client(1), run: 0, packets: 5 });
        recorder.record(SimEvent::InjectionStarted { client: client(1), cycle: 0 });
        recorder.record(SimEvent::InjectionCompleted { client: client(1), cycle: 0, accepted: true });
        recorder.record(SimEvent::TrafficFinished { client: client(1), run: 0, success: true });
        recorder.record(SimEvent::TrafficWaited { client: client(1), run: 0 });
        recorder.record(SimEvent::ReattachQueried { client: client(1), count: 0 });

        assert!(recorder.check_invariants().is_empty());
        assert_eq!(recorder.injections_for(client(1)), 1);
        assert_eq!(recorder.waits_for(client(1)), 1);
        assert_eq!(recorder.validations(), 1);
    }

    #[tokio::test]
    async fn test_detects_overlapping_runs() {
        let recorder = EventRecorder::new();
        recorder.record(SimEvent::TrafficStarted { client: client(1), run: 0, packets: 5 });
        recorder.record(SimEvent::TrafficStarted { client: client(1), run: 1, packets: 5 });

        assert_eq!(recorder.overlapping_runs().len(), 1);
        assert_eq!(recorder.unbalanced_waits().len(), 2);
    }

    #[tokio::test]
    async fn test_detects_injection_without_traffic() {
        let recorder = EventRecorder::new();
        recorder.record(SimEvent::TrafficStarted { client: client(2), run: 0, packets: 5 });
        recorder.record(SimEvent::TrafficFinished { client: client(2), run: 0, success: true });
        recorder.record(SimEvent::InjectionStarted { client: client(2), cycle: 0 });

        assert_eq!(recorder.injections_without_traffic().len(), 1);
    }

    #[tokio::test]
    async fn test_detects_early_validation() {
        let recorder = EventRecorder::new();
        recorder.record(SimEvent::TrafficStarted { client: client(1), run: 0, packets: 5 });
        recorder.record(SimEvent::ReattachQueried { client: client(1), count: 0 });
        recorder.record(SimEvent::TrafficWaited { client: client(1), run: 0 });

        assert_eq!(recorder.validation_before_traffic_done().len(), 1);
    }
}
