//! Suite runner
//!
//! Runs every scenario of a matrix against a fresh testbed, reruns
//! scenarios that failed for transient environment reasons, and
//! summarises the outcome.

use reest_core::{ClientHandle, ScenarioConfig};
use tracing::{info, warn};

use crate::collab::Testbed;
use crate::orchestrator::{Orchestrator, RunOptions, ScenarioRun};
use crate::timer::Timer;

/// Reruns granted to a scenario that failed with a retryable error
pub const DEFAULT_MAX_RERUNS: u32 = 2;

/// Final report for one scenario
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub id: String,
    /// Number of runs, including reruns
    pub attempts: u32,
    /// The last run
    pub run: ScenarioRun,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.run.passed()
    }
}

/// Runs a list of scenarios, one testbed per attempt
pub struct SuiteRunner {
    scenarios: Vec<ScenarioConfig>,
    options: RunOptions,
    max_reruns: u32,
    results: Vec<ScenarioReport>,
}

impl SuiteRunner {
    pub fn new(options: RunOptions) -> Self {
        SuiteRunner {
            scenarios: Vec::new(),
            options,
            max_reruns: DEFAULT_MAX_RERUNS,
            results: Vec::new(),
        }
    }

    pub fn with_max_reruns(mut self, max_reruns: u32) -> Self {
        self.max_reruns = max_reruns;
        self
    }

    pub fn add_scenario(&mut self, scenario: ScenarioConfig) {
        self.scenarios.push(scenario);
    }

    pub fn add_scenarios<I>(&mut self, scenarios: I)
    where
        I: IntoIterator<Item = ScenarioConfig>,
    {
        self.scenarios.extend(scenarios);
    }

    pub fn scenarios(&self) -> &[ScenarioConfig] {
        &self.scenarios
    }

    /// Run every scenario in order.
    ///
    /// `make_testbed` is called once per attempt with the scenario and the
    /// zero-based attempt number; attempts never share a testbed.
    pub async fn run_all<B, T, F>(
        &mut self,
        clients: &[ClientHandle],
        timer: T,
        mut make_testbed: F,
    ) -> &[ScenarioReport]
    where
        B: Testbed,
        T: Timer + Clone,
        F: FnMut(&ScenarioConfig, u32) -> B,
    {
        self.results.clear();

        for scenario in &self.scenarios {
            let mut attempt = 0;
            let run = loop {
                let testbed = make_testbed(scenario, attempt);
                let orchestrator = Orchestrator::with_timer(testbed, timer.clone())
                    .with_options(self.options.clone());
                let run = orchestrator.run(scenario, clients).await;
                attempt += 1;

                let retry = run.error().is_some_and(|err| err.is_retryable()) && attempt <= self.max_reruns;
                if !retry {
                    break run;
                }
                if let Some(err) = run.error() {
                    warn!(scenario = %scenario.id(), attempt, %err, "rerunning scenario after transient failure");
                }
            };

            info!(scenario = %scenario.id(), passed = run.passed(), attempts = attempt, "scenario finished");
            self.results.push(ScenarioReport {
                id: scenario.id().to_string(),
                attempts: attempt,
                run,
            });
        }

        &self.results
    }

    pub fn results(&self) -> &[ScenarioReport] {
        &self.results
    }

    pub fn summary(&self) -> SuiteSummary {
        let total = self.results.len();
        let passed = self.results.iter().filter(|r| r.passed()).count();
        let failures = self
            .results
            .iter()
            .filter_map(|r| r.run.error().map(|e| (r.id.clone(), e.to_string())))
            .collect();

        SuiteSummary {
            total,
            passed,
            failed: total - passed,
            reruns: self.results.iter().map(|r| r.attempts.saturating_sub(1)).sum(),
            failures,
        }
    }
}

/// Summary of a suite run
#[derive(Clone, Debug, Default)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub reruns: u32,
    /// `(scenario id, error)` for each failed scenario
    pub failures: Vec<(String, String)>,
}

impl SuiteSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn pass_rate(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f32 / self.total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let runner = SuiteRunner::new(RunOptions::default());
        let summary = runner.summary();
        assert_eq!(summary.total, 0);
        assert!(summary.all_passed());
        assert_eq!(summary.pass_rate(), 1.0);
    }

    #[test]
    fn test_runner_builder() {
        let runner = SuiteRunner::new(RunOptions::default()).with_max_reruns(0);
        assert_eq!(runner.max_reruns, 0);
        assert!(runner.scenarios().is_empty());
    }
}
