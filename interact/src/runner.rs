//! Scenario runner.
//!
//! Each scenario gets a freshly spawned process. The first failing step ends
//! that scenario only; the runner then continues with the next one. A
//! non-zero exit after a completed drain is the one failure that stops the
//! whole run.

use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::scenario::{Expectation, Scenario, Step};
use crate::core::types::ScenarioPhase;
use crate::error::HarnessError;
use crate::interactor::{Interactor, InteractorConfig};
use crate::io::config::DEFAULT_PROMPT;
use crate::io::transcript::Transcript;

pub const LINE_TERMINATOR: &str = "\n";

/// Step number used when the process could not be spawned.
pub const SPAWN_STEP: usize = 0;

#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: InteractorConfig,
    prompt: String,
    filter: Option<String>,
    fail_fast: bool,
}

/// Why a scenario stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioFailure {
    /// 1-based step number; `steps.len() + 1` is the final prompt check and
    /// [`SPAWN_STEP`] a spawn failure.
    pub step: usize,
    pub step_description: String,
    pub cause: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed(ScenarioFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Passed)
    }

    pub fn phase(&self) -> ScenarioPhase {
        match self.status {
            ScenarioStatus::Passed => ScenarioPhase::Passed,
            ScenarioStatus::Failed(_) => ScenarioPhase::Failed,
        }
    }

    pub fn failure(&self) -> Option<&ScenarioFailure> {
        match &self.status {
            ScenarioStatus::Passed => None,
            ScenarioStatus::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|result| result.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// True when every executed scenario passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }
}

struct StepFailure {
    step: usize,
    description: String,
    error: HarnessError,
}

impl ScenarioRunner {
    pub fn new(config: InteractorConfig) -> Self {
        Self {
            config,
            prompt: DEFAULT_PROMPT.to_string(),
            filter: None,
            fail_fast: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Only run scenarios whose name contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Stop after the first failed scenario instead of continuing.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn selects(&self, scenario: &Scenario) -> bool {
        match &self.filter {
            Some(filter) => scenario.name.contains(filter.as_str()),
            None => true,
        }
    }

    pub fn run(&self, scenarios: &[Scenario]) -> Result<RunReport> {
        self.run_with(scenarios, |_| {})
    }

    /// Run scenarios in order, calling `on_result` after each one.
    ///
    /// Returns `Err` only for failures that end the run; scenario failures
    /// are recorded in the report.
    pub fn run_with<F: FnMut(&ScenarioResult)>(
        &self,
        scenarios: &[Scenario],
        mut on_result: F,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        for scenario in scenarios.iter().filter(|scenario| self.selects(scenario)) {
            let result = self.run_scenario(scenario)?;
            on_result(&result);
            let failed = !result.passed();
            report.results.push(result);
            if failed && self.fail_fast {
                warn!(scenario = %scenario.name, "stopping after first failed scenario");
                break;
            }
        }
        info!(
            passed = report.passed(),
            failed = report.failed(),
            "run finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(scenario = %scenario.name, steps = scenario.steps.len()))]
    pub fn run_scenario(&self, scenario: &Scenario) -> Result<ScenarioResult> {
        let started = Instant::now();
        debug!(phase = ?ScenarioPhase::Running, "scenario started");

        let outcome = match Interactor::spawn(&self.config) {
            Ok(mut interactor) => {
                let outcome = self
                    .drive(&mut interactor, scenario)
                    .map_err(|failure| (failure, interactor.transcript().clone()));
                // Dropping the interactor kills the process before the result
                // is reported.
                drop(interactor);
                outcome
            }
            Err(error) => Err((
                StepFailure {
                    step: SPAWN_STEP,
                    description: "spawn".to_string(),
                    error,
                },
                Transcript::new(),
            )),
        };

        let status = match outcome {
            Ok(()) => ScenarioStatus::Passed,
            Err((failure, _)) if failure.error.is_fatal() => {
                return Err(anyhow::Error::new(failure.error).context(format!(
                    "scenario {:?} step {} ({})",
                    scenario.name, failure.step, failure.description
                )));
            }
            Err((failure, transcript)) => {
                ScenarioStatus::Failed(ScenarioFailure::new(failure, &transcript))
            }
        };

        let result = ScenarioResult {
            name: scenario.name.clone(),
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        match result.failure() {
            None => info!(phase = ?result.phase(), "scenario passed"),
            Some(failure) => warn!(
                phase = ?result.phase(),
                step = failure.step,
                cause = %failure.cause,
                "scenario failed"
            ),
        }
        Ok(result)
    }

    fn drive(&self, interactor: &mut Interactor, scenario: &Scenario) -> Result<(), StepFailure> {
        for (index, step) in scenario.steps.iter().enumerate() {
            let number = index + 1;
            debug!(step = number, what = %step.describe(), "running step");
            self.run_step(interactor, step).map_err(|error| StepFailure {
                step: number,
                description: step.describe(),
                error,
            })?;
        }
        interactor.expect(&self.prompt).map_err(|error| StepFailure {
            step: scenario.steps.len() + 1,
            description: "final prompt".to_string(),
            error,
        })
    }

    fn run_step(&self, interactor: &mut Interactor, step: &Step) -> Result<(), HarnessError> {
        match step {
            // Harness errors raised inside an action keep their type so a
            // fatal one still ends the run.
            Step::Action { label, run } => run().map_err(|err| {
                err.downcast::<HarnessError>()
                    .unwrap_or_else(|err| HarnessError::Action {
                        label: label.clone(),
                        message: format!("{err:#}"),
                    })
            }),
            Step::Exchange { command, expect } => {
                interactor.expect(&self.prompt)?;
                interactor.write(&format!("{command}{LINE_TERMINATOR}"))?;
                match expect {
                    Expectation::None => Ok(()),
                    Expectation::ExactPrefix(literal) => {
                        interactor.expect(literal)?;
                        interactor.expect(LINE_TERMINATOR)
                    }
                    Expectation::Predicate(predicate) => {
                        let line = interactor.getline(LINE_TERMINATOR)?;
                        if predicate.matches(&line) {
                            Ok(())
                        } else {
                            Err(HarnessError::PredicateFailed {
                                label: predicate.label().to_string(),
                                line,
                            })
                        }
                    }
                }
            }
        }
    }
}

impl ScenarioFailure {
    fn new(failure: StepFailure, transcript: &Transcript) -> Self {
        let (expected, actual) = match &failure.error {
            HarnessError::Mismatch {
                expected, actual, ..
            } => (Some(expected.clone()), Some(actual.clone())),
            HarnessError::PredicateFailed { label, line } => {
                (Some(label.clone()), Some(line.clone()))
            }
            _ => (None, None),
        };
        Self {
            step: failure.step,
            step_description: failure.description,
            cause: failure.error.to_string(),
            expected,
            actual,
            transcript: transcript.render(),
        }
    }
}
