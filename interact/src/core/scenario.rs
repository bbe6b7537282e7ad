//! Scenario and step model.
//!
//! A [`Scenario`] is an ordered list of [`Step`]s run against one freshly
//! spawned process. Scenarios are plain values built by the caller; nothing
//! registers them globally.

use std::fmt;
use std::sync::Arc;

/// Side effect run between exchanges (e.g. renaming a persisted file).
pub type ActionFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Named line validator.
#[derive(Clone)]
pub struct LinePredicate {
    label: String,
    check: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl LinePredicate {
    pub fn new(
        label: impl Into<String>,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, line: &str) -> bool {
        (self.check)(line)
    }
}

impl fmt::Debug for LinePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LinePredicate").field(&self.label).finish()
    }
}

/// How the response to an exchange is validated.
#[derive(Debug, Clone, Default)]
pub enum Expectation {
    /// No validation; the next prompt check resynchronizes.
    #[default]
    None,
    /// Response starts with this literal, followed by a line terminator.
    ExactPrefix(String),
    /// One full response line is handed to the predicate.
    Predicate(LinePredicate),
}

#[derive(Clone)]
pub enum Step {
    Exchange {
        command: String,
        expect: Expectation,
    },
    Action {
        label: String,
        run: ActionFn,
    },
}

impl Step {
    /// Send `command` without validating the response.
    pub fn send(command: impl Into<String>) -> Self {
        Step::Exchange {
            command: command.into(),
            expect: Expectation::None,
        }
    }

    /// Send `command` and expect the response to start with `response`.
    pub fn exchange(command: impl Into<String>, response: impl Into<String>) -> Self {
        Step::Exchange {
            command: command.into(),
            expect: Expectation::ExactPrefix(response.into()),
        }
    }

    /// Send `command` and validate the response line with `predicate`.
    pub fn check(command: impl Into<String>, predicate: LinePredicate) -> Self {
        Step::Exchange {
            command: command.into(),
            expect: Expectation::Predicate(predicate),
        }
    }

    pub fn action(
        label: impl Into<String>,
        run: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Step::Action {
            label: label.into(),
            run: Arc::new(run),
        }
    }

    /// Short human-readable description used in logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Step::Exchange { command, .. } => format!("exchange {command:?}"),
            Step::Action { label, .. } => format!("action {label}"),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Exchange { command, expect } => f
                .debug_struct("Exchange")
                .field("command", command)
                .field("expect", expect)
                .finish(),
            Step::Action { label, .. } => f.debug_struct("Action").field("label", label).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_steps(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn send(self, command: impl Into<String>) -> Self {
        self.step(Step::send(command))
    }

    pub fn exchange(self, command: impl Into<String>, response: impl Into<String>) -> Self {
        self.step(Step::exchange(command, response))
    }

    pub fn check(self, command: impl Into<String>, predicate: LinePredicate) -> Self {
        self.step(Step::check(command, predicate))
    }

    pub fn action(
        self,
        label: impl Into<String>,
        run: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.step(Step::action(label, run))
    }
}
