//! Ordered step list with declared dependencies and per-step failure policy.
//!
//! Steps run strictly in registration order. A step may name earlier steps it
//! relies on; the list is checked before anything runs so a misordered
//! registration or a `--skip` that removes a prerequisite fails up front.
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// What happens to the run when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and report the error.
    Abort,
    /// Log the error and go on with the next step.
    Continue,
}

pub type StepAction<C> = fn(&mut C) -> Result<()>;

pub struct Step<C> {
    pub name: &'static str,
    pub description: &'static str,
    pub requires: &'static [&'static str],
    pub policy: FailurePolicy,
    pub action: StepAction<C>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub name: &'static str,
    pub description: &'static str,
    pub policy: FailurePolicy,
    pub requires: Vec<&'static str>,
    pub skipped: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<&'static str>,
    /// Steps that failed under [`FailurePolicy::Continue`].
    pub tolerated: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

pub struct TaskList<C> {
    steps: Vec<Step<C>>,
}

impl<C> Default for TaskList<C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<C> TaskList<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: Step<C>) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    /// Check names, ordering and skips without running anything.
    pub fn validate(&self, skipped: &BTreeSet<String>) -> Result<()> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for step in &self.steps {
            for required in step.requires {
                if !seen.contains(required) {
                    return Err(anyhow!(
                        "step {} requires {required}, which is not registered before it",
                        step.name
                    ));
                }
                if skipped.contains(*required) && !skipped.contains(step.name) {
                    return Err(anyhow!(
                        "cannot skip {required}: step {} requires it (skip both or neither)",
                        step.name
                    ));
                }
            }
            if !seen.insert(step.name) {
                return Err(anyhow!("step {} is registered twice", step.name));
            }
        }
        let unknown: Vec<&str> = skipped
            .iter()
            .map(String::as_str)
            .filter(|name| !seen.contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(anyhow!(
                "unknown step(s) to skip: {} (known: {})",
                unknown.join(", "),
                self.names().join(", ")
            ));
        }
        Ok(())
    }

    pub fn plan(&self, skipped: &BTreeSet<String>) -> Vec<PlannedStep> {
        self.steps
            .iter()
            .map(|step| PlannedStep {
                name: step.name,
                description: step.description,
                policy: step.policy,
                requires: step.requires.to_vec(),
                skipped: skipped.contains(step.name),
            })
            .collect()
    }

    /// Validate, then run every step that is not skipped, in order.
    pub fn run(&self, context: &mut C, skipped: &BTreeSet<String>) -> Result<RunReport> {
        self.validate(skipped)?;
        let mut report = RunReport::default();
        for step in &self.steps {
            if skipped.contains(step.name) {
                tracing::info!(step = step.name, "step skipped");
                report.skipped.push(step.name);
                continue;
            }
            tracing::info!(step = step.name, "step started");
            match ((step.action)(context), step.policy) {
                (Ok(()), _) => {
                    tracing::info!(step = step.name, "step finished");
                    report.completed.push(step.name);
                }
                (Err(err), FailurePolicy::Continue) => {
                    tracing::error!(
                        step = step.name,
                        error = %format!("{err:#}"),
                        "step failed; continuing"
                    );
                    report.tolerated.push(step.name);
                }
                (Err(err), FailurePolicy::Abort) => {
                    return Err(err.context(format!("step {} failed", step.name)));
                }
            }
        }
        Ok(report)
    }
}
