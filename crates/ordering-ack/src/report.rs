//! Case and suite reports.

use chrono::{DateTime, Utc};
use feature_profile::SupportReport;
use gribi_common::Persistence;
use gribi_fluent::OpResult;
use log::warn;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::ate::FlowStats;

/// How a case ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    /// One or more checks failed; the case ran to completion.
    Failed,
    /// The case stopped early.
    Fatal { reason: String },
}

impl CaseOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseOutcome::Passed => write!(f, "PASS"),
            CaseOutcome::Failed => write!(f, "FAIL"),
            CaseOutcome::Fatal { reason } => write!(f, "FATAL ({})", reason),
        }
    }
}

/// A failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub check: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub description: String,
    pub persistence: Persistence,
    pub outcome: CaseOutcome,
    pub failures: Vec<Failure>,
    pub results: Vec<OpResult>,
    pub flows: Vec<FlowStats>,
    pub duration_ms: u64,
}

impl CaseReport {
    pub fn new(name: &str, description: &str, persistence: Persistence) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            persistence,
            outcome: CaseOutcome::Passed,
            failures: Vec::new(),
            results: Vec::new(),
            flows: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Records a failed check.
    pub fn fail(&mut self, check: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("{} [{}] {}: {}", self.name, self.persistence, check, message);
        self.failures.push(Failure {
            check: check.to_string(),
            message,
        });
    }

    /// Sets the outcome from the recorded failures, or `fatal` when the case
    /// stopped early.
    pub fn finish(&mut self, fatal: Option<String>, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.outcome = match fatal {
            Some(reason) => CaseOutcome::Fatal { reason },
            None if self.failures.is_empty() => CaseOutcome::Passed,
            None => CaseOutcome::Failed,
        };
    }

    pub fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }
}

/// All cases under one persistence mode.
#[derive(Debug, Clone, Serialize)]
pub struct PersistenceRun {
    pub persistence: Persistence,
    pub skipped: Option<String>,
    pub cases: Vec<CaseReport>,
}

impl PersistenceRun {
    pub fn is_passed(&self) -> bool {
        self.cases.iter().all(CaseReport::is_passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub runs: Vec<PersistenceRun>,
    pub profiles: Vec<SupportReport>,
}

impl Default for SuiteReport {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            runs: Vec::new(),
            profiles: Vec::new(),
        }
    }

    pub fn cases(&self) -> impl Iterator<Item = &CaseReport> {
        self.runs.iter().flat_map(|r| r.cases.iter())
    }

    /// True when every case that ran passed. Profile gaps are informational.
    pub fn is_passed(&self) -> bool {
        self.runs.iter().all(PersistenceRun::is_passed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in &self.runs {
            writeln!(f, "Persistence={}", run.persistence)?;
            if let Some(ref reason) = run.skipped {
                writeln!(f, "  SKIP: {}", reason)?;
                continue;
            }
            for case in &run.cases {
                writeln!(f, "  {:<28} {} ({} ms)", case.name, case.outcome, case.duration_ms)?;
                for failure in &case.failures {
                    writeln!(f, "    {}: {}", failure.check, failure.message)?;
                }
            }
        }
        for profile in &self.profiles {
            writeln!(
                f,
                "Profile {}: {} unsupported config, {} unsupported telemetry paths",
                profile.profile,
                profile.unsupported_config.len(),
                profile.unsupported_telemetry.len()
            )?;
        }
        let total = self.cases().count();
        let passed = self.cases().filter(|c| c.is_passed()).count();
        write!(f, "{}/{} cases passed", passed, total)
    }
}
