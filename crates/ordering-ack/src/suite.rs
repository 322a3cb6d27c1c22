//! Runs the cases under each persistence mode.

use feature_profile::{ProfileRegistry, SupportReport};
use gribi_common::Persistence;
use log::{error, info, warn};

use crate::cases::{run_case, Case};
use crate::config::SuiteConfig;
use crate::error::{Result, SuiteError};
use crate::report::{CaseReport, PersistenceRun, SuiteReport};
use crate::testbed::Testbed;

/// Both persistence modes, in run order.
pub const ALL_PERSISTENCE: [Persistence; 2] = [Persistence::Preserve, Persistence::Delete];

pub struct Suite {
    config: SuiteConfig,
    testbed: Testbed,
}

impl Suite {
    /// Validates the configuration and sets up the testbed.
    pub fn new(config: SuiteConfig) -> Result<Self> {
        config.validate()?;
        let testbed = Testbed::new(&config)?;
        Ok(Self { config, testbed })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn testbed(&self) -> &Testbed {
        &self.testbed
    }

    /// Runs every case once per mode in `modes`.
    pub async fn run(&mut self, modes: &[Persistence]) -> SuiteReport {
        let mut report = SuiteReport::new();
        for &persistence in modes {
            report.runs.push(self.run_persistence(persistence).await);
        }
        info!(
            "Suite: {} of {} cases passed",
            report.cases().filter(|c| c.is_passed()).count(),
            report.cases().count()
        );
        report
    }

    pub async fn run_persistence(&mut self, persistence: Persistence) -> PersistenceRun {
        if persistence == Persistence::Delete && self.config.deviations.gribi_preserve_only {
            let reason = "Skipping due to gribi_preserve_only deviation".to_string();
            warn!("Persistence={}: {}", persistence, reason);
            return PersistenceRun {
                persistence,
                skipped: Some(reason),
                cases: Vec::new(),
            };
        }

        info!("Persistence={}", persistence);
        let mut cases = Vec::with_capacity(Case::ALL.len());
        for case in Case::ALL {
            cases.push(self.run_case(persistence, case).await);
        }
        PersistenceRun {
            persistence,
            skipped: None,
            cases,
        }
    }

    pub async fn run_case(&mut self, persistence: Persistence, case: Case) -> CaseReport {
        run_case(&mut self.testbed, &self.config, persistence, case).await
    }

    /// Checks every loaded profile resolves, then reports which of their
    /// paths the DUT does not implement.
    pub fn check_profiles(&self, registry: &ProfileRegistry) -> Result<Vec<SupportReport>> {
        let mut problems = registry.check();
        for problem in &problems {
            error!("Suite: {}", problem);
        }
        if !problems.is_empty() {
            return Err(SuiteError::Profile(problems.remove(0)));
        }

        let supported = self.testbed.dut.supported_paths();
        let reports: Vec<SupportReport> = registry
            .ids()
            .filter_map(|id| registry.get(id))
            .map(|profile| profile.check_support(&supported))
            .collect();
        for report in &reports {
            info!(
                "Suite: profile {} fully supported: {}",
                report.profile,
                report.is_fully_supported()
            );
        }
        Ok(reports)
    }
}
