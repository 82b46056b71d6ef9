//! JSON exporter for scenario runs.
//!
//! Writes the results of a run, including every recorded app call, so a run
//! can be diffed against another seed or start instant.

use crate::runner::ScenarioResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Summary counts across all results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Seed used
    pub seed: u64,

    /// Per-scenario results
    pub results: Vec<ScenarioResult>,

    /// Pass/fail counts
    pub summary: RunSummary,
}

impl RunReport {
    /// Creates an empty report.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            results: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Adds a result and updates the summary.
    pub fn add_result(&mut self, result: ScenarioResult) {
        self.summary.total += 1;
        if result.passed {
            self.summary.passed += 1;
        } else {
            self.summary.failed += 1;
        }
        self.results.push(result);
    }

    /// Returns true if every result passed.
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
