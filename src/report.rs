//! Run report types

use crate::flow::StepAction;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Result of executing a single step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Step number (1-indexed)
    pub step: usize,

    pub action: StepAction,

    pub status: StepStatus,

    /// How long the step took, including any recovery
    pub duration: Duration,

    /// Navigation URL for `goto`, literal selector for `click`/`fill`
    pub target: String,

    /// Selector that replaced `target` (if the step was healed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healed_selector: Option<String>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Literal selector or navigation worked
    Passed,
    /// Literal selector failed, a fallback selector worked and was written back
    Healed,
    /// Step left unresolved
    Failed,
}

/// Complete report of a flow run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// RFC 3339 timestamp of the run start
    pub started_at: String,

    pub total_steps: usize,

    pub passed: usize,

    pub healed: usize,

    pub failed: usize,

    pub total_duration: Duration,

    /// True iff at least one step's `query` was overwritten
    pub corrected: bool,

    pub results: Vec<StepResult>,
}

impl RunReport {
    pub fn new(total_steps: usize) -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            total_steps,
            passed: 0,
            healed: 0,
            failed: 0,
            total_duration: Duration::from_secs(0),
            corrected: false,
            results: Vec::with_capacity(total_steps),
        }
    }

    /// Add a step result and update counters
    pub fn add_result(&mut self, result: StepResult) {
        self.total_duration += result.duration;

        match result.status {
            StepStatus::Passed => self.passed += 1,
            StepStatus::Healed => {
                self.healed += 1;
                self.corrected = true;
            }
            StepStatus::Failed => self.failed += 1,
        }

        self.results.push(result);
    }

    /// True when no step was left unresolved
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
    }

    /// Write the report to `path` as pretty-printed JSON
    pub async fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}
