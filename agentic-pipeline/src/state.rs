//! Run-scoped workflow state carried between phases.
//!
//! The state file at `agentic/runs/<run_id>/state.json` is the only
//! cross-phase state. It is rewritten atomically (write to temp +
//! rename in the same directory) so concurrent readers never observe a
//! partial file.

use crate::layout;
use crate::models::TaskType;
use agentic_pipeline_sdk::log_state_saved;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classify_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_count: Option<u32>,
}

/// Fields a phase may contribute. Write-once fields (`task_type`,
/// `classify_reason`, `plan_file`) are ignored when already set; the
/// overwrite allowlist covers `build_status`, `review_status`, and
/// `repair_count`, which legitimately change across repair iterations.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub task_type: Option<TaskType>,
    pub classify_reason: Option<String>,
    pub plan_file: Option<String>,
    pub build_status: Option<String>,
    pub review_status: Option<String>,
    pub repair_count: Option<u32>,
}

impl WorkflowState {
    pub fn new(run_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            prompt: prompt.into(),
            task_type: None,
            classify_reason: None,
            plan_file: None,
            build_status: None,
            review_status: None,
            repair_count: None,
        }
    }

    /// Merge an update into the state, honoring the overwrite rules
    pub fn apply(&mut self, update: StateUpdate) {
        if self.task_type.is_none() {
            self.task_type = update.task_type;
        }
        if self.classify_reason.is_none() {
            self.classify_reason = update.classify_reason;
        }
        if self.plan_file.is_none() {
            self.plan_file = update.plan_file;
        }
        if update.build_status.is_some() {
            self.build_status = update.build_status;
        }
        if update.review_status.is_some() {
            self.review_status = update.review_status;
        }
        if update.repair_count.is_some() {
            self.repair_count = update.repair_count;
        }
    }

    /// Atomically rewrite the canonical state file for this run
    pub async fn save(&self, working_dir: &Path) -> Result<()> {
        let run_dir = layout::run_dir(working_dir, &self.run_id);
        tokio::fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("failed to create {}", run_dir.display()))?;

        let target = run_dir.join(layout::STATE_FILE);
        // Temp file in the same directory so the rename stays on one
        // filesystem and is atomic on POSIX.
        let temp = run_dir.join(format!("{}.tmp-{}", layout::STATE_FILE, std::process::id()));
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&temp, &json)
            .await
            .with_context(|| format!("failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &target)
            .await
            .with_context(|| format!("failed to move state into {}", target.display()))?;

        log_state_saved!(self.run_id, target.display());
        Ok(())
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state file {}", path.display()))
    }

    pub async fn load(working_dir: &Path, run_id: &str) -> Result<Self> {
        Self::from_file(&layout::state_path(working_dir, run_id)).await
    }

    /// Final stdout emission: exactly one JSON line when piped so
    /// `plan | build` composes, a readable block on a terminal.
    pub fn to_stdout(&self) -> Result<()> {
        if std::io::stdout().is_terminal() {
            println!("\n{}", "=".repeat(80));
            println!("Run {} state", self.run_id);
            println!("{}", "=".repeat(80));
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            println!("{}", serde_json::to_string(self)?);
        }
        Ok(())
    }
}
