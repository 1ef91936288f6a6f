//! Canonical on-disk layout under the working directory.
//!
//! ```text
//! agentic/
//!   commands/                  prompt templates
//!   runs/<run_id>/
//!     state.json
//!     <agent_name>/
//!       cli_raw_output.jsonl
//!       cli_raw_output.json
//!       cli_final_object.json
//!       cli_summary_output.json
//!   specs/<YYMMDD>-<name>.md   plan artifacts
//! ```

use crate::models::AgentRole;
use std::path::{Path, PathBuf};

pub const COMMANDS_DIR: &str = "agentic/commands";
pub const RUNS_ROOT: &str = "agentic/runs";
pub const SPECS_DIR: &str = "agentic/specs";

pub const STATE_FILE: &str = "state.json";
pub const RAW_OUTPUT_JSONL: &str = "cli_raw_output.jsonl";
pub const RAW_OUTPUT_JSON: &str = "cli_raw_output.json";
pub const FINAL_OBJECT_JSON: &str = "cli_final_object.json";
pub const SUMMARY_JSON: &str = "cli_summary_output.json";

/// Prompt provenance capture, written beside the event stream when the
/// prompt is a slash command.
pub const PROMPT_CAPTURE: &str = "prompt.txt";

pub fn commands_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(COMMANDS_DIR)
}

pub fn template_path(working_dir: &Path, name: &str) -> PathBuf {
    commands_dir(working_dir).join(format!("{}.md", name))
}

pub fn run_dir(working_dir: &Path, run_id: &str) -> PathBuf {
    working_dir.join(RUNS_ROOT).join(run_id)
}

pub fn state_path(working_dir: &Path, run_id: &str) -> PathBuf {
    run_dir(working_dir, run_id).join(STATE_FILE)
}

pub fn phase_dir(working_dir: &Path, run_id: &str, role: AgentRole) -> PathBuf {
    run_dir(working_dir, run_id).join(role.as_str())
}

pub fn raw_output_path(working_dir: &Path, run_id: &str, role: AgentRole) -> PathBuf {
    phase_dir(working_dir, run_id, role).join(RAW_OUTPUT_JSONL)
}

pub fn specs_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(SPECS_DIR)
}
