//! Post-processing of the raw event stream into durable artifacts.
//!
//! All three derived artifacts are built from `cli_raw_output.jsonl`
//! only, and every write here is best-effort: a failure must not mask
//! the underlying CLI outcome, so callers go through [`finalize`] /
//! [`write_summary`] which warn instead of propagating.

use crate::events;
use crate::layout::{FINAL_OBJECT_JSON, RAW_OUTPUT_JSON, RAW_OUTPUT_JSONL, SUMMARY_JSON};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Phase-scoped summary document written beside the raw stream
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub run_id: String,
    pub cli: String,
    pub model_tier: String,
    pub prompt: String,
    pub success: bool,
    /// Phase-specific derived fields (`task_type`, `plan_path`, ...)
    #[serde(flatten)]
    pub derived: Map<String, Value>,
    /// Raw output string from the terminal event
    pub output: String,
}

fn jsonl_to_json_array(phase_dir: &Path) -> Result<()> {
    let source = phase_dir.join(RAW_OUTPUT_JSONL);
    let parsed = events::parse_events(&source);
    let target = phase_dir.join(RAW_OUTPUT_JSON);
    let json = serde_json::to_vec_pretty(&parsed.events)?;
    std::fs::write(&target, json).with_context(|| format!("writing {}", target.display()))?;
    Ok(())
}

fn extract_terminal(phase_dir: &Path) -> Result<()> {
    let source = phase_dir.join(RAW_OUTPUT_JSONL);
    let parsed = events::parse_events(&source);

    // The standalone object is the last raw `result` event, untouched.
    let terminal = parsed
        .events
        .iter()
        .rev()
        .find(|e| e.get("type").and_then(Value::as_str) == Some("result"));
    let Some(terminal) = terminal else {
        return Ok(());
    };

    let target = phase_dir.join(FINAL_OBJECT_JSON);
    let json = serde_json::to_vec_pretty(terminal)?;
    std::fs::write(&target, json).with_context(|| format!("writing {}", target.display()))?;
    Ok(())
}

/// Build `cli_raw_output.json` and `cli_final_object.json` from the
/// phase's raw stream. Never fails.
pub fn finalize(phase_dir: &Path) {
    if let Err(e) = jsonl_to_json_array(phase_dir) {
        eprintln!("Warning: failed to write event array: {:#}", e);
    }
    if let Err(e) = extract_terminal(phase_dir) {
        eprintln!("Warning: failed to write terminal event: {:#}", e);
    }
}

/// Write `cli_summary_output.json` for the phase. Never fails.
pub fn write_summary(phase_dir: &Path, summary: &PhaseSummary) {
    let target = phase_dir.join(SUMMARY_JSON);
    let result = serde_json::to_vec_pretty(summary)
        .map_err(anyhow::Error::from)
        .and_then(|json| {
            std::fs::write(&target, json)
                .with_context(|| format!("writing {}", target.display()))
        });
    if let Err(e) = result {
        eprintln!("Warning: failed to write phase summary: {:#}", e);
    }
}
