//! Classify phase: decide whether the prompt describes a bug, feature,
//! chore, or refactor.
//!
//! The classifier is asked for a small JSON object, but LLM output
//! drifts, so extraction runs three strategies in order: a whole-output
//! JSON parse, a regex for an embedded object carrying a known type,
//! and finally a loose scan that recovers just the type word.

use super::{
    acquire_state, execute_phase, output_excerpt, PhaseArgs, PhaseError, PhaseResult,
};
use crate::models::{AgentRole, ModelTier, TaskType};
use crate::state::{StateUpdate, WorkflowState};
use crate::template;
use agentic_pipeline_sdk::{log_phase_complete, log_phase_failed, log_phase_start};
use anyhow::anyhow;
use regex::Regex;
use serde_json::{Map, Value};

const TEMPLATE: &str = "classify";

/// Classification recovered from classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub task_type: TaskType,
    pub reason: String,
}

fn from_json_object(value: &Value) -> Option<Classification> {
    let task_type = TaskType::parse(value.get("type")?.as_str()?)?;
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("classified")
        .to_string();
    Some(Classification { task_type, reason })
}

/// Three-strategy extraction; `None` means the output contract is
/// violated.
pub fn extract_classification(output: &str) -> Option<Classification> {
    // Strategy 1: the whole output is the JSON object.
    if let Ok(value) = serde_json::from_str::<Value>(output.trim()) {
        if let Some(c) = from_json_object(&value) {
            return Some(c);
        }
    }

    // Strategy 2: a JSON object with a known type is embedded in prose.
    let object_re =
        Regex::new(r#"\{[^{}]*"type"\s*:\s*"(?:bug|feature|chore|refactor)"[^{}]*\}"#)
            .expect("static regex");
    if let Some(m) = object_re.find(output) {
        if let Ok(value) = serde_json::from_str::<Value>(m.as_str()) {
            if let Some(c) = from_json_object(&value) {
                return Some(c);
            }
        }
    }

    // Strategy 3: recover just the type word from free-form text, e.g.
    // `The type is "bug".`
    let loose_re = Regex::new(r#"(?i)"?type"?\s*(?:is|:|=)?\s*"?(bug|feature|chore|refactor)"?"#)
        .expect("static regex");
    if let Some(caps) = loose_re.captures(output) {
        let task_type = TaskType::parse(&caps[1])?;
        return Some(Classification {
            task_type,
            reason: "extracted from output".to_string(),
        });
    }

    None
}

pub async fn run(args: PhaseArgs) -> PhaseResult<WorkflowState> {
    let working_dir = args.working_dir()?;
    let mut state = acquire_state(&args, &working_dir).await?;
    let phase = AgentRole::Classifier.phase_name();
    log_phase_start!(state.run_id, phase);

    // --type short-circuits the classifier entirely.
    if let Some(task_type) = args.r#type {
        state.apply(StateUpdate {
            task_type: Some(task_type),
            classify_reason: Some("provided via --type".to_string()),
            ..Default::default()
        });
        state.save(&working_dir).await.map_err(PhaseError::Config)?;
        log_phase_complete!(state.run_id, phase);
        return Ok(state);
    }

    if state.task_type.is_some() {
        // Already classified; resuming is a no-op.
        log_phase_complete!(state.run_id, phase);
        return Ok(state);
    }

    let raw = template::load_template(&working_dir, TEMPLATE)
        .await
        .map_err(PhaseError::Config)?;
    let rendered = template::render(&raw, &[&state.prompt], &state.prompt);

    let tier = args.model.unwrap_or(ModelTier::Small);
    let invocation = execute_phase(
        &working_dir,
        &state,
        AgentRole::Classifier,
        args.cli,
        tier,
        args.timeout,
        rendered,
    )
    .await
    .map_err(|e| {
        log_phase_failed!(state.run_id, phase, e);
        e
    })?;

    let classification = extract_classification(&invocation.response.output).ok_or_else(|| {
        let err = PhaseError::OutputContract(anyhow!(
            "classifier output matched no extraction strategy; output starts: {}",
            output_excerpt(&invocation.response.output)
        ));
        log_phase_failed!(state.run_id, phase, err);
        err
    })?;

    let mut derived = Map::new();
    derived.insert(
        "task_type".to_string(),
        Value::from(classification.task_type.as_str()),
    );
    derived.insert(
        "classify_reason".to_string(),
        Value::from(classification.reason.clone()),
    );
    invocation.write_summary(derived);

    state.apply(StateUpdate {
        task_type: Some(classification.task_type),
        classify_reason: Some(classification.reason),
        ..Default::default()
    });
    state.save(&working_dir).await.map_err(PhaseError::Config)?;

    log_phase_complete!(state.run_id, phase);
    Ok(state)
}
