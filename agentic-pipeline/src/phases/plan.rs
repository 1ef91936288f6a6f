//! Plan phase: have the planner agent write an implementation spec
//! under `agentic/specs/` and record its path in workflow state.

use super::{
    acquire_state, execute_phase, output_excerpt, PhaseArgs, PhaseError, PhaseResult,
};
use crate::layout;
use crate::models::{AgentRole, ModelTier};
use crate::state::{StateUpdate, WorkflowState};
use crate::template;
use agentic_pipeline_sdk::{log_phase_complete, log_phase_failed, log_phase_start};
use anyhow::anyhow;
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};

/// Today's UTC date in the spec filename convention
pub fn today_prefix() -> String {
    Utc::now().format("%y%m%d").to_string()
}

/// Filename-convention instruction appended to every plan prompt; the
/// templates describe the task, the driver owns the output contract.
fn plan_instruction() -> String {
    format!(
        "\n\nWrite the plan to a new file at agentic/specs/{}-<descriptive-name>.md \
         and print that exact path in your final message.",
        today_prefix()
    )
}

/// Recover the plan path from planner output using ordered patterns:
/// date-prefixed spec paths first, then any spec path, then labeled
/// forms like `path: ...`. The returned path always carries the
/// `agentic/` prefix.
pub fn extract_plan_path(output: &str) -> Option<String> {
    let date_re = Regex::new(r"(?:agentic/)?specs/\d{6}-[A-Za-z0-9._-]+\.md").expect("static regex");
    let any_spec_re = Regex::new(r"(?:agentic/)?specs/[A-Za-z0-9._-]+\.md").expect("static regex");
    let labeled_re =
        Regex::new(r#"(?i)(?:path|plan|file)\s*[:=]\s*`?([A-Za-z0-9._/-]+\.md)"#)
            .expect("static regex");

    if let Some(m) = date_re.find(output) {
        return Some(normalize(m.as_str()));
    }
    if let Some(m) = any_spec_re.find(output) {
        return Some(normalize(m.as_str()));
    }
    if let Some(caps) = labeled_re.captures(output) {
        return Some(normalize(&caps[1]));
    }
    None
}

fn normalize(path: &str) -> String {
    let path = path.trim_start_matches("./");
    if path.starts_with("agentic/") {
        path.to_string()
    } else {
        format!("agentic/{}", path)
    }
}

pub async fn run(args: PhaseArgs) -> PhaseResult<WorkflowState> {
    let working_dir = args.working_dir()?;
    let mut state = acquire_state(&args, &working_dir).await?;
    let phase = AgentRole::Planner.phase_name();
    log_phase_start!(state.run_id, phase);

    if let Some(task_type) = args.r#type {
        state.apply(StateUpdate {
            task_type: Some(task_type),
            classify_reason: Some("provided via --type".to_string()),
            ..Default::default()
        });
    }
    let task_type = state.task_type.ok_or_else(|| {
        PhaseError::Config(anyhow!(
            "no task type in state: run classify first or pass --type"
        ))
    })?;

    if state.plan_file.is_some() {
        // Already planned; resuming is a no-op.
        log_phase_complete!(state.run_id, phase);
        return Ok(state);
    }

    tokio::fs::create_dir_all(layout::specs_dir(&working_dir))
        .await
        .map_err(|e| PhaseError::Config(anyhow!("failed to create specs dir: {}", e)))?;

    // The template is chosen by task type: bug.md, feature.md, ...
    let raw = template::load_template(&working_dir, task_type.as_str())
        .await
        .map_err(PhaseError::Config)?;
    let rendered = template::render(&raw, &[&state.prompt], &state.prompt) + &plan_instruction();

    let tier = args.model.unwrap_or(ModelTier::Large);
    let invocation = execute_phase(
        &working_dir,
        &state,
        AgentRole::Planner,
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

    let plan_path = extract_plan_path(&invocation.response.output).ok_or_else(|| {
        let err = PhaseError::OutputContract(anyhow!(
            "planner output contains no spec path; output starts: {}",
            output_excerpt(&invocation.response.output)
        ));
        log_phase_failed!(state.run_id, phase, err);
        err
    })?;

    if !working_dir.join(&plan_path).is_file() {
        let err = PhaseError::OutputContract(anyhow!(
            "planner reported {} but no such file exists",
            plan_path
        ));
        log_phase_failed!(state.run_id, phase, err);
        return Err(err);
    }

    let mut derived = Map::new();
    derived.insert("plan_path".to_string(), Value::from(plan_path.clone()));
    derived.insert(
        "task_type".to_string(),
        Value::from(task_type.as_str()),
    );
    invocation.write_summary(derived);

    state.apply(StateUpdate {
        plan_file: Some(plan_path),
        ..Default::default()
    });
    state.save(&working_dir).await.map_err(PhaseError::Config)?;

    log_phase_complete!(state.run_id, phase);
    Ok(state)
}
