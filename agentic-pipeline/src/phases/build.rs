//! Build phase: implement the plan produced by the planner.

use super::{acquire_state, execute_phase, PhaseArgs, PhaseError, PhaseResult};
use crate::models::{AgentRole, ModelTier};
use crate::state::{StateUpdate, WorkflowState};
use crate::template;
use agentic_pipeline_sdk::{log_phase_complete, log_phase_failed, log_phase_start};
use anyhow::anyhow;
use serde_json::{Map, Value};

const TEMPLATE: &str = "build";

pub async fn run(args: PhaseArgs) -> PhaseResult<WorkflowState> {
    let working_dir = args.working_dir()?;
    let mut state = acquire_state(&args, &working_dir).await?;
    let phase = AgentRole::Builder.phase_name();
    log_phase_start!(state.run_id, phase);

    // Pipeline violation: building without an existing plan.
    let plan_file = state.plan_file.clone().ok_or_else(|| {
        PhaseError::Config(anyhow!("no plan_file in state: run plan first"))
    })?;
    if !working_dir.join(&plan_file).is_file() {
        return Err(PhaseError::Config(anyhow!(
            "plan file {} does not exist under {}",
            plan_file,
            working_dir.display()
        )));
    }

    let raw = template::load_template(&working_dir, TEMPLATE)
        .await
        .map_err(PhaseError::Config)?;
    let rendered = template::render(&raw, &[&plan_file], &state.prompt);

    let tier = args.model.unwrap_or(ModelTier::Large);
    let invocation = execute_phase(
        &working_dir,
        &state,
        AgentRole::Builder,
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

    let mut derived = Map::new();
    derived.insert("build_status".to_string(), Value::from("success"));
    derived.insert("plan_path".to_string(), Value::from(plan_file));
    invocation.write_summary(derived);

    state.apply(StateUpdate {
        build_status: Some("success".to_string()),
        ..Default::default()
    });
    state.save(&working_dir).await.map_err(PhaseError::Config)?;

    log_phase_complete!(state.run_id, phase);
    Ok(state)
}
