//! Repair phase: address reviewer findings, bounded by a repair cap so
//! a stuck run cannot loop forever.

use super::{
    acquire_state, execute_phase, PhaseArgs, PhaseError, PhaseResult, DEFAULT_MAX_REPAIRS,
};
use crate::models::{AgentRole, ModelTier};
use crate::state::{StateUpdate, WorkflowState};
use crate::template;
use agentic_pipeline_sdk::{log_phase_complete, log_phase_failed, log_phase_start};
use anyhow::anyhow;
use serde_json::{Map, Value};

const TEMPLATE: &str = "repair";

/// Compute the next repair iteration, or `None` once the cap is hit
pub fn next_iteration(current: Option<u32>, cap: u32) -> Option<u32> {
    let next = current.unwrap_or(0) + 1;
    (next <= cap).then_some(next)
}

pub async fn run(args: PhaseArgs, max_repairs: Option<u32>) -> PhaseResult<WorkflowState> {
    let working_dir = args.working_dir()?;
    let mut state = acquire_state(&args, &working_dir).await?;
    let phase = AgentRole::Repairer.phase_name();
    log_phase_start!(state.run_id, phase);

    let plan_file = state.plan_file.clone().ok_or_else(|| {
        PhaseError::Config(anyhow!("no plan_file in state: run plan first"))
    })?;

    let cap = max_repairs.unwrap_or(DEFAULT_MAX_REPAIRS);
    let next_count = next_iteration(state.repair_count, cap).ok_or_else(|| {
        PhaseError::Config(anyhow!(
            "repair cap reached ({} of {}): giving up on run {}",
            state.repair_count.unwrap_or(0),
            cap,
            state.run_id
        ))
    })?;

    let raw = template::load_template(&working_dir, TEMPLATE)
        .await
        .map_err(PhaseError::Config)?;
    let rendered = template::render(&raw, &[&plan_file], &state.prompt);

    let tier = args.model.unwrap_or(ModelTier::Large);
    let invocation = execute_phase(
        &working_dir,
        &state,
        AgentRole::Repairer,
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
    derived.insert("repair_count".to_string(), Value::from(next_count));
    invocation.write_summary(derived);

    state.apply(StateUpdate {
        repair_count: Some(next_count),
        // The build must be re-reviewed after a repair.
        review_status: Some("pending".to_string()),
        ..Default::default()
    });
    state.save(&working_dir).await.map_err(PhaseError::Config)?;

    log_phase_complete!(state.run_id, phase);
    Ok(state)
}
