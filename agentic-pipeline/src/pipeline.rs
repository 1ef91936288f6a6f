//! Full-pipeline composer: classify, plan, build, review, and the
//! bounded repair loop, run in-process in sequence.
//!
//! Each phase persists its result to the run's state file, so the
//! composer only threads the run id through and decides what to skip.
//! The same composition is available from a shell by piping the phase
//! binaries together; this module exists so `pipeline "prompt"` works
//! as a single command.

use crate::adapter;
use crate::phases::{
    build, classify, plan, repair, review, PhaseArgs, PhaseError, PhaseResult,
    DEFAULT_MAX_REPAIRS,
};
use crate::state::WorkflowState;
use anyhow::anyhow;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub phase: PhaseArgs,

    /// Cap on repair iterations before the run is declared failed
    #[arg(long, value_name = "N")]
    pub max_repairs: Option<u32>,

    /// Re-run from this phase onward, discarding downstream results.
    /// Requires --run-id.
    #[arg(long, value_enum, value_name = "PHASE")]
    pub from: Option<Stage>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Classify,
    Plan,
    Build,
    Review,
    Repair,
}

/// Clear every state field owned by `stage` or a later phase, so the
/// drivers treat those phases as not yet run.
fn clear_from(state: &mut WorkflowState, stage: Stage) {
    if Stage::Classify >= stage {
        state.task_type = None;
        state.classify_reason = None;
    }
    if Stage::Plan >= stage {
        state.plan_file = None;
    }
    if Stage::Build >= stage {
        state.build_status = None;
    }
    if Stage::Review >= stage {
        state.review_status = None;
    }
    if Stage::Repair >= stage {
        state.repair_count = None;
    }
}

pub async fn run(args: PipelineArgs) -> PhaseResult<WorkflowState> {
    let working_dir = args.phase.working_dir()?;
    let mut phase_args = args.phase.clone();

    // Preflight the CLI once instead of failing one phase in.
    if let Some(reason) = adapter::probe_installed(adapter::backend_for(phase_args.cli)).await {
        return Err(PhaseError::Cli(anyhow!(
            "{} is unavailable: {}",
            phase_args.cli,
            reason
        )));
    }

    if let Some(stage) = args.from {
        let run_id = phase_args.run_id.clone().ok_or_else(|| {
            PhaseError::Config(anyhow!("--from requires --run-id to name the run"))
        })?;
        let mut state = WorkflowState::load(&working_dir, &run_id)
            .await
            .map_err(PhaseError::Config)?;
        clear_from(&mut state, stage);
        state.save(&working_dir).await.map_err(PhaseError::Config)?;
    }

    let state = classify::run(phase_args.clone()).await?;
    // From here on the state file is authoritative; later phases resume
    // from it instead of re-reading the prompt or piped stdin.
    phase_args.run_id = Some(state.run_id.clone());
    phase_args.prompt = None;

    let state = plan::run(phase_args.clone()).await?;

    let mut state = if state.build_status.as_deref() == Some("success") {
        state
    } else {
        build::run(phase_args.clone()).await?
    };

    if state.review_status.is_none() || state.review_status.as_deref() == Some("pending") {
        state = review::run(phase_args.clone()).await?;
    }

    let cap = args.max_repairs.unwrap_or(DEFAULT_MAX_REPAIRS);
    while state.review_status.as_deref() == Some("fail") {
        if repair::next_iteration(state.repair_count, cap).is_none() {
            return Err(PhaseError::Cli(anyhow!(
                "review still failing after {} repair(s) on run {}",
                state.repair_count.unwrap_or(0),
                state.run_id
            )));
        }
        state = repair::run(phase_args.clone(), Some(cap)).await?;
        state = review::run(phase_args.clone()).await?;
    }

    Ok(state)
}
