//! Shared scaffold for the five phase drivers.
//!
//! Every driver follows the same shape: resolve and render a prompt
//! template, create the phase's artifact directory, invoke the CLI
//! through the retry controller, post-process artifacts, apply a
//! phase-specific state update, and convert the outcome into an exit
//! code.

pub mod build;
pub mod classify;
pub mod plan;
pub mod repair;
pub mod review;

use crate::adapter::CliAdapter;
use crate::artifacts::{self, PhaseSummary};
use crate::events;
use crate::layout;
use crate::models::{
    is_valid_run_id, new_run_id, AgentPromptRequest, AgentPromptResponse, AgentRole, CliKind,
    ModelTier, TaskType,
};
use crate::retry::{RetryController, TokioSleeper};
use crate::state::WorkflowState;
use agentic_pipeline_sdk::{log_agent_failed, log_agent_start};
use anyhow::anyhow;
use clap::Parser;
use serde_json::{Map, Value};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const EXIT_CLI_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_OUTPUT_CONTRACT: i32 = 3;

/// Default cap on repair iterations per run
pub const DEFAULT_MAX_REPAIRS: u32 = 3;

/// Phase failure, carrying the user-visible exit-code taxonomy
#[derive(Debug, Error)]
pub enum PhaseError {
    /// Missing template, unreadable working dir, missing upstream state
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),
    /// CLI unavailable or failed after retries
    #[error("CLI failure: {0:#}")]
    Cli(anyhow::Error),
    /// The CLI ran but its output did not satisfy the phase contract
    #[error("output contract violation: {0:#}")]
    OutputContract(anyhow::Error),
}

impl PhaseError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PhaseError::Config(_) => EXIT_CONFIG_ERROR,
            PhaseError::Cli(_) => EXIT_CLI_FAILURE,
            PhaseError::OutputContract(_) => EXIT_OUTPUT_CONTRACT,
        }
    }
}

pub type PhaseResult<T> = Result<T, PhaseError>;

/// Arguments shared by every phase driver
#[derive(Parser, Debug, Clone)]
pub struct PhaseArgs {
    /// Task prompt. Optional when resuming via --run-id or when state
    /// arrives on a pipe.
    pub prompt: Option<String>,

    /// Skip the classifier by asserting the task type directly
    #[arg(long, value_enum, value_name = "TYPE")]
    pub r#type: Option<TaskType>,

    /// Model tier override for this phase
    #[arg(long, value_enum, value_name = "TIER")]
    pub model: Option<ModelTier>,

    /// Repository the agents operate on
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub working_dir: PathBuf,

    /// Which coding-assistant CLI to drive
    #[arg(long, value_enum, default_value_t = CliKind::Claude)]
    pub cli: CliKind,

    /// Resume an existing run from its persisted state
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,

    /// Hard timeout in seconds for each CLI invocation
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl PhaseArgs {
    /// Resolve the working directory to an absolute path
    pub fn working_dir(&self) -> PhaseResult<PathBuf> {
        self.working_dir.canonicalize().map_err(|e| {
            PhaseError::Config(anyhow!(
                "unreadable working dir {}: {}",
                self.working_dir.display(),
                e
            ))
        })
    }
}

/// Acquire workflow state for a driver, in precedence order:
/// `--run-id` resume from the canonical file, then piped stdin, then a
/// fresh state (which requires the positional prompt).
pub async fn acquire_state(args: &PhaseArgs, working_dir: &Path) -> PhaseResult<WorkflowState> {
    if let Some(run_id) = &args.run_id {
        if !is_valid_run_id(run_id) {
            return Err(PhaseError::Config(anyhow!(
                "invalid run id '{}': expected >=6 lowercase alphanumerics",
                run_id
            )));
        }
        return WorkflowState::load(working_dir, run_id)
            .await
            .map_err(PhaseError::Config);
    }

    if !std::io::stdin().is_terminal() {
        let mut piped = String::new();
        if std::io::stdin().read_to_string(&mut piped).is_ok() {
            // The upstream driver's final stdout line is the state.
            if let Some(line) = piped.lines().rev().find(|l| !l.trim().is_empty()) {
                return serde_json::from_str(line).map_err(|e| {
                    PhaseError::Config(anyhow!("piped state is not valid state JSON: {}", e))
                });
            }
        }
    }

    let prompt = args.prompt.clone().ok_or_else(|| {
        PhaseError::Config(anyhow!(
            "a prompt is required when neither --run-id nor piped state is given"
        ))
    })?;
    Ok(WorkflowState::new(new_run_id(), prompt))
}

/// Shared binary epilogue: print the final state (or the error) and
/// exit with the taxonomy code.
pub fn finish(result: PhaseResult<WorkflowState>) -> ! {
    match result {
        Ok(state) => match state.to_stdout() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(EXIT_CONFIG_ERROR)
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code())
        }
    }
}

/// First 500 characters of CLI output, for triage messages
pub fn output_excerpt(output: &str) -> String {
    output.chars().take(500).collect()
}

fn failure_summary(
    phase_dir: &Path,
    request: &AgentPromptRequest,
    response: &AgentPromptResponse,
) {
    artifacts::write_summary(
        phase_dir,
        &PhaseSummary {
            phase: request.agent_role.phase_name().to_string(),
            run_id: request.run_id.clone(),
            cli: request.cli.to_string(),
            model_tier: request.model_tier.to_string(),
            prompt: request.prompt.clone(),
            success: false,
            derived: Map::new(),
            output: response.output.clone(),
        },
    );
}

/// Outcome of one successful agent phase invocation
pub struct PhaseInvocation {
    pub request: AgentPromptRequest,
    pub response: AgentPromptResponse,
    pub phase_dir: PathBuf,
}

impl PhaseInvocation {
    /// Write the phase's success summary with its derived fields
    pub fn write_summary(&self, derived: Map<String, Value>) {
        artifacts::write_summary(
            &self.phase_dir,
            &PhaseSummary {
                phase: self.request.agent_role.phase_name().to_string(),
                run_id: self.request.run_id.clone(),
                cli: self.request.cli.to_string(),
                model_tier: self.request.model_tier.to_string(),
                prompt: self.request.prompt.clone(),
                success: true,
                derived,
                output: self.response.output.clone(),
            },
        );
    }
}

/// Steps 3-5 of the shared driver contract: artifact directory, typed
/// request, retried invocation, artifact post-processing, and outcome
/// classification.
pub async fn execute_phase(
    working_dir: &Path,
    state: &WorkflowState,
    role: AgentRole,
    cli: CliKind,
    tier: ModelTier,
    timeout_secs: Option<u64>,
    rendered_prompt: String,
) -> PhaseResult<PhaseInvocation> {
    let phase_dir = layout::phase_dir(working_dir, &state.run_id, role);
    tokio::fs::create_dir_all(&phase_dir).await.map_err(|e| {
        PhaseError::Config(anyhow!("failed to create {}: {}", phase_dir.display(), e))
    })?;

    let request = AgentPromptRequest {
        prompt: rendered_prompt,
        run_id: state.run_id.clone(),
        agent_role: role,
        model_tier: tier,
        cli,
        output_file: layout::raw_output_path(working_dir, &state.run_id, role),
        working_dir: working_dir.to_path_buf(),
        skip_confirmations: true,
        timeout_secs,
    };

    log_agent_start!(request.run_id, role, cli);

    let controller = RetryController::from_env();
    let mut adapter = CliAdapter;
    let mut sleeper = TokioSleeper;
    let response = controller.run(&mut adapter, &mut sleeper, &request).await;

    // Derived artifacts are always rebuilt from the raw stream, even on
    // failure, so triage has the full event log.
    artifacts::finalize(&phase_dir);

    if response.success {
        return Ok(PhaseInvocation {
            request,
            response,
            phase_dir,
        });
    }

    failure_summary(&phase_dir, &request, &response);
    log_agent_failed!(
        request.run_id,
        role,
        response.retry_code,
        output_excerpt(&response.output)
    );

    if response.retry_code != crate::models::RetryCode::None {
        return Err(PhaseError::Cli(anyhow!(
            "{} invocation failed ({}): {}",
            role.phase_name(),
            response.retry_code,
            output_excerpt(&response.output)
        )));
    }

    // Exit status was clean, so the stream itself broke the contract.
    let parsed = events::parse_events(&request.output_file);
    if parsed.terminal.is_none() {
        return Err(PhaseError::OutputContract(anyhow!(
            "{} produced no terminal result event; output starts: {}",
            role.phase_name(),
            output_excerpt(&response.output)
        )));
    }
    Err(PhaseError::Cli(anyhow!(
        "{} reported an error result: {}",
        role.phase_name(),
        output_excerpt(&response.output)
    )))
}
