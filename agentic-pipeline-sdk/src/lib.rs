//! Structured logging events shared by the pipeline phase drivers.
//!
//! Drivers emit one JSON line per event on stderr, prefixed with a
//! sentinel so a wrapping UI or CI log scraper can pick them out of the
//! surrounding human-readable output. Stdout is never touched here; it
//! is reserved for the workflow-state handoff between piped drivers.

use serde::{Deserialize, Serialize};

/// Structured logging events emitted by phase drivers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineLog {
    /// Phase started
    PhaseStarted {
        run_id: String,
        phase: String,
    },
    /// Phase completed
    PhaseCompleted {
        run_id: String,
        phase: String,
    },
    /// Phase failed
    PhaseFailed {
        run_id: String,
        phase: String,
        error: String,
    },
    /// Agent CLI invocation started
    AgentStarted {
        run_id: String,
        agent: String,
        cli: String,
    },
    /// Agent invocation failed and will be retried after a delay
    AgentRetry {
        run_id: String,
        agent: String,
        attempt: usize,
        delay_secs: u64,
        retry_code: String,
    },
    /// Agent invocation succeeded
    AgentCompleted {
        run_id: String,
        agent: String,
        attempts: usize,
    },
    /// Agent invocation failed terminally
    AgentFailed {
        run_id: String,
        agent: String,
        retry_code: String,
        error: String,
    },
    /// Workflow state was persisted
    StateSaved {
        run_id: String,
        path: String,
    },
}

impl PipelineLog {
    /// Emit this log event to stderr for log scrapers
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("__PIPE_EVENT__:{}", json);
            // Force flush stderr in async/concurrent contexts
            let _ = std::io::stderr().flush();
        }
    }
}

#[macro_export]
macro_rules! log_phase_start {
    ($run_id:expr, $phase:expr) => {
        $crate::PipelineLog::PhaseStarted {
            run_id: $run_id.to_string(),
            phase: $phase.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_complete {
    ($run_id:expr, $phase:expr) => {
        $crate::PipelineLog::PhaseCompleted {
            run_id: $run_id.to_string(),
            phase: $phase.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_failed {
    ($run_id:expr, $phase:expr, $error:expr) => {
        $crate::PipelineLog::PhaseFailed {
            run_id: $run_id.to_string(),
            phase: $phase.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_start {
    ($run_id:expr, $agent:expr, $cli:expr) => {
        $crate::PipelineLog::AgentStarted {
            run_id: $run_id.to_string(),
            agent: $agent.to_string(),
            cli: $cli.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_retry {
    ($run_id:expr, $agent:expr, $attempt:expr, $delay_secs:expr, $code:expr) => {
        $crate::PipelineLog::AgentRetry {
            run_id: $run_id.to_string(),
            agent: $agent.to_string(),
            attempt: $attempt,
            delay_secs: $delay_secs,
            retry_code: $code.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_complete {
    ($run_id:expr, $agent:expr, $attempts:expr) => {
        $crate::PipelineLog::AgentCompleted {
            run_id: $run_id.to_string(),
            agent: $agent.to_string(),
            attempts: $attempts,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_agent_failed {
    ($run_id:expr, $agent:expr, $code:expr, $error:expr) => {
        $crate::PipelineLog::AgentFailed {
            run_id: $run_id.to_string(),
            agent: $agent.to_string(),
            retry_code: $code.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_state_saved {
    ($run_id:expr, $path:expr) => {
        $crate::PipelineLog::StateSaved {
            run_id: $run_id.to_string(),
            path: $path.to_string(),
        }
        .emit();
    };
}
