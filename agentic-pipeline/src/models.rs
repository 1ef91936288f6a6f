//! Core request/response types shared by the CLI adapter, retry
//! controller, and phase drivers.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Supported coding-assistant CLI families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CliKind {
    Claude,
    Copilot,
    Gemini,
}

impl CliKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CliKind::Claude => "claude",
            CliKind::Copilot => "copilot",
            CliKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for CliKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model size tier, mapped to concrete model flags per CLI family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

impl ModelTier {
    /// Model alias passed to the claude CLI's `--model` flag
    pub fn claude_model(&self) -> &'static str {
        match self {
            ModelTier::Small => "haiku",
            ModelTier::Medium => "sonnet",
            ModelTier::Large => "opus",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Small => "small",
            ModelTier::Medium => "medium",
            ModelTier::Large => "large",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical role of one CLI invocation; doubles as the per-phase
/// artifact directory name under `agentic/runs/<run_id>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Classifier,
    Planner,
    Builder,
    Reviewer,
    Repairer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Classifier => "classifier",
            AgentRole::Planner => "planner",
            AgentRole::Builder => "builder",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Repairer => "repairer",
        }
    }

    /// Pipeline phase this role drives, as shown in logs
    pub fn phase_name(&self) -> &'static str {
        match self {
            AgentRole::Classifier => "classify",
            AgentRole::Planner => "plan",
            AgentRole::Builder => "build",
            AgentRole::Reviewer => "review",
            AgentRole::Repairer => "repair",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task classification produced by the classify phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Bug,
    Feature,
    Chore,
    Refactor,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Bug => "bug",
            TaskType::Feature => "feature",
            TaskType::Chore => "chore",
            TaskType::Refactor => "refactor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bug" => Some(TaskType::Bug),
            "feature" => Some(TaskType::Feature),
            "chore" => Some(TaskType::Chore),
            "refactor" => Some(TaskType::Refactor),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single CLI invocation's outcome, used by the
/// retry controller to decide whether to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryCode {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "CLI_PROTOCOL_ERROR")]
    CliProtocolError,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "EXECUTION_ERROR")]
    ExecutionError,
    #[serde(rename = "CLI_NOT_INSTALLED")]
    CliNotInstalled,
}

impl RetryCode {
    /// Whether the retry controller may attempt the invocation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RetryCode::CliProtocolError | RetryCode::Timeout | RetryCode::ExecutionError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryCode::None => "NONE",
            RetryCode::CliProtocolError => "CLI_PROTOCOL_ERROR",
            RetryCode::Timeout => "TIMEOUT",
            RetryCode::ExecutionError => "EXECUTION_ERROR",
            RetryCode::CliNotInstalled => "CLI_NOT_INSTALLED",
        }
    }
}

impl fmt::Display for RetryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to one CLI invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPromptRequest {
    /// Fully rendered prompt text
    pub prompt: String,
    /// Run identifier shared by all phases of one pipeline execution
    pub run_id: String,
    /// Logical role of this invocation
    pub agent_role: AgentRole,
    /// Model size tier
    pub model_tier: ModelTier,
    /// Which CLI family to invoke
    pub cli: CliKind,
    /// Absolute path of the line-delimited event-stream file the CLI writes
    pub output_file: PathBuf,
    /// Working directory for the child process
    pub working_dir: PathBuf,
    /// Skip the CLI's interactive permission prompts
    pub skip_confirmations: bool,
    /// Hard timeout in seconds enforced on the child process
    pub timeout_secs: Option<u64>,
}

/// Result of one CLI invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPromptResponse {
    /// Final textual output derived from the terminal event
    pub output: String,
    pub success: bool,
    /// Session identifier reported by the CLI, empty if absent
    pub session_id: String,
    pub retry_code: RetryCode,
}

impl AgentPromptResponse {
    pub fn failure(retry_code: RetryCode, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            session_id: String::new(),
            retry_code,
        }
    }
}

/// Generate a fresh run identifier: lowercase alphanumerics, 8 chars
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Run ids are lowercase alphanumerics, at least 6 chars
pub fn is_valid_run_id(id: &str) -> bool {
    id.len() >= 6
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
