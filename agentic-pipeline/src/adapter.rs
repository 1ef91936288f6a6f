//! Child-process adapter for the supported coding-assistant CLIs.
//!
//! Translates an [`AgentPromptRequest`] into a concrete invocation:
//! resolves the executable (environment override or bare name), builds
//! the argument vector for the CLI family, spawns the child with its
//! stdout redirected straight to the on-disk event file, and classifies
//! the exit condition into a [`RetryCode`].

use crate::events;
use crate::models::{
    AgentPromptRequest, AgentPromptResponse, CliKind, RetryCode,
};
use crate::retry::AgentInvoker;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub const CLAUDE_PATH_ENV: &str = "CLAUDE_CODE_PATH";
pub const COPILOT_PATH_ENV: &str = "COPILOT_CLI_PATH";
pub const GEMINI_PATH_ENV: &str = "GEMINI_CLI_PATH";

/// Stderr markers that indicate the CLI rejected our invocation
/// contract rather than the task itself.
const PROTOCOL_ERROR_MARKERS: &[&str] = &[
    "stream-json",
    "--output-format",
    "unknown option",
    "invalid option",
    "api error",
    "protocol error",
];

/// Grace period for reaping a killed child after a timeout
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Stderr is drained concurrently with a size cap; past it we keep the
/// head and note the truncation.
const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// One CLI family's invocation contract
pub trait CliBackend: Send + Sync {
    fn kind(&self) -> CliKind;

    /// Environment variable that overrides executable resolution
    fn env_key(&self) -> &'static str;

    /// Bare executable name used when no override is set
    fn default_executable(&self) -> &'static str;

    /// Arguments for the availability probe
    fn probe_args(&self) -> &'static [&'static str] {
        &["--version"]
    }

    /// Argument vector for one prompt invocation
    fn build_argv(&self, request: &AgentPromptRequest) -> Result<Vec<String>>;
}

pub struct ClaudeBackend;

impl CliBackend for ClaudeBackend {
    fn kind(&self) -> CliKind {
        CliKind::Claude
    }

    fn env_key(&self) -> &'static str {
        CLAUDE_PATH_ENV
    }

    fn default_executable(&self) -> &'static str {
        "claude"
    }

    fn build_argv(&self, request: &AgentPromptRequest) -> Result<Vec<String>> {
        let mut argv = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            request.model_tier.claude_model().to_string(),
        ];
        if request.skip_confirmations {
            argv.push("--dangerously-skip-permissions".to_string());
        }
        Ok(argv)
    }
}

/// Probe-capable stub: the copilot invocation contract is not pinned
/// down yet, so prompting through it is a configuration error instead
/// of a guessed flag set.
pub struct CopilotBackend;

impl CliBackend for CopilotBackend {
    fn kind(&self) -> CliKind {
        CliKind::Copilot
    }

    fn env_key(&self) -> &'static str {
        COPILOT_PATH_ENV
    }

    fn default_executable(&self) -> &'static str {
        "copilot"
    }

    fn build_argv(&self, _request: &AgentPromptRequest) -> Result<Vec<String>> {
        bail!("the copilot backend has no prompt invocation contract yet; use --cli claude")
    }
}

/// Probe-capable stub, same status as [`CopilotBackend`]
pub struct GeminiBackend;

impl CliBackend for GeminiBackend {
    fn kind(&self) -> CliKind {
        CliKind::Gemini
    }

    fn env_key(&self) -> &'static str {
        GEMINI_PATH_ENV
    }

    fn default_executable(&self) -> &'static str {
        "gemini"
    }

    fn build_argv(&self, _request: &AgentPromptRequest) -> Result<Vec<String>> {
        bail!("the gemini backend has no prompt invocation contract yet; use --cli claude")
    }
}

static CLAUDE: ClaudeBackend = ClaudeBackend;
static COPILOT: CopilotBackend = CopilotBackend;
static GEMINI: GeminiBackend = GeminiBackend;

/// Backend for a CLI name; unrecognized names fall back to claude
pub fn backend_for_name(name: &str) -> &'static dyn CliBackend {
    match name {
        "copilot" => &COPILOT,
        "gemini" => &GEMINI,
        _ => &CLAUDE,
    }
}

pub fn backend_for(kind: CliKind) -> &'static dyn CliBackend {
    backend_for_name(kind.as_str())
}

/// Environment-overridden path when set and non-empty, bare name
/// otherwise.
pub fn resolve_executable(backend: &dyn CliBackend) -> String {
    match std::env::var(backend.env_key()) {
        Ok(path) if !path.is_empty() => path,
        _ => backend.default_executable().to_string(),
    }
}

/// Run the CLI's version probe. Returns `None` when the CLI responds,
/// otherwise a description of why it counts as not installed.
pub async fn probe_installed(backend: &dyn CliBackend) -> Option<String> {
    let exe = resolve_executable(backend);
    let spawned = Command::new(&exe)
        .args(backend.probe_args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(Duration::from_secs(10), spawned).await {
        Ok(Ok(status)) if status.success() => None,
        Ok(Ok(status)) => Some(format!("{} exited with {} during probe", exe, status)),
        Ok(Err(e)) => Some(format!("failed to execute {}: {}", exe, e)),
        Err(_) => Some(format!("{} probe timed out", exe)),
    }
}

/// Wait for the child, honoring SIGTERM: the child is killed and
/// reaped before the process exits non-zero, so no orphan keeps
/// writing to the event file.
#[cfg(unix)]
async fn wait_with_cancel(
    child: &mut tokio::process::Child,
) -> std::io::Result<std::process::ExitStatus> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(_) => return child.wait().await,
    };
    tokio::select! {
        status = child.wait() => status,
        _ = sigterm.recv() => {
            eprintln!("Received SIGTERM, stopping the CLI");
            let _ = child.kill().await;
            let _ = tokio::time::timeout(REAP_GRACE, child.wait()).await;
            std::process::exit(130);
        }
    }
}

#[cfg(not(unix))]
async fn wait_with_cancel(
    child: &mut tokio::process::Child,
) -> std::io::Result<std::process::ExitStatus> {
    child.wait().await
}

fn stderr_mentions_protocol_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    PROTOCOL_ERROR_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= 2048 {
        return trimmed.to_string();
    }
    // Cut on a char boundary; stderr is arbitrary CLI text.
    let mut cut = 2048;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...[truncated]", &trimmed[..cut])
}

/// Spawns the CLI and classifies the outcome. Never returns `Err`:
/// every failure mode maps onto a [`RetryCode`] in the response.
pub struct CliAdapter;

impl CliAdapter {
    pub async fn invoke(&self, request: &AgentPromptRequest) -> AgentPromptResponse {
        let backend = backend_for(request.cli);

        let argv = match backend.build_argv(request) {
            Ok(argv) => argv,
            // An unimplemented backend is unavailable for prompting,
            // same user remedy as a missing executable.
            Err(e) => return AgentPromptResponse::failure(RetryCode::CliNotInstalled, e.to_string()),
        };

        if let Some(parent) = request.output_file.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return AgentPromptResponse::failure(
                    RetryCode::ExecutionError,
                    format!("failed to create {}: {}", parent.display(), e),
                );
            }
        }

        capture_slash_prompt(request);

        let stdout_file = match std::fs::File::create(&request.output_file) {
            Ok(f) => f,
            Err(e) => {
                return AgentPromptResponse::failure(
                    RetryCode::ExecutionError,
                    format!("failed to create {}: {}", request.output_file.display(), e),
                )
            }
        };

        let exe = resolve_executable(backend);
        let mut child = match Command::new(&exe)
            .args(&argv)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return AgentPromptResponse::failure(
                    RetryCode::CliNotInstalled,
                    format!("{} is not installed (looked for `{}`)", request.cli, exe),
                );
            }
            Err(e) => {
                return AgentPromptResponse::failure(
                    RetryCode::ExecutionError,
                    format!("failed to spawn {}: {}", exe, e),
                );
            }
        };

        // Drain stderr concurrently with wait: pipe buffers are small
        // and a blocked child would otherwise deadlock the timeout.
        let stderr_handle = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut handle) = stderr_handle {
                let _ = handle.read_to_end(&mut buf).await;
            }
            if buf.len() > MAX_STDERR_BYTES {
                format!(
                    "{}...[truncated, total {} bytes]",
                    String::from_utf8_lossy(&buf[..MAX_STDERR_BYTES / 2]),
                    buf.len()
                )
            } else {
                String::from_utf8_lossy(&buf).to_string()
            }
        });

        let wait_result = match request.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), wait_with_cancel(&mut child))
                    .await
                {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        let _ = child.kill().await;
                        let _ = tokio::time::timeout(REAP_GRACE, child.wait()).await;
                        // Grandchildren may still hold the stderr pipe
                        // open after the kill, so the drain is bounded
                        // too.
                        let stderr =
                            match tokio::time::timeout(REAP_GRACE, stderr_reader).await {
                                Ok(Ok(s)) => s,
                                _ => String::new(),
                            };
                        return AgentPromptResponse::failure(
                            RetryCode::Timeout,
                            format!(
                                "{} timed out after {}s. stderr: {}",
                                request.cli,
                                secs,
                                stderr_excerpt(&stderr)
                            ),
                        );
                    }
                }
            }
            None => wait_with_cancel(&mut child).await,
        };

        let stderr = stderr_reader.await.unwrap_or_default();

        let status = match wait_result {
            Ok(status) => status,
            Err(e) => {
                return AgentPromptResponse::failure(
                    RetryCode::ExecutionError,
                    format!("waiting for {} failed: {}", exe, e),
                );
            }
        };

        // The event file is the source of truth for output even when
        // the process failed partway.
        let parsed = events::parse_events(&request.output_file);
        let (output, session_id, stream_success) = parsed.derive_response();

        if status.success() {
            return AgentPromptResponse {
                output,
                success: stream_success,
                session_id,
                retry_code: RetryCode::None,
            };
        }

        let retry_code = if stderr_mentions_protocol_error(&stderr) {
            RetryCode::CliProtocolError
        } else {
            RetryCode::ExecutionError
        };
        let message = if output.is_empty() {
            format!(
                "{} exited with {}. stderr: {}",
                request.cli,
                status,
                stderr_excerpt(&stderr)
            )
        } else {
            output
        };
        AgentPromptResponse {
            output: message,
            success: false,
            session_id,
            retry_code,
        }
    }
}

#[async_trait]
impl AgentInvoker for CliAdapter {
    async fn invoke(&mut self, request: &AgentPromptRequest) -> AgentPromptResponse {
        CliAdapter::invoke(self, request).await
    }
}

/// Slash-command prompts are captured to a provenance file beside the
/// event stream. Best-effort.
fn capture_slash_prompt(request: &AgentPromptRequest) {
    if !request.prompt.starts_with('/') {
        return;
    }
    if let Some(parent) = request.output_file.parent() {
        let capture = parent.join(crate::layout::PROMPT_CAPTURE);
        if let Err(e) = std::fs::write(&capture, &request.prompt) {
            eprintln!("Warning: failed to capture prompt to {}: {}", capture.display(), e);
        }
    }
}
