//! Common test utilities: workspace scaffolding, prompt templates, and
//! a scriptable stand-in for the claude CLI.

use agentic_pipeline::models::CliKind;
use agentic_pipeline::phases::PhaseArgs;
use std::path::Path;
use tempfile::TempDir;

/// Minimal prompt templates. The first word of each rendered prompt
/// lets the stub CLI tell the phases apart.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("classify", "Classify this task: $ARGUMENTS"),
    ("bug", "Plan a fix for: $ARGUMENTS"),
    ("feature", "Plan the implementation of: $ARGUMENTS"),
    ("chore", "Plan the chore: $ARGUMENTS"),
    ("refactor", "Plan the refactor: $ARGUMENTS"),
    ("build", "Build the plan at $1"),
    ("review", "Review the build against $1"),
    ("repair", "Repair the build per $1"),
];

/// Create a working directory with the full template set installed
pub fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let commands = dir.path().join("agentic/commands");
    std::fs::create_dir_all(&commands).unwrap();
    for (name, body) in TEMPLATES {
        std::fs::write(commands.join(format!("{}.md", name)), body).unwrap();
    }
    dir
}

/// Driver args resuming `run_id` in `dir`
pub fn phase_args(dir: &Path, run_id: &str) -> PhaseArgs {
    PhaseArgs {
        prompt: None,
        r#type: None,
        model: None,
        working_dir: dir.to_path_buf(),
        cli: CliKind::Claude,
        run_id: Some(run_id.to_string()),
        timeout: None,
    }
}

/// Stub that dispatches on the rendered prompt's first word and emits
/// a well-formed terminal result event per phase. The planner branch
/// also creates the spec file it reports, like a real agent would.
pub const DISPATCH_STUB: &str = r#"
printf '%s\n' '{"type":"system","subtype":"init"}'
case "$2" in
  Classify*)
    printf '%s\n' '{"type":"result","result":"{\"type\": \"feature\", \"reason\": \"adds capability\"}","session_id":"sess-classify","is_error":false}'
    ;;
  Plan*)
    mkdir -p agentic/specs
    d=$(date -u +%y%m%d)
    printf 'stub plan\n' > "agentic/specs/$d-stub-plan.md"
    printf '%s\n' "{\"type\":\"result\",\"result\":\"Wrote agentic/specs/$d-stub-plan.md\",\"session_id\":\"sess-plan\",\"is_error\":false}"
    ;;
  Build*)
    printf '%s\n' '{"type":"result","result":"build complete","session_id":"sess-build","is_error":false}'
    ;;
  Review*)
    printf '%s\n' '{"type":"result","result":"Final verdict: PASS","session_id":"sess-review","is_error":false}'
    ;;
  Repair*)
    printf '%s\n' '{"type":"result","result":"repaired","session_id":"sess-repair","is_error":false}'
    ;;
esac
"#;

/// Stub that fails twice with a protocol-marker stderr line, then
/// succeeds. Tracks attempts in `stub_calls` under the child's cwd.
pub const RETRY_STUB: &str = r#"
n=$(cat stub_calls 2>/dev/null || printf 0)
n=$((n + 1))
printf '%s\n' "$n" > stub_calls
if [ "$n" -le 2 ]; then
  printf '%s\n' "Error: unknown option '--output-format'" >&2
  exit 2
fi
printf '%s\n' '{"type":"result","result":"{\"type\": \"bug\", \"reason\": \"after retries\"}","session_id":"sess-retry","is_error":false}'
"#;

/// Stub whose output satisfies no extraction strategy
pub const VAGUE_STUB: &str = r#"
printf '%s\n' '{"type":"result","result":"I could not decide.","session_id":"sess-vague","is_error":false}'
"#;

/// Stub that outlives any reasonable timeout before responding
pub const SLOW_STUB: &str = r#"
sleep 30
printf '%s\n' '{"type":"result","result":"too late","session_id":"sess-slow","is_error":false}'
"#;

/// Stub that always delivers a failing review verdict
pub const FAIL_REVIEW_STUB: &str = r#"
printf '%s\n' '{"type":"result","result":"Final verdict: FAIL","session_id":"sess-fail","is_error":false}'
"#;

/// Install an executable shell script standing in for the claude CLI
#[cfg(unix)]
pub fn install_stub(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("claude-stub");
    std::fs::write(&path, format!("#!/bin/sh{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Run a phase binary against `dir` with the stub as the claude CLI.
/// `stdin_data` simulates an upstream phase on a pipe.
#[cfg(unix)]
pub fn run_bin(
    exe: &str,
    args: &[&str],
    dir: &Path,
    stub: &Path,
    stdin_data: Option<&str>,
) -> std::process::Output {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(exe)
        .args(args)
        .arg("--working-dir")
        .arg(dir)
        .env("CLAUDE_CODE_PATH", stub)
        .env("AGENTIC_RETRY_DELAYS", "0")
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    if let Some(data) = stdin_data {
        child
            .stdin
            .take()
            .unwrap()
            .write_all(data.as_bytes())
            .unwrap();
    }
    child.wait_with_output().unwrap()
}

/// The single JSON state line a piped phase binary must emit
#[cfg(unix)]
pub fn state_line(output: &std::process::Output) -> String {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines.len(),
        1,
        "piped stdout must be exactly one line, got: {:?}",
        stdout
    );
    assert!(!stdout.contains('\u{1b}'), "piped stdout must carry no ANSI escapes");
    lines[0].to_string()
}
