//! End-to-end tests of the phase binaries against the stub CLI:
//! artifact conventions, exit codes, retries, and pipe composition.

use super::common::{
    install_stub, run_bin, state_line, workspace, DISPATCH_STUB, FAIL_REVIEW_STUB, RETRY_STUB,
    SLOW_STUB, VAGUE_STUB,
};
use serde_json::Value;
use std::path::Path;

const CLASSIFY: &str = env!("CARGO_BIN_EXE_classify");
const PLAN: &str = env!("CARGO_BIN_EXE_plan");
const REVIEW: &str = env!("CARGO_BIN_EXE_review");
const REPAIR: &str = env!("CARGO_BIN_EXE_repair");
const PIPELINE: &str = env!("CARGO_BIN_EXE_pipeline");

fn seed_state(dir: &Path, run_id: &str, json: &str) {
    let run_dir = dir.join("agentic/runs").join(run_id);
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(run_dir.join("state.json"), json).unwrap();
}

#[test]
fn test_classify_binary_writes_state_and_artifacts() {
    let ws = workspace();
    let stub = install_stub(ws.path(), DISPATCH_STUB);

    let out = run_bin(
        CLASSIFY,
        &["crash when the legend overlaps the axis"],
        ws.path(),
        &stub,
        None,
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let state: Value = serde_json::from_str(&state_line(&out)).unwrap();
    assert_eq!(state["task_type"], "feature");
    let run_id = state["run_id"].as_str().unwrap();

    let run_dir = ws.path().join("agentic/runs").join(run_id);
    assert!(run_dir.join("state.json").is_file());
    for artifact in [
        "cli_raw_output.jsonl",
        "cli_raw_output.json",
        "cli_final_object.json",
        "cli_summary_output.json",
    ] {
        assert!(
            run_dir.join("classifier").join(artifact).is_file(),
            "missing artifact {}",
            artifact
        );
    }
}

#[test]
fn test_classify_pipes_into_plan() {
    let ws = workspace();
    let stub = install_stub(ws.path(), DISPATCH_STUB);

    let classify_out = run_bin(CLASSIFY, &["add a dark mode toggle"], ws.path(), &stub, None);
    assert!(classify_out.status.success());
    let piped = state_line(&classify_out);
    let upstream: Value = serde_json::from_str(&piped).unwrap();

    let plan_out = run_bin(PLAN, &[], ws.path(), &stub, Some(&piped));
    assert!(
        plan_out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&plan_out.stderr)
    );

    let state: Value = serde_json::from_str(&state_line(&plan_out)).unwrap();
    assert_eq!(state["run_id"], upstream["run_id"]);
    let plan_file = state["plan_file"].as_str().unwrap();
    assert!(plan_file.starts_with("agentic/specs/"));
    assert!(plan_file.ends_with("-stub-plan.md"));
    assert!(ws.path().join(plan_file).is_file());
}

#[test]
fn test_retry_recovers_after_transient_protocol_errors() {
    let ws = workspace();
    let stub = install_stub(ws.path(), RETRY_STUB);

    let out = run_bin(CLASSIFY, &["legend overlap"], ws.path(), &stub, None);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let state: Value = serde_json::from_str(&state_line(&out)).unwrap();
    assert_eq!(state["task_type"], "bug");

    let calls = std::fs::read_to_string(ws.path().join("stub_calls")).unwrap();
    assert_eq!(calls.trim(), "3");
}

#[test]
fn test_missing_cli_fails_fast_with_exit_one() {
    let ws = workspace();

    let out = run_bin(
        CLASSIFY,
        &["legend overlap"],
        ws.path(),
        Path::new("/nonexistent/claude-missing"),
        None,
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not installed"));
}

#[test]
fn test_timeout_kills_the_cli_and_exits_one() {
    let ws = workspace();
    let stub = install_stub(ws.path(), SLOW_STUB);

    let started = std::time::Instant::now();
    let out = run_bin(
        CLASSIFY,
        &["legend overlap", "--timeout", "1"],
        ws.path(),
        &stub,
        None,
    );

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("timed out"));
    // Three 1s attempts with zeroed retry delays, not the stub's sleep.
    assert!(started.elapsed() < std::time::Duration::from_secs(15));
}

#[test]
fn test_sigterm_stops_the_cli_and_exits_nonzero() {
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    let ws = workspace();
    let stub = install_stub(ws.path(), SLOW_STUB);

    let mut child = Command::new(CLASSIFY)
        .args(["legend overlap", "--working-dir"])
        .arg(ws.path())
        .env("CLAUDE_CODE_PATH", &stub)
        .env("AGENTIC_RETRY_DELAYS", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Let the driver reach the blocked CLI invocation first.
    std::thread::sleep(Duration::from_millis(500));
    let started = Instant::now();
    Command::new("kill")
        .arg(child.id().to_string())
        .status()
        .unwrap();

    let status = child.wait().unwrap();
    assert!(!status.success());
    // The driver must die promptly, not ride out the stub's sleep.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_unextractable_classification_exits_three() {
    let ws = workspace();
    let stub = install_stub(ws.path(), VAGUE_STUB);

    let out = run_bin(CLASSIFY, &["legend overlap"], ws.path(), &stub, None);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn test_failing_review_verdict_still_exits_zero() {
    let ws = workspace();
    let stub = install_stub(ws.path(), FAIL_REVIEW_STUB);
    seed_state(
        ws.path(),
        "seedrun1",
        r#"{"run_id":"seedrun1","prompt":"p","task_type":"bug","plan_file":"agentic/specs/260825-x.md","build_status":"success"}"#,
    );

    let out = run_bin(REVIEW, &["--run-id", "seedrun1"], ws.path(), &stub, None);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let state: Value = serde_json::from_str(&state_line(&out)).unwrap();
    assert_eq!(state["review_status"], "fail");
}

#[test]
fn test_repair_binary_honors_the_cap() {
    let ws = workspace();
    let stub = install_stub(ws.path(), DISPATCH_STUB);
    seed_state(
        ws.path(),
        "seedrun2",
        r#"{"run_id":"seedrun2","prompt":"p","task_type":"bug","plan_file":"agentic/specs/260825-x.md","build_status":"success","review_status":"fail","repair_count":3}"#,
    );

    let out = run_bin(
        REPAIR,
        &["--run-id", "seedrun2", "--max-repairs", "3"],
        ws.path(),
        &stub,
        None,
    );
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_pipeline_binary_runs_the_full_sequence() {
    let ws = workspace();
    let stub = install_stub(ws.path(), DISPATCH_STUB);

    let out = run_bin(
        PIPELINE,
        &["add a dark mode toggle"],
        ws.path(),
        &stub,
        None,
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let state: Value = serde_json::from_str(&state_line(&out)).unwrap();
    assert_eq!(state["task_type"], "feature");
    assert_eq!(state["build_status"], "success");
    assert_eq!(state["review_status"], "pass");
    let plan_file = state["plan_file"].as_str().unwrap();
    assert!(ws.path().join(plan_file).is_file());
}
