//! Phase driver preconditions and resumption, exercised in-process
//! against seeded state files. None of these reach the CLI adapter.

use super::common::{phase_args, workspace};
use agentic_pipeline::models::TaskType;
use agentic_pipeline::phases::{build, classify, plan, repair, review, PhaseError};
use agentic_pipeline::state::{StateUpdate, WorkflowState};

async fn seed(dir: &std::path::Path, run_id: &str, update: StateUpdate) -> WorkflowState {
    let mut state = WorkflowState::new(run_id, "fix the legend overlap");
    state.apply(update);
    state.save(dir).await.unwrap();
    state
}

#[tokio::test]
async fn test_classify_type_flag_short_circuits_without_cli() {
    let ws = workspace();
    seed(ws.path(), "run00001", StateUpdate::default()).await;

    let mut args = phase_args(ws.path(), "run00001");
    args.r#type = Some(TaskType::Chore);
    let state = classify::run(args).await.unwrap();

    assert_eq!(state.task_type, Some(TaskType::Chore));
    assert_eq!(state.classify_reason.as_deref(), Some("provided via --type"));

    // The short-circuit must persist like a real classification.
    let reloaded = WorkflowState::load(ws.path(), "run00001").await.unwrap();
    assert_eq!(reloaded.task_type, Some(TaskType::Chore));
}

#[tokio::test]
async fn test_classify_resume_is_a_no_op_when_already_classified() {
    // No templates installed: reaching the CLI would fail loudly.
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        "run00002",
        StateUpdate {
            task_type: Some(TaskType::Bug),
            classify_reason: Some("seeded".to_string()),
            ..Default::default()
        },
    )
    .await;

    let state = classify::run(phase_args(dir.path(), "run00002"))
        .await
        .unwrap();
    assert_eq!(state.task_type, Some(TaskType::Bug));
}

#[tokio::test]
async fn test_plan_requires_a_task_type() {
    let ws = workspace();
    seed(ws.path(), "run00003", StateUpdate::default()).await;

    let err = plan::run(phase_args(ws.path(), "run00003"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_plan_resume_is_a_no_op_when_plan_exists() {
    let dir = tempfile::tempdir().unwrap();
    seed(
        dir.path(),
        "run00004",
        StateUpdate {
            task_type: Some(TaskType::Feature),
            plan_file: Some("agentic/specs/260825-seeded.md".to_string()),
            ..Default::default()
        },
    )
    .await;

    let state = plan::run(phase_args(dir.path(), "run00004")).await.unwrap();
    assert_eq!(
        state.plan_file.as_deref(),
        Some("agentic/specs/260825-seeded.md")
    );
}

#[tokio::test]
async fn test_build_requires_a_plan_in_state() {
    let ws = workspace();
    seed(ws.path(), "run00005", StateUpdate::default()).await;

    let err = build::run(phase_args(ws.path(), "run00005"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_build_requires_the_plan_file_on_disk() {
    let ws = workspace();
    seed(
        ws.path(),
        "run00006",
        StateUpdate {
            task_type: Some(TaskType::Feature),
            plan_file: Some("agentic/specs/260825-missing.md".to_string()),
            ..Default::default()
        },
    )
    .await;

    let err = build::run(phase_args(ws.path(), "run00006"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_review_requires_a_completed_build() {
    let ws = workspace();
    seed(
        ws.path(),
        "run00007",
        StateUpdate {
            task_type: Some(TaskType::Bug),
            plan_file: Some("agentic/specs/260825-x.md".to_string()),
            ..Default::default()
        },
    )
    .await;

    let err = review::run(phase_args(ws.path(), "run00007"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert!(err.to_string().contains("build"));
}

#[tokio::test]
async fn test_repair_cap_is_a_pipeline_violation() {
    let ws = workspace();
    seed(
        ws.path(),
        "run00008",
        StateUpdate {
            task_type: Some(TaskType::Bug),
            plan_file: Some("agentic/specs/260825-x.md".to_string()),
            build_status: Some("success".to_string()),
            review_status: Some("fail".to_string()),
            repair_count: Some(3),
            ..Default::default()
        },
    )
    .await;

    let err = repair::run(phase_args(ws.path(), "run00008"), Some(3))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("repair cap"));
}

#[tokio::test]
async fn test_missing_template_is_a_config_error() {
    // State exists but agentic/commands does not.
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path(), "run00009", StateUpdate::default()).await;

    let err = classify::run(phase_args(dir.path(), "run00009"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert!(err.to_string().contains("template"));
}

#[tokio::test]
async fn test_invalid_run_id_is_rejected() {
    let ws = workspace();
    let err = classify::run(phase_args(ws.path(), "BAD-ID"))
        .await
        .unwrap_err();
    assert!(matches!(err, PhaseError::Config(_)));
    assert!(err.to_string().contains("invalid run id"));
}
