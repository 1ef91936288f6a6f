//! Review phase: judge the build against its plan and record a
//! pass/fail verdict in workflow state.
//!
//! A fail verdict is a *successful* review (it produced its contract);
//! the pipeline composer reads `review_status` to decide on repair.

use super::{
    acquire_state, execute_phase, output_excerpt, PhaseArgs, PhaseError, PhaseResult,
};
use crate::models::{AgentRole, ModelTier};
use crate::state::{StateUpdate, WorkflowState};
use crate::template;
use agentic_pipeline_sdk::{log_phase_complete, log_phase_failed, log_phase_start};
use anyhow::anyhow;
use regex::Regex;
use serde_json::{Map, Value};

const TEMPLATE: &str = "review";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pass" => Some(Verdict::Pass),
            "fail" => Some(Verdict::Fail),
            _ => None,
        }
    }
}

/// Verdict extraction, ordered: whole-output JSON `{"verdict": ...}`,
/// an embedded verdict field, then a bare uppercase PASS/FAIL word
/// (last occurrence wins, reviewers often restate the verdict at the
/// end).
pub fn extract_verdict(output: &str) -> Option<Verdict> {
    if let Ok(value) = serde_json::from_str::<Value>(output.trim()) {
        if let Some(v) = value.get("verdict").and_then(Value::as_str) {
            if let Some(verdict) = Verdict::parse(v) {
                return Some(verdict);
            }
        }
    }

    let field_re =
        Regex::new(r#"(?i)"verdict"\s*:\s*"(pass|fail)""#).expect("static regex");
    if let Some(caps) = field_re.captures(output) {
        return Verdict::parse(&caps[1]);
    }

    let bare_re = Regex::new(r"\b(PASS|FAIL)\b").expect("static regex");
    bare_re
        .find_iter(output)
        .last()
        .and_then(|m| Verdict::parse(m.as_str()))
}

pub async fn run(args: PhaseArgs) -> PhaseResult<WorkflowState> {
    let working_dir = args.working_dir()?;
    let mut state = acquire_state(&args, &working_dir).await?;
    let phase = AgentRole::Reviewer.phase_name();
    log_phase_start!(state.run_id, phase);

    let plan_file = state.plan_file.clone().ok_or_else(|| {
        PhaseError::Config(anyhow!("no plan_file in state: run plan first"))
    })?;
    if state.build_status.is_none() {
        return Err(PhaseError::Config(anyhow!(
            "no build_status in state: run build first"
        )));
    }

    let raw = template::load_template(&working_dir, TEMPLATE)
        .await
        .map_err(PhaseError::Config)?;
    let rendered = template::render(&raw, &[&plan_file], &state.prompt);

    let tier = args.model.unwrap_or(ModelTier::Medium);
    let invocation = execute_phase(
        &working_dir,
        &state,
        AgentRole::Reviewer,
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

    let verdict = extract_verdict(&invocation.response.output).ok_or_else(|| {
        let err = PhaseError::OutputContract(anyhow!(
            "reviewer output contains no pass/fail verdict; output starts: {}",
            output_excerpt(&invocation.response.output)
        ));
        log_phase_failed!(state.run_id, phase, err);
        err
    })?;

    let mut derived = Map::new();
    derived.insert("review_status".to_string(), Value::from(verdict.as_str()));
    invocation.write_summary(derived);

    state.apply(StateUpdate {
        review_status: Some(verdict.as_str().to_string()),
        ..Default::default()
    });
    state.save(&working_dir).await.map_err(PhaseError::Config)?;

    log_phase_complete!(state.run_id, phase);
    Ok(state)
}
