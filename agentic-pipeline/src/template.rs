//! Prompt template loading and rendering.
//!
//! Templates are plain markdown files under `agentic/commands/` with
//! `$1`, `$2`, ... and `$ARGUMENTS` placeholders. Rendering is literal
//! substitution, intentionally not a templating engine, so the existing
//! prompt files keep working byte for byte.

use crate::layout;
use anyhow::{Context, Result};
use std::path::Path;

/// Read a template by name; a missing template is fatal for the phase
pub async fn load_template(working_dir: &Path, name: &str) -> Result<String> {
    let path = layout::template_path(working_dir, name);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("missing prompt template {}", path.display()))
}

/// Substitute positional and named variables. Positionals are replaced
/// highest-index first so `$12` is never clobbered by `$1`. No
/// escaping; callers own input safety.
pub fn render(template: &str, positional: &[&str], arguments: &str) -> String {
    let mut rendered = template.replace("$ARGUMENTS", arguments);
    for (i, value) in positional.iter().enumerate().rev() {
        rendered = rendered.replace(&format!("${}", i + 1), value);
    }
    rendered
}
