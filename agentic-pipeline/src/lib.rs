//! Agentic build pipeline: drives coding-assistant CLIs through a
//! classify, plan, build, review, repair workflow with file-based state
//! handoff under `agentic/` in the target repository.
//!
//! Each phase is a standalone binary whose piped stdout is a single
//! JSON state line, so phases compose with shell pipes:
//!
//! ```text
//! classify "fix the legend overlap" | plan | agentic-build | review
//! ```
//!
//! The `pipeline` binary runs the same sequence in-process, including
//! the bounded repair loop.

pub mod adapter;
pub mod artifacts;
pub mod events;
pub mod layout;
pub mod models;
pub mod phases;
pub mod pipeline;
pub mod retry;
pub mod state;
pub mod template;
