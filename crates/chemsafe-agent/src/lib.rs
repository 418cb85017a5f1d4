//! Review orchestration: turn a synthesis plan (plus optional molecule
//! notation) into a graded safety review.
//!
//! The agent owns prompt assembly and gating; it does not own chemistry or
//! retrieval. Structural findings come from `chemsafe-mol`, grounding rules
//! from `chemsafe-index`, and the verdict itself from a [`ChatBackend`].
//! The backend's answer is returned verbatim — the agent never rewrites a
//! verdict, and backend failures are errors, not a default grade.

pub mod config;
pub mod llm;
pub mod review;

pub use config::Config;
pub use llm::{BackendError, ChatBackend, MockBackend, OpenAiChatClient};
pub use review::{ReviewAgent, ReviewError};
