//! The packrat engine — one conversation turn, end to end.
//!
//! `ChatEngine::handle_turn` is the single entry point every front end
//! (CLI, gateway) consumes: append the user message, reconcile memory,
//! augment, fit, compact if needed, generate, persist, and report a
//! structured trace of what happened.

pub mod engine;
pub mod store;
pub mod trace;
pub mod wiring;

pub use engine::ChatEngine;
pub use store::JsonConversationStore;
pub use trace::{BudgetTrace, MemoryTrace, RagInfo, RagTrace, SummaryTrace, TurnTrace};
pub use wiring::EngineBundle;
