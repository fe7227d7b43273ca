//! Structured per-turn trace.
//!
//! Degraded fits, skipped compaction, and dropped messages are silent by
//! design — the trace is how they stay observable.

use packrat_core::llm::LlmUsage;
use packrat_context::Budget;
use serde::{Deserialize, Serialize};

/// Budget figures in effect for the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetTrace {
    pub max_context_tokens: usize,
    pub reserve_output_tokens: usize,
    pub max_input_tokens: usize,
}

/// Whether compaction ran this turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryTrace {
    pub applied: bool,
}

/// Retrieval injection details, when a retrieved-context message made it
/// into the fitted context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagTrace {
    pub inserted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<RagInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagInfo {
    pub chosen: usize,
    pub sources: Vec<String>,
    pub tokens: Option<usize>,
}

/// Memory reconciliation counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTrace {
    pub upserted: usize,
    pub skipped: usize,
}

/// Everything observable about one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTrace {
    pub conversation_id: String,
    pub user_id: String,
    pub budget: BudgetTrace,
    pub context_tokens_before_fit: usize,
    pub context_tokens_after_fit: usize,
    pub dropped_messages: usize,
    pub summary: SummaryTrace,
    pub rag: RagTrace,
    pub memory: MemoryTrace,
    pub usage: LlmUsage,
}

impl TurnTrace {
    pub fn new(conversation_id: &str, user_id: &str, budget: &Budget) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            budget: BudgetTrace {
                max_context_tokens: budget.max_context_tokens,
                reserve_output_tokens: budget.reserve_output_tokens,
                max_input_tokens: budget.max_input_tokens(),
            },
            context_tokens_before_fit: 0,
            context_tokens_after_fit: 0,
            dropped_messages: 0,
            summary: SummaryTrace::default(),
            rag: RagTrace::default(),
            memory: MemoryTrace::default(),
            usage: LlmUsage::default(),
        }
    }
}
