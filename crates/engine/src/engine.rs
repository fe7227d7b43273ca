//! The turn handler.
//!
//! One turn walks: load → ensure system prompt → append user message →
//! reconcile memory → augment → fit → (bounded compaction retries) →
//! generate → append reply → persist → trace.
//!
//! The loop never fails closed on overflow: with no summarizer configured,
//! dropped messages are tolerated silently and only the trace shows it.
//! Collaborator failures (model, stores) propagate unchanged, and a turn
//! that fails before generation persists nothing.

use std::collections::HashSet;
use std::sync::Arc;

use packrat_context::{Budget, SummaryBuffer, SummaryPolicy};
use packrat_core::augment::ContextAugmentor;
use packrat_core::error::{Error, Result};
use packrat_core::llm::LlmClient;
use packrat_core::memory::{FactStore, MemoryExtractor};
use packrat_core::message::{
    Conversation, ConversationId, Message, Role, TYPE_RETRIEVED,
};
use packrat_core::repo::ConversationStore;
use packrat_core::summarize::Summarizer;
use packrat_core::tokens::TokenCounter;
use packrat_core::truncation::TruncationPolicy;
use packrat_memory::MemoryManager;
use tracing::{debug, info};

use crate::trace::{RagInfo, TurnTrace};

/// Upper bound on compaction rounds per turn. Bounds worst-case latency
/// and rules out runaway compaction loops.
const MAX_COMPACTION_ROUNDS: usize = 2;

/// The engine loop. Construct once, share behind an `Arc`; callers must
/// serialize turns for the same conversation id.
pub struct ChatEngine {
    store: Arc<dyn ConversationStore>,
    llm: Arc<dyn LlmClient>,
    counter: Arc<dyn TokenCounter>,
    budget: Budget,
    truncation: Arc<dyn TruncationPolicy>,
    augmentors: Vec<Arc<dyn ContextAugmentor>>,
    system_prompt: String,
    summarizer: Option<Arc<dyn Summarizer>>,
    summary_policy: SummaryPolicy,
    user_id: String,
    memory_store: Option<Arc<dyn FactStore>>,
    memory_extractor: Option<Arc<dyn MemoryExtractor>>,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        llm: Arc<dyn LlmClient>,
        counter: Arc<dyn TokenCounter>,
        budget: Budget,
        truncation: Arc<dyn TruncationPolicy>,
    ) -> Self {
        Self {
            store,
            llm,
            counter,
            budget,
            truncation,
            augmentors: Vec::new(),
            system_prompt: "You are a helpful assistant.".into(),
            summarizer: None,
            summary_policy: SummaryPolicy::default(),
            user_id: "default".into(),
            memory_store: None,
            memory_extractor: None,
        }
    }

    /// Augmentors run left-to-right; later ones see earlier insertions.
    pub fn with_augmentors(mut self, augmentors: Vec<Arc<dyn ContextAugmentor>>) -> Self {
        self.augmentors = augmentors;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Enable rolling summarization of dropped history.
    pub fn with_summarizer(
        mut self,
        summarizer: Arc<dyn Summarizer>,
        policy: SummaryPolicy,
    ) -> Self {
        self.summarizer = Some(summarizer);
        self.summary_policy = policy;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Enable fact extraction + reconciliation before augmentation.
    pub fn with_memory(
        mut self,
        store: Arc<dyn FactStore>,
        extractor: Arc<dyn MemoryExtractor>,
    ) -> Self {
        self.memory_store = Some(store);
        self.memory_extractor = Some(extractor);
        self
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Compute and attach the token cost once; an existing cache wins.
    fn cache_tokens(&self, msg: &mut Message) {
        if msg.cached_tokens().is_none() {
            let tokens = self.counter.count_messages(std::slice::from_ref(msg));
            msg.set_cached_tokens(tokens);
        }
    }

    fn ensure_system(&self, convo: &mut Conversation) {
        let has_system = convo
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System);
        if !has_system {
            let mut sys = Message::pinned_system(&self.system_prompt);
            self.cache_tokens(&mut sys);
            convo.messages.insert(0, sys);
        }
    }

    async fn augmented_context(&self, convo: &Conversation) -> Result<Vec<Message>> {
        let mut context = convo.messages.clone();
        for aug in &self.augmentors {
            context = aug.augment(convo, context).await?;
        }
        Ok(context)
    }

    /// Handle one turn and return only the reply text.
    pub async fn handle_turn_text(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> Result<String> {
        let (text, _trace) = self.handle_turn(conversation_id, user_text).await?;
        Ok(text)
    }

    /// Handle one turn: the single entry point of the engine.
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> Result<(String, TurnTrace)> {
        let cid = ConversationId::from(conversation_id);
        let mut convo = self.store.load(&cid).await?;
        self.ensure_system(&mut convo);

        info!(
            conversation_id,
            messages = convo.messages.len(),
            "Handling turn"
        );

        let mut trace = TurnTrace::new(conversation_id, &self.user_id, &self.budget);

        let mut user_msg = Message::user(user_text);
        self.cache_tokens(&mut user_msg);
        convo.push(user_msg.clone());

        // Reconcile memory before augmentation so augmentors see fresh
        // facts from this very message.
        if let (Some(store), Some(extractor)) = (&self.memory_store, &self.memory_extractor) {
            let candidates = extractor.extract(&user_msg);
            if !candidates.is_empty() {
                let res = MemoryManager::new(store.clone())
                    .apply(&self.user_id, &user_msg.id, &candidates)
                    .await?;
                trace.memory.upserted = res.upserted;
                trace.memory.skipped = res.skipped;
            }
        }

        let mut context = self.augmented_context(&convo).await?;
        trace.context_tokens_before_fit = self.counter.count_messages(&context);

        let max_input = self.budget.max_input_tokens();
        let mut fitted = self
            .truncation
            .fit(&context, self.counter.as_ref(), max_input);

        if let Some(summarizer) = &self.summarizer {
            let buffer = SummaryBuffer::new(
                summarizer.clone(),
                self.counter.clone(),
                self.summary_policy.clone(),
            );

            for round in 0..MAX_COMPACTION_ROUNDS {
                let dropped = SummaryBuffer::compute_dropped(&context, &fitted);
                if !buffer.should_summarize(&convo, &dropped) {
                    break;
                }

                let changed = buffer.apply(&mut convo, &dropped).await?;
                if !changed {
                    break;
                }
                trace.summary.applied = true;
                debug!(round, dropped = dropped.len(), "Compaction round applied");

                // The summary changed message ids, so synthetic context
                // must be regenerated before re-fitting.
                context = self.augmented_context(&convo).await?;
                trace.context_tokens_before_fit = self.counter.count_messages(&context);
                fitted = self
                    .truncation
                    .fit(&context, self.counter.as_ref(), max_input);
            }
        }

        trace.context_tokens_after_fit = self.counter.count_messages(&fitted);

        let fitted_ids: HashSet<&str> = fitted.iter().map(|m| m.id.as_str()).collect();
        trace.dropped_messages = context
            .iter()
            .filter(|m| !fitted_ids.contains(m.id.as_str()) && !m.is_pinned())
            .count();

        if let Some(rag_msg) = fitted
            .iter()
            .find(|m| m.role == Role::System && m.meta_type() == Some(TYPE_RETRIEVED))
        {
            trace.rag.inserted = true;
            trace.rag.info = Some(RagInfo {
                chosen: rag_msg
                    .meta
                    .get("chosen")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
                sources: rag_msg
                    .meta
                    .get("sources")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default(),
                tokens: rag_msg.cached_tokens(),
            });
        }

        // A failed generation aborts the whole in-memory turn: nothing is
        // persisted, the user message included.
        let resp = self
            .llm
            .generate(&fitted, self.budget.reserve_output_tokens)
            .await
            .map_err(Error::from)?;

        let mut assistant = Message::assistant(&resp.text)
            .with_meta("usage", serde_json::to_value(&resp.usage)?);
        self.cache_tokens(&mut assistant);
        convo.push(assistant);

        self.store.save(&convo).await?;

        trace.usage = resp.usage;
        Ok((resp.text, trace))
    }
}
