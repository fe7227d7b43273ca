//! Explicit dependency construction from configuration.
//!
//! Builds every backend once per process; engines are cheap per-user views
//! over those shared stores (the memory augmentor is scoped to a user).
//! Callers (CLI, gateway) construct one bundle at startup and share it via
//! `Arc`; there is no global cache keyed by settings.

use std::collections::HashMap;
use std::sync::Arc;

use packrat_config::PackratConfig;
use packrat_context::{
    ApproxTokenCounter, Budget, MemoryAugmentor, RagAugmentor, RagMode, RecencyTruncation,
    SummaryPolicy,
};
use packrat_core::augment::ContextAugmentor;
use packrat_core::error::{Error, Result};
use packrat_core::llm::LlmClient;
use packrat_core::memory::FactStore;
use packrat_core::rag::{DocumentLoader, Embedder, VectorStore};
use packrat_core::repo::ConversationStore;
use packrat_core::summarize::Summarizer;
use packrat_core::tokens::TokenCounter;
use packrat_memory::{JsonFactStore, RuleBasedExtractor};
use packrat_providers::{CompactingSummarizer, EchoLlm, LlmSummarizer, OllamaClient};
use packrat_rag::{CharChunker, DocIndexer, HashingEmbedder, JsonVectorStore, TextLoader};
use tracing::info;

use crate::engine::ChatEngine;
use crate::store::JsonConversationStore;

/// Shared backends plus a ready engine for the default user. Front ends
/// needing other users mint engines with [`EngineBundle::engine_for_user`];
/// all engines share the same stores.
pub struct EngineBundle {
    config: PackratConfig,
    counter: Arc<dyn TokenCounter>,
    llm: Arc<dyn LlmClient>,
    summarizer: Option<Arc<dyn Summarizer>>,
    convo_store: Arc<dyn ConversationStore>,
    embedder: Arc<dyn Embedder>,

    pub engine: Arc<ChatEngine>,
    pub indexer: Arc<DocIndexer>,
    pub rag_store: Arc<dyn VectorStore>,
    pub memory_store: Arc<dyn FactStore>,
}

impl EngineBundle {
    /// Build all backends from a validated config, with an engine for
    /// `user_id`.
    pub fn from_config(config: &PackratConfig, user_id: &str) -> Result<Self> {
        config.validate()?;

        let counter: Arc<dyn TokenCounter> = Arc::new(ApproxTokenCounter::default());

        let llm: Arc<dyn LlmClient> = match config.engine.llm_backend.as_str() {
            "ollama" => Arc::new(OllamaClient::new(
                &config.engine.ollama_url,
                &config.engine.ollama_model,
            )),
            _ => Arc::new(EchoLlm),
        };

        let summarizer: Option<Arc<dyn Summarizer>> = if config.engine.enable_summary {
            Some(match config.engine.summarizer_backend.as_str() {
                "llm" => Arc::new(LlmSummarizer::new(llm.clone())),
                _ => Arc::new(CompactingSummarizer),
            })
        } else {
            None
        };

        let convo_store: Arc<dyn ConversationStore> =
            Arc::new(JsonConversationStore::new(&config.storage.data_dir));
        let memory_store: Arc<dyn FactStore> =
            Arc::new(JsonFactStore::new(&config.memory.store_path));
        let rag_store: Arc<dyn VectorStore> =
            Arc::new(JsonVectorStore::new(&config.rag.store_path));
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());

        let mut loaders: HashMap<String, Arc<dyn DocumentLoader>> = HashMap::new();
        loaders.insert("txt".into(), Arc::new(TextLoader));
        loaders.insert("md".into(), Arc::new(TextLoader));

        let indexer = Arc::new(DocIndexer::new(
            loaders,
            Arc::new(
                CharChunker::new(counter.clone())
                    .with_sizes(config.rag.chunk_tokens, config.rag.overlap_tokens),
            ),
            embedder.clone(),
            rag_store.clone(),
        ));

        let engine = build_engine(
            config,
            &counter,
            &llm,
            summarizer.as_ref(),
            &convo_store,
            &memory_store,
            &rag_store,
            &embedder,
            user_id,
        )?;

        info!(
            llm = config.engine.llm_backend,
            summary = config.engine.enable_summary,
            memory = config.engine.enable_memory,
            rag = %config.engine.rag_mode,
            "Engine bundle built"
        );

        Ok(Self {
            config: config.clone(),
            counter,
            llm,
            summarizer,
            convo_store,
            embedder,
            engine,
            indexer,
            rag_store,
            memory_store,
        })
    }

    /// Mint an engine scoped to a user, sharing every backend.
    pub fn engine_for_user(&self, user_id: &str) -> Result<Arc<ChatEngine>> {
        build_engine(
            &self.config,
            &self.counter,
            &self.llm,
            self.summarizer.as_ref(),
            &self.convo_store,
            &self.memory_store,
            &self.rag_store,
            &self.embedder,
            user_id,
        )
    }

    /// Load a stored conversation (read-only view for front ends).
    pub async fn load_conversation(
        &self,
        id: &packrat_core::message::ConversationId,
    ) -> Result<packrat_core::message::Conversation> {
        Ok(self.convo_store.load(id).await?)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_engine(
    config: &PackratConfig,
    counter: &Arc<dyn TokenCounter>,
    llm: &Arc<dyn LlmClient>,
    summarizer: Option<&Arc<dyn Summarizer>>,
    convo_store: &Arc<dyn ConversationStore>,
    memory_store: &Arc<dyn FactStore>,
    rag_store: &Arc<dyn VectorStore>,
    embedder: &Arc<dyn Embedder>,
    user_id: &str,
) -> Result<Arc<ChatEngine>> {
    let mut augmentors: Vec<Arc<dyn ContextAugmentor>> = Vec::new();
    if config.engine.enable_memory {
        augmentors.push(Arc::new(
            MemoryAugmentor::new(memory_store.clone(), counter.clone(), user_id)
                .with_max_tokens(config.engine.memory_max_tokens),
        ));
    }
    let rag_mode: RagMode = config
        .engine
        .rag_mode
        .parse()
        .map_err(|message: String| Error::Config { message })?;
    if config.engine.enable_rag && rag_mode != RagMode::Off {
        augmentors.push(Arc::new(
            RagAugmentor::new(rag_store.clone(), embedder.clone(), counter.clone())
                .with_top_k(config.rag.top_k)
                .with_max_rag_tokens(config.rag.max_rag_tokens)
                .with_mode(rag_mode),
        ));
    }

    let mut engine = ChatEngine::new(
        convo_store.clone(),
        llm.clone(),
        counter.clone(),
        Budget::new(
            config.engine.max_context_tokens,
            config.engine.reserve_output_tokens,
        ),
        Arc::new(RecencyTruncation),
    )
    .with_system_prompt(&config.engine.system_prompt)
    .with_user_id(user_id)
    .with_augmentors(augmentors);

    if let Some(summarizer) = summarizer {
        engine = engine.with_summarizer(
            summarizer.clone(),
            SummaryPolicy {
                min_dropped_messages: config.engine.summary_min_dropped,
                max_summary_tokens: config.engine.summary_max_tokens,
                every_k_messages: None,
            },
        );
    }

    if config.engine.enable_memory {
        engine = engine.with_memory(memory_store.clone(), Arc::new(RuleBasedExtractor::new()));
    }

    Ok(Arc::new(engine))
}
