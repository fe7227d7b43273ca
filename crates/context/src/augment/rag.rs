//! Retrieval augmentor with budget-fit search.
//!
//! Embeds the latest user message, pulls the top-k ranked chunks, and packs
//! as many as fit under `max_rag_tokens` into one synthetic system message,
//! verifying the cost with the token counter after every addition. When not
//! even the top chunk fits whole, a bisection over its character length
//! finds the largest prefix that does. The inserted message's token cost is
//! always measured, never estimated.

use std::sync::Arc;

use async_trait::async_trait;
use packrat_core::augment::{ContextAugmentor, insertion_index};
use packrat_core::error::Error;
use packrat_core::message::{
    Conversation, META_PINNED, META_TYPE, Message, Role, TYPE_RETRIEVED,
};
use packrat_core::rag::{DocumentChunk, Embedder, VectorStore};
use packrat_core::tokens::TokenCounter;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default number of chunks requested from the store.
pub const DEFAULT_TOP_K: usize = 4;
/// Default token cap for the injected message.
pub const DEFAULT_RAG_TOKENS: usize = 250;

const HEADER: &str = "Relevant excerpts from indexed documents (use them when answering). \
If the answer is not in these excerpts, say so.\n\n";

/// When retrieval runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RagMode {
    /// Never inject.
    Off,
    /// Inject only when the message looks like a document question.
    #[default]
    Auto,
    /// Inject on every turn.
    Always,
}

impl std::str::FromStr for RagMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown rag mode: {other}")),
        }
    }
}

/// Keyword heuristic for `RagMode::Auto`.
fn looks_like_doc_query(text: &str) -> bool {
    let t = text.to_lowercase();
    const KEYS: &[&str] = &[
        "document",
        "docs",
        "file",
        "pdf",
        ".pdf",
        ".txt",
        ".md",
        "book",
        "page",
        "section",
        "chapter",
        "according to",
        "in the file",
        "in the document",
        "docs/",
    ];
    KEYS.iter().any(|k| t.contains(k))
}

/// Injects one budget-verified "retrieved context" message.
pub struct RagAugmentor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    counter: Arc<dyn TokenCounter>,
    top_k: usize,
    max_rag_tokens: usize,
    mode: RagMode,
}

fn is_retrieved_message(m: &Message) -> bool {
    m.role == Role::System && m.meta_type() == Some(TYPE_RETRIEVED)
}

impl RagAugmentor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            store,
            embedder,
            counter,
            top_k: DEFAULT_TOP_K,
            max_rag_tokens: DEFAULT_RAG_TOKENS,
            mode: RagMode::Auto,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_rag_tokens(mut self, max_rag_tokens: usize) -> Self {
        self.max_rag_tokens = max_rag_tokens;
        self
    }

    pub fn with_mode(mut self, mode: RagMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_rag_tokens(&self) -> usize {
        self.max_rag_tokens
    }

    fn make_msg(
        &self,
        text: String,
        chosen: &[&DocumentChunk],
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Message {
        let sources: Vec<String> = chosen.iter().map(|c| c.locator()).collect();
        let mut msg = Message {
            id: format!("rag_{}", Uuid::new_v4().simple()),
            role: Role::System,
            content: text,
            created_at,
            meta: serde_json::Map::new(),
        };
        msg.meta.insert(META_TYPE.into(), TYPE_RETRIEVED.into());
        msg.meta.insert(META_PINNED.into(), false.into());
        msg.meta
            .insert("chosen".into(), serde_json::json!(chosen.len()));
        msg.meta.insert("sources".into(), serde_json::json!(sources));
        msg
    }

    fn cost(&self, msg: &Message) -> usize {
        self.counter.count_messages(std::slice::from_ref(msg))
    }

    /// Binary search the largest char-prefix of the top chunk whose wrapped
    /// message still fits the cap. Token cost is monotonic in prefix
    /// length, so bisection is sound. Returns None when even an empty
    /// prefix is over budget.
    fn bisect_prefix(
        &self,
        chunk: &DocumentChunk,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Option<Message> {
        let text: Vec<char> = chunk.text.trim().chars().collect();
        if text.is_empty() {
            return None;
        }

        let (mut lo, mut hi) = (0usize, text.len());
        let mut best: Option<String> = None;

        while lo <= hi {
            let mid = (lo + hi) / 2;
            let prefix: String = text[..mid].iter().collect();
            let trial = format!("{HEADER}[{}]\n{}\n", chunk.locator(), prefix);
            let trial_msg = self.make_msg(trial.clone(), &[chunk], created_at);
            if self.cost(&trial_msg) <= self.max_rag_tokens {
                best = Some(trial);
                lo = mid + 1;
            } else if mid == 0 {
                break;
            } else {
                hi = mid - 1;
            }
        }

        best.map(|text| self.make_msg(text, &[chunk], created_at))
    }
}

#[async_trait]
impl ContextAugmentor for RagAugmentor {
    async fn augment(
        &self,
        _convo: &Conversation,
        draft: Vec<Message>,
    ) -> std::result::Result<Vec<Message>, Error> {
        let mut base: Vec<Message> = draft
            .into_iter()
            .filter(|m| !is_retrieved_message(m))
            .collect();

        if base.is_empty() || self.mode == RagMode::Off {
            return Ok(base);
        }

        let Some(last_user) = base.iter().rev().find(|m| m.role == Role::User).cloned()
        else {
            return Ok(base);
        };

        if self.mode == RagMode::Auto && !looks_like_doc_query(&last_user.content) {
            return Ok(base);
        }

        // An unreadable store count is treated as unknown, not fatal.
        match self.store.count().await {
            Ok(0) => return Ok(base),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Vector store count failed, attempting search anyway"),
        }

        let vectors = self
            .embedder
            .embed(std::slice::from_ref(&last_user.content))
            .await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            return Ok(base);
        };

        let hits = self.store.search(&query_vector, self.top_k).await?;
        if hits.is_empty() {
            return Ok(base);
        }

        let created_at = last_user.created_at;
        let mut chosen: Vec<&DocumentChunk> = Vec::new();
        let mut parts: Vec<String> = vec![HEADER.to_string()];

        // Greedy accumulation, verified against the counter after each
        // addition; stop at the first chunk that would overflow.
        for chunk in &hits {
            let piece = format!("[{}]\n{}\n\n", chunk.locator(), chunk.text.trim());
            let trial: String = parts.concat() + &piece;
            let mut trial_chosen = chosen.clone();
            trial_chosen.push(chunk);
            let trial_msg = self.make_msg(trial, &trial_chosen, created_at);
            if self.cost(&trial_msg) <= self.max_rag_tokens {
                parts.push(piece);
                chosen.push(chunk);
            } else {
                break;
            }
        }

        let mut rag_msg = if chosen.is_empty() {
            // Nothing fit whole — fall back to a prefix of the top hit.
            match self.bisect_prefix(&hits[0], created_at) {
                Some(msg) => msg,
                None => return Ok(base),
            }
        } else {
            self.make_msg(parts.concat(), &chosen, created_at)
        };

        let tokens = self.cost(&rag_msg);
        rag_msg.set_cached_tokens(tokens);

        debug!(
            chosen = rag_msg.meta.get("chosen").and_then(|v| v.as_u64()),
            tokens,
            "Injected retrieved context"
        );

        let at = insertion_index(&base);
        base.insert(at, rag_msg);
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ApproxTokenCounter;
    use packrat_core::error::StoreError;

    struct StubStore(Vec<DocumentChunk>);

    #[async_trait]
    impl VectorStore for StubStore {
        async fn upsert(
            &self,
            _chunks: &[DocumentChunk],
            _vectors: &[Vec<f32>],
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }
        async fn search(
            &self,
            _query_vector: &[f32],
            top_k: usize,
        ) -> std::result::Result<Vec<DocumentChunk>, StoreError> {
            Ok(self.0.iter().take(top_k).cloned().collect())
        }
        async fn count(&self) -> std::result::Result<usize, StoreError> {
            Ok(self.0.len())
        }
        async fn delete_by_source(
            &self,
            _source: &str,
        ) -> std::result::Result<usize, StoreError> {
            Ok(0)
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn dim(&self) -> usize {
            4
        }
        async fn embed(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, StoreError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
    }

    fn chunk(id: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            id: id.into(),
            text: text.into(),
            source: "doc.txt".into(),
            page: None,
            tokens: 0,
        }
    }

    fn augmentor(chunks: Vec<DocumentChunk>, max_rag_tokens: usize) -> RagAugmentor {
        RagAugmentor::new(
            Arc::new(StubStore(chunks)),
            Arc::new(StubEmbedder),
            Arc::new(ApproxTokenCounter::default()),
        )
        .with_top_k(2)
        .with_max_rag_tokens(max_rag_tokens)
        .with_mode(RagMode::Always)
    }

    fn draft() -> Vec<Message> {
        vec![
            Message::pinned_system("SYS"),
            Message::user("What is the capital of France?"),
        ]
    }

    #[tokio::test]
    async fn injects_single_message_under_cap() {
        let counter = ApproxTokenCounter::default();
        let aug = augmentor(
            vec![
                chunk("c1", "France capital is Paris."),
                chunk("c2", "Germany capital is Berlin."),
            ],
            80,
        );

        let out = aug.augment(&Conversation::default(), draft()).await.unwrap();
        let retrieved: Vec<&Message> =
            out.iter().filter(|m| is_retrieved_message(m)).collect();
        assert_eq!(retrieved.len(), 1);
        assert!(counter.count_messages(std::slice::from_ref(retrieved[0])) <= 80);
        assert!(retrieved[0].content.contains("Paris"));
        // inserted directly after the pinned prefix
        assert_eq!(out[1].id, retrieved[0].id);
    }

    #[tokio::test]
    async fn bisection_fits_prefix_of_top_chunk() {
        let counter = ApproxTokenCounter::default();
        // Too large to fit whole under the cap, so only a prefix survives.
        let aug = augmentor(vec![chunk("c1", &"France is a country. ".repeat(50))], 60);

        let out = aug.augment(&Conversation::default(), draft()).await.unwrap();
        let retrieved: Vec<&Message> =
            out.iter().filter(|m| is_retrieved_message(m)).collect();
        assert_eq!(retrieved.len(), 1);
        assert!(counter.count_messages(std::slice::from_ref(retrieved[0])) <= 60);
        assert!(retrieved[0].content.starts_with(HEADER));
    }

    #[tokio::test]
    async fn over_tight_budget_inserts_nothing() {
        // Header overhead alone exceeds the cap.
        let aug = augmentor(vec![chunk("c1", "France capital is Paris.")], 5);

        let out = aug.augment(&Conversation::default(), draft()).await.unwrap();
        assert!(out.iter().all(|m| !is_retrieved_message(m)));
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn empty_store_inserts_nothing() {
        let aug = augmentor(vec![], 80);
        let out = aug.augment(&Conversation::default(), draft()).await.unwrap();
        assert!(out.iter().all(|m| !is_retrieved_message(m)));
    }

    #[tokio::test]
    async fn off_mode_inserts_nothing() {
        let aug = augmentor(vec![chunk("c1", "text")], 80).with_mode(RagMode::Off);
        let out = aug.augment(&Conversation::default(), draft()).await.unwrap();
        assert!(out.iter().all(|m| !is_retrieved_message(m)));
    }

    #[tokio::test]
    async fn auto_mode_requires_doc_query() {
        let aug = augmentor(vec![chunk("c1", "text")], 80).with_mode(RagMode::Auto);

        let plain = vec![Message::user("hello there")];
        let out = aug.augment(&Conversation::default(), plain).await.unwrap();
        assert!(out.iter().all(|m| !is_retrieved_message(m)));

        let doc = vec![Message::user("what does the document say about x?")];
        let out = aug.augment(&Conversation::default(), doc).await.unwrap();
        assert!(out.iter().any(|m| is_retrieved_message(m)));
    }

    #[tokio::test]
    async fn idempotent_across_runs() {
        let aug = augmentor(vec![chunk("c1", "France capital is Paris.")], 80);

        let once = aug.augment(&Conversation::default(), draft()).await.unwrap();
        let twice = aug.augment(&Conversation::default(), once).await.unwrap();
        let count = twice.iter().filter(|m| is_retrieved_message(m)).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn rag_mode_parses() {
        assert_eq!("off".parse::<RagMode>().unwrap(), RagMode::Off);
        assert_eq!("Auto".parse::<RagMode>().unwrap(), RagMode::Auto);
        assert_eq!("always".parse::<RagMode>().unwrap(), RagMode::Always);
        assert!("sometimes".parse::<RagMode>().is_err());
    }
}
