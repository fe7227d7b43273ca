//! Fact reconciliation.
//!
//! Keeps the highest-confidence value per key: an incoming candidate only
//! overwrites a stored fact on tie-or-higher confidence. Matching values
//! merge instead of conflict — confidence rises to the max of the two and
//! the timestamp refreshes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use packrat_core::error::MemoryError;
use packrat_core::memory::{FactStore, MemoryCandidate, UserMemoryFact};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Stable fact id: first 16 hex chars of sha-256 over `user_id:key`.
pub fn fact_id(user_id: &str, key: &str) -> String {
    let digest = Sha256::digest(format!("{user_id}:{key}"));
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Outcome counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemoryUpdateResult {
    pub upserted: usize,
    pub skipped: usize,
}

/// Applies extracted candidates against the fact store.
pub struct MemoryManager {
    store: Arc<dyn FactStore>,
}

impl MemoryManager {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }

    pub async fn apply(
        &self,
        user_id: &str,
        source_message_id: &str,
        candidates: &[MemoryCandidate],
    ) -> std::result::Result<MemoryUpdateResult, MemoryError> {
        // Collapse candidates per key; on equal confidence the later wins.
        let mut best: HashMap<&str, &MemoryCandidate> = HashMap::new();
        for c in candidates {
            match best.get(c.key.as_str()) {
                Some(cur) if c.confidence < cur.confidence => {}
                _ => {
                    best.insert(c.key.as_str(), c);
                }
            }
        }

        let existing: HashMap<String, UserMemoryFact> = self
            .store
            .get_facts(user_id)
            .await?
            .into_iter()
            .map(|f| (f.key.clone(), f))
            .collect();

        let mut res = MemoryUpdateResult::default();

        for (key, c) in best {
            let fid = fact_id(user_id, key);

            let Some(old) = existing.get(key) else {
                self.store
                    .upsert_fact(
                        user_id,
                        UserMemoryFact {
                            fact_id: fid,
                            key: key.to_string(),
                            value: c.value.clone(),
                            confidence: c.confidence,
                            updated_at: Utc::now(),
                            source_message_id: source_message_id.to_string(),
                        },
                    )
                    .await?;
                res.upserted += 1;
                continue;
            };

            if old.value.trim() == c.value.trim() {
                // Same observation again — merge confidence, refresh time.
                self.store
                    .upsert_fact(
                        user_id,
                        UserMemoryFact {
                            fact_id: fid,
                            key: key.to_string(),
                            value: old.value.clone(),
                            confidence: old.confidence.max(c.confidence),
                            updated_at: Utc::now(),
                            source_message_id: source_message_id.to_string(),
                        },
                    )
                    .await?;
                res.upserted += 1;
                continue;
            }

            if c.confidence >= old.confidence {
                self.store
                    .upsert_fact(
                        user_id,
                        UserMemoryFact {
                            fact_id: fid,
                            key: key.to_string(),
                            value: c.value.clone(),
                            confidence: c.confidence,
                            updated_at: Utc::now(),
                            source_message_id: source_message_id.to_string(),
                        },
                    )
                    .await?;
                res.upserted += 1;
            } else {
                res.skipped += 1;
            }
        }

        debug!(
            user_id,
            upserted = res.upserted,
            skipped = res.skipped,
            "Reconciled memory candidates"
        );
        Ok(res)
    }
}
