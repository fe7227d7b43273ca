//! In-memory fact store — for tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use packrat_core::error::MemoryError;
use packrat_core::memory::{FactStore, UserMemoryFact};
use tokio::sync::RwLock;

/// HashMap-backed store: user_id → (fact_id → fact). Nothing survives the
/// process.
#[derive(Default)]
pub struct InMemoryFactStore {
    users: RwLock<HashMap<String, HashMap<String, UserMemoryFact>>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn get_facts(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<UserMemoryFact>, MemoryError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|facts| facts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_fact(
        &self,
        user_id: &str,
        fact: UserMemoryFact,
    ) -> std::result::Result<(), MemoryError> {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_default()
            .insert(fact.fact_id.clone(), fact);
        Ok(())
    }

    async fn delete_fact(
        &self,
        user_id: &str,
        fact_id: &str,
    ) -> std::result::Result<bool, MemoryError> {
        let mut users = self.users.write().await;
        Ok(users
            .get_mut(user_id)
            .and_then(|facts| facts.remove(fact_id))
            .is_some())
    }

    async fn delete_by_key(
        &self,
        user_id: &str,
        key: &str,
    ) -> std::result::Result<usize, MemoryError> {
        let mut users = self.users.write().await;
        let Some(facts) = users.get_mut(user_id) else {
            return Ok(0);
        };
        let before = facts.len();
        facts.retain(|_, f| f.key != key);
        Ok(before - facts.len())
    }

    async fn clear(&self, user_id: &str) -> std::result::Result<(), MemoryError> {
        let mut users = self.users.write().await;
        users.insert(user_id.to_string(), HashMap::new());
        Ok(())
    }
}
