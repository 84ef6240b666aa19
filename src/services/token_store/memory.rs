use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::services::token_store::store::{
    CachedToken, TokenStore, TokenStoreError, TokenStoreResult,
};

/// In-process token store.
///
/// Only suitable for a single instance (development, tests): records are lost
/// on restart and not shared between processes.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore {
    records: Arc<RwLock<HashMap<String, CachedToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically present records, expired ones included.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    #[cfg(test)]
    pub async fn count_for_token(&self, token: &str) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.token == token)
            .count()
    }

    #[cfg(test)]
    pub async fn expire_now(&self, token: &str) {
        if let Some(record) = self.records.write().await.get_mut(token) {
            record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn lookup(&self, token: &str) -> TokenStoreResult<Option<CachedToken>> {
        let records = self.records.read().await;
        let now = Utc::now();

        Ok(records
            .get(token)
            .filter(|record| !record.is_expired_at(now))
            .cloned())
    }

    async fn insert(&self, record: CachedToken) -> TokenStoreResult<()> {
        // Check and insert under one write lock so concurrent inserts of the
        // same token cannot both succeed.
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&record.token)
            && !existing.is_expired_at(Utc::now())
        {
            return Err(TokenStoreError::Conflict);
        }

        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> TokenStoreResult<bool> {
        Ok(self.records.write().await.remove(token).is_some())
    }

    async fn delete_all_by_subject(&self, subject_id: &str) -> TokenStoreResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.subject_id != subject_id);

        Ok((before - records.len()) as u64)
    }

    async fn purge_expired(&self) -> TokenStoreResult<u64> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));

        Ok((before - records.len()) as u64)
    }
}
