use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::services::{
    cache::{CacheClient, CacheError, ValkeyClient},
    token_store::store::{CachedToken, TokenStore, TokenStoreError, TokenStoreResult},
};

/// Valkey-backed token store (Redis protocol)
///
/// Layout:
/// - `<prefix>:token:<token>`   JSON `CachedToken`, `EX` = remaining lifetime
/// - `<prefix>:subject:<uid>`   set of tokens issued to the subject (for logout-all)
///
/// Physical expiry is Valkey's key TTL, so `purge_expired` has nothing to do.
#[derive(Clone)]
pub struct ValkeyTokenStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl ValkeyTokenStore<ValkeyClient> {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = ValkeyClient::new(redis_url).await?;
        Ok(Self::new_with_cache(Arc::new(client), "auth"))
    }
}

impl<C: CacheClient> ValkeyTokenStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}:token:{}", self.prefix, token)
    }

    fn subject_key(&self, subject_id: &str) -> String {
        format!("{}:subject:{}", self.prefix, subject_id)
    }

    async fn read(&self, token: &str) -> TokenStoreResult<Option<CachedToken>> {
        let Some(raw) = self
            .cache
            .get_string(&self.token_key(token))
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let record: CachedToken = serde_json::from_str(&raw)
            .map_err(|e| TokenStoreError::Backend(format!("corrupt token record: {e}")))?;

        Ok(Some(record))
    }
}

fn backend(e: CacheError) -> TokenStoreError {
    TokenStoreError::Backend(e.to_string())
}

#[async_trait]
impl<C: CacheClient> TokenStore for ValkeyTokenStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn lookup(&self, token: &str) -> TokenStoreResult<Option<CachedToken>> {
        // TTL rounding can leave a key alive for up to a second past `expiresAt`.
        let now = Utc::now();
        Ok(self
            .read(token)
            .await?
            .filter(|record| !record.is_expired_at(now)))
    }

    async fn insert(&self, record: CachedToken) -> TokenStoreResult<()> {
        // Nothing to cache once the lifetime is over.
        let Ok(remaining) = (record.expires_at - Utc::now()).to_std() else {
            return Ok(());
        };

        let json = serde_json::to_string(&record)
            .map_err(|e| TokenStoreError::Backend(format!("serialize token record: {e}")))?;

        // Index first: a cached token must always be reachable from logout-all.
        self.cache
            .set_add_with_min_ttl(&self.subject_key(&record.subject_id), &record.token, remaining)
            .await
            .map_err(backend)?;

        let stored = self
            .cache
            .set_if_absent_with_ttl(&self.token_key(&record.token), &json, remaining)
            .await
            .map_err(backend)?;

        if !stored {
            return Err(TokenStoreError::Conflict);
        }

        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> TokenStoreResult<bool> {
        let record = self.read(token).await?;

        let removed = self
            .cache
            .del(&[self.token_key(token)])
            .await
            .map_err(backend)?;

        if let Some(record) = record {
            self.cache
                .set_remove(&self.subject_key(&record.subject_id), token)
                .await
                .map_err(backend)?;
        }

        Ok(removed > 0)
    }

    async fn delete_all_by_subject(&self, subject_id: &str) -> TokenStoreResult<u64> {
        let subject_key = self.subject_key(subject_id);
        let tokens = self.cache.set_members(&subject_key).await.map_err(backend)?;
        if tokens.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = tokens.iter().map(|t| self.token_key(t)).collect();
        let removed = self.cache.del(&keys).await.map_err(backend)?;

        // Only the members read above; a token indexed meanwhile keeps its entry.
        for token in &tokens {
            self.cache
                .set_remove(&subject_key, token)
                .await
                .map_err(backend)?;
        }

        Ok(removed)
    }

    async fn purge_expired(&self) -> TokenStoreResult<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use tokio::sync::Mutex;

    use super::*;
    use crate::services::cache::client::CacheResult;

    /// In-memory stand-in for Valkey (no TTL tracking).
    #[derive(Clone, Default)]
    struct FakeCache {
        strings: Arc<Mutex<HashMap<String, String>>>,
        sets: Arc<Mutex<HashMap<String, HashSet<String>>>>,
        // Set commands fail while true.
        fail_set_ops: Arc<AtomicBool>,
        // Added to the set right after a SMEMBERS snapshot, like a concurrent insert.
        late_member: Arc<Mutex<Option<(String, String)>>>,
    }

    fn set_failure() -> CacheError {
        CacheError::BackendCommand("SADD: connection reset".to_string())
    }

    #[async_trait]
    impl CacheClient for FakeCache {
        fn backend_name(&self) -> &'static str {
            "fake"
        }

        async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
            Ok(self.strings.lock().await.get(key).cloned())
        }

        async fn set_if_absent_with_ttl(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> CacheResult<bool> {
            let mut strings = self.strings.lock().await;
            if strings.contains_key(key) {
                return Ok(false);
            }
            strings.insert(key.to_string(), value.to_string());
            Ok(true)
        }

        async fn del(&self, keys: &[String]) -> CacheResult<u64> {
            let mut strings = self.strings.lock().await;
            let mut sets = self.sets.lock().await;
            let mut n = 0;
            for key in keys {
                if strings.remove(key).is_some() || sets.remove(key).is_some() {
                    n += 1;
                }
            }
            Ok(n)
        }

        async fn set_add_with_min_ttl(
            &self,
            key: &str,
            member: &str,
            _ttl: Duration,
        ) -> CacheResult<()> {
            if self.fail_set_ops.load(Ordering::SeqCst) {
                return Err(set_failure());
            }
            self.sets
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
            Ok(())
        }

        async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
            let mut sets = self.sets.lock().await;
            let members = sets
                .get(key)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();

            if let Some((token, raw)) = self.late_member.lock().await.take() {
                sets.entry(key.to_string()).or_default().insert(token.clone());
                self.strings
                    .lock()
                    .await
                    .insert(format!("auth:token:{token}"), raw);
            }
            Ok(members)
        }

        async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()> {
            if self.fail_set_ops.load(Ordering::SeqCst) {
                return Err(set_failure());
            }
            if let Some(set) = self.sets.lock().await.get_mut(key) {
                set.remove(member);
            }
            Ok(())
        }
    }

    fn record(token: &str, uid: &str, ttl: ChronoDuration) -> CachedToken {
        CachedToken {
            token: token.to_string(),
            subject_id: uid.to_string(),
            subject_name: "Alice".to_string(),
            role: "user".to_string(),
            expires_at: Utc::now() + ttl,
            created_at: Utc::now(),
        }
    }

    fn store() -> (ValkeyTokenStore<FakeCache>, FakeCache) {
        let cache = FakeCache::default();
        (
            ValkeyTokenStore::new_with_cache(Arc::new(cache.clone()), "auth"),
            cache,
        )
    }

    #[tokio::test]
    async fn insert_writes_json_record_and_subject_index() {
        let (store, cache) = store();
        store
            .insert(record("abc", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap();

        let raw = cache.get_string("auth:token:abc").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["uid"], "U1");
        assert_eq!(json["uname"], "Alice");
        assert!(json.get("expiresAt").is_some());

        assert_eq!(
            cache.set_members("auth:subject:U1").await.unwrap(),
            vec!["abc".to_string()]
        );
        assert_eq!(
            store.lookup("abc").await.unwrap().unwrap().subject_id,
            "U1"
        );
    }

    #[tokio::test]
    async fn second_insert_conflicts() {
        let (store, _) = store();
        store
            .insert(record("abc", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap();

        let err = store
            .insert(record("abc", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenStoreError::Conflict));
    }

    #[tokio::test]
    async fn already_expired_record_is_not_written() {
        let (store, cache) = store();
        store
            .insert(record("old", "U1", ChronoDuration::seconds(-5)))
            .await
            .unwrap();

        assert!(cache.get_string("auth:token:old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_and_logout_all() {
        let (store, cache) = store();
        for token in ["t1", "t2", "t3"] {
            store
                .insert(record(token, "U1", ChronoDuration::hours(1)))
                .await
                .unwrap();
        }

        assert!(store.delete_by_token("t1").await.unwrap());
        assert!(!store.delete_by_token("t1").await.unwrap());
        assert_eq!(cache.set_members("auth:subject:U1").await.unwrap().len(), 2);

        assert_eq!(store.delete_all_by_subject("U1").await.unwrap(), 2);
        assert!(store.lookup("t2").await.unwrap().is_none());
        assert!(cache.set_members("auth:subject:U1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_index_write_leaves_token_uncached() {
        let (store, cache) = store();
        cache.fail_set_ops.store(true, Ordering::SeqCst);

        let err = store
            .insert(record("abc", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenStoreError::Backend(_)));

        assert!(cache.get_string("auth:token:abc").await.unwrap().is_none());
        assert!(store.lookup("abc").await.unwrap().is_none());

        // Once the backend recovers the next request caches it normally.
        cache.fail_set_ops.store(false, Ordering::SeqCst);
        store
            .insert(record("abc", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap();
        assert_eq!(store.delete_all_by_subject("U1").await.unwrap(), 1);
        assert!(store.lookup("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_all_keeps_tokens_indexed_after_its_snapshot() {
        let (store, cache) = store();
        store
            .insert(record("t1", "U1", ChronoDuration::hours(1)))
            .await
            .unwrap();

        let late = record("t2", "U1", ChronoDuration::hours(1));
        *cache.late_member.lock().await =
            Some(("t2".to_string(), serde_json::to_string(&late).unwrap()));

        assert_eq!(store.delete_all_by_subject("U1").await.unwrap(), 1);
        assert!(store.lookup("t1").await.unwrap().is_none());

        // The late token is still cached and still reachable by the next logout-all.
        assert_eq!(
            cache.set_members("auth:subject:U1").await.unwrap(),
            vec!["t2".to_string()]
        );
        assert_eq!(store.delete_all_by_subject("U1").await.unwrap(), 1);
        assert!(store.lookup("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_filters_record_past_expiry_still_in_backend() {
        let (store, cache) = store();
        // Valkey rounds TTLs to whole seconds, so a key can outlive `expiresAt`.
        let stale = record("stale", "U1", ChronoDuration::seconds(-1));
        cache.strings.lock().await.insert(
            "auth:token:stale".to_string(),
            serde_json::to_string(&stale).unwrap(),
        );

        assert!(store.lookup("stale").await.unwrap().is_none());
    }
}
