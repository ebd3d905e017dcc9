use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys;
use crate::models::{UserRecord, UserUpdate};
use crate::queue::{BackendError, UserBackend};
use crate::store::{KvStore, StoreError};

/// 写路径的结果
#[derive(Debug)]
pub enum WriteOutcome {
    /// 已受理；cache_error 表示随后的写缓存或失效失败，不影响受理结果
    Accepted { cache_error: Option<StoreError> },
    /// 下游拒绝，缓存未被触碰
    Rejected,
}

impl WriteOutcome {
    fn accepted(cache_result: Result<(), StoreError>) -> Self {
        WriteOutcome::Accepted {
            cache_error: cache_result.err(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("failed to encode cache payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 用户缓存协调器。
///
/// 条目没有版本号：后写覆盖先写，否则等 TTL 到期。缓存与持久化存储之间不保证强一致。
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 命中则原样返回写入时的字节；不会回源
    pub async fn lookup(&self, user_id: i64) -> Result<Option<Vec<u8>>, StoreError> {
        let payload = self.store.get(&keys::user_key(user_id)).await?;
        tracing::debug!(user_id, hit = payload.is_some(), "User cache lookup");
        Ok(payload)
    }

    /// 只能在下游受理创建之后调用
    pub async fn store_on_create(
        &self,
        user_id: i64,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store.set(&keys::user_key(user_id), payload, ttl).await
    }

    pub async fn invalidate(&self, user_id: i64) -> Result<(), StoreError> {
        self.store.delete(&keys::user_key(user_id)).await
    }

    /// 创建并写缓存：先提交下游，受理后才写入缓存
    pub async fn create_through(
        &self,
        backend: &dyn UserBackend,
        record: &UserRecord,
    ) -> Result<WriteOutcome, CacheError> {
        let payload = serde_json::to_vec(record)?;

        if !backend.submit_create(record).await? {
            return Ok(WriteOutcome::Rejected);
        }

        let cached = self
            .store_on_create(record.user_id, &payload, self.ttl)
            .await;
        Ok(WriteOutcome::accepted(cached))
    }

    /// 更新受理后删除缓存条目，避免旧快照一直存活到 TTL 结束
    pub async fn update_through(
        &self,
        backend: &dyn UserBackend,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<WriteOutcome, BackendError> {
        if !backend.submit_update(user_id, update).await? {
            return Ok(WriteOutcome::Rejected);
        }
        Ok(WriteOutcome::accepted(self.invalidate(user_id).await))
    }

    pub async fn delete_through(
        &self,
        backend: &dyn UserBackend,
        user_id: i64,
    ) -> Result<WriteOutcome, BackendError> {
        if !backend.submit_delete(user_id).await? {
            return Ok(WriteOutcome::Rejected);
        }
        Ok(WriteOutcome::accepted(self.invalidate(user_id).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 固定返回 accept 的下游，并记录调用次数
    struct FixedBackend {
        accept: bool,
        fetches: AtomicUsize,
    }

    impl FixedBackend {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UserBackend for FixedBackend {
        async fn submit_create(&self, _: &UserRecord) -> Result<bool, BackendError> {
            Ok(self.accept)
        }

        async fn submit_update(&self, _: i64, _: &UserUpdate) -> Result<bool, BackendError> {
            Ok(self.accept)
        }

        async fn submit_delete(&self, _: i64) -> Result<bool, BackendError> {
            Ok(self.accept)
        }

        async fn fetch(&self, _: i64) -> Result<Option<UserRecord>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn record(user_id: i64) -> UserRecord {
        UserRecord {
            user_id,
            username: "dave".into(),
            email: "dave@example.com".into(),
            phone: None,
            created_at: Utc::now(),
        }
    }

    fn cache() -> UserCache {
        UserCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600))
    }

    #[tokio::test(start_paused = true)]
    async fn created_record_is_served_from_cache_until_ttl() {
        let cache = cache();
        let backend = FixedBackend::new(true);
        let user = record(42);

        let outcome = cache.create_through(&backend, &user).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Accepted { cache_error: None }));

        let cached = cache.lookup(42).await.unwrap().unwrap();
        assert_eq!(cached, serde_json::to_vec(&user).unwrap());
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(cache.lookup(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_create_leaves_cache_empty() {
        let cache = cache();
        let backend = FixedBackend::new(false);

        let outcome = cache.create_through(&backend, &record(1)).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Rejected));
        assert!(cache.lookup(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_on_create_returns_payload_verbatim() {
        let cache = cache();
        let payload = b"{\"user_id\":5,  \"username\":\"spaced\"}";
        cache
            .store_on_create(5, payload, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.lookup(5).await.unwrap().as_deref(), Some(&payload[..]));
    }

    #[tokio::test]
    async fn accepted_update_and_delete_invalidate() {
        let cache = cache();
        let accepting = FixedBackend::new(true);
        cache.create_through(&accepting, &record(8)).await.unwrap();

        let update = UserUpdate {
            username: Some("eve".into()),
            ..Default::default()
        };
        cache.update_through(&accepting, 8, &update).await.unwrap();
        assert!(cache.lookup(8).await.unwrap().is_none());

        cache.create_through(&accepting, &record(8)).await.unwrap();
        cache.delete_through(&accepting, 8).await.unwrap();
        assert!(cache.lookup(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_update_keeps_entry() {
        let cache = cache();
        cache
            .create_through(&FixedBackend::new(true), &record(9))
            .await
            .unwrap();

        let outcome = cache
            .update_through(&FixedBackend::new(false), 9, &UserUpdate::default())
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Rejected));
        assert!(cache.lookup(9).await.unwrap().is_some());
    }
}
