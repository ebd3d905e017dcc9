//! 共享键值存储
//!
//! 限流计数和用户缓存都依赖这一层。所有操作都是一次网络往返，必须 await。

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
    #[error("shared store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// 原子自增，返回自增后的值
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// 设置（或覆盖）键的过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 剩余存活时间；键不存在或没有过期时间时返回 None
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// 窗口计数：自增，并且只在计数从 0 变为 1 时设置过期时间。
    ///
    /// 默认实现是两次独立调用，两次调用之间崩溃会留下永不过期的计数键。
    /// 后端应当用自身的原子操作覆盖它。
    async fn increment_window(&self, key: &str, window: Duration) -> Result<i64, StoreError> {
        let count = self.increment(key).await?;
        if count == 1 {
            self.expire(key, window).await?;
        }
        Ok(count)
    }
}
