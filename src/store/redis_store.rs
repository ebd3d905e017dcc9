use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult, Script, aio::MultiplexedConnection};

use super::{KvStore, StoreError};

/// INCR 与首次 EXPIRE 在服务端一次执行，不会留下没有过期时间的计数键，
/// 也不会在窗口内重置过期时间。
const INCREMENT_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis 实现，所有命令共享一条多路复用连接
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
    increment_window: Script,
}

impl RedisStore {
    /// 建立连接并 PING 一次，启动时就暴露 Redis 不可达的问题
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = match tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
        {
            Ok(conn) => conn?,
            Err(_) => return Err(StoreError::Timeout(timeout)),
        };

        let store = Self {
            conn,
            timeout,
            increment_window: Script::new(INCREMENT_WINDOW_SCRIPT),
        };
        store.ping().await?;
        tracing::info!("Connected to Redis successfully");
        Ok(store)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

impl Drop for RedisStore {
    fn drop(&mut self) {
        tracing::info!("Redis connection closed");
    }
}

/// Redis 的过期时间以秒为单位，不足一秒的按一秒算
fn whole_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let count: i64 = conn.incr(key, 1).await?;
            Ok(count)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let secs = whole_secs(ttl) as i64;
        self.bounded(async move {
            let _: () = conn.expire(key, secs).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let secs = whole_secs(ttl);
        self.bounded(async move {
            let _: () = conn.set_ex(key, value, secs).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: () = conn.del(key).await?;
            Ok(())
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let secs: i64 = self
            .bounded(async move {
                let secs: i64 = conn.ttl(key).await?;
                Ok(secs)
            })
            .await?;
        // -2: 键不存在, -1: 没有过期时间
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn increment_window(&self, key: &str, window: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let secs = whole_secs(window);
        let script = &self.increment_window;
        self.bounded(async move {
            let count: i64 = script.key(key).arg(secs).invoke_async(&mut conn).await?;
            Ok(count)
        })
        .await
    }
}
