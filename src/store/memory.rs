use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use super::{KvStore, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Counter(i64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内实现，用于测试和单机运行。
///
/// DashMap 的 entry 会锁住所在分片，同一个键上的读改写因此是原子的。
/// 过期是惰性的：访问时发现过期就当作不存在。
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, key: &str, window: Option<Duration>) -> Result<i64, StoreError> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.is_expired(now) {
                    *slot = Slot {
                        value: Value::Counter(1),
                        expires_at: window.map(|w| now + w),
                    };
                    return Ok(1);
                }
                match &mut slot.value {
                    Value::Counter(count) => {
                        *count += 1;
                        Ok(*count)
                    }
                    Value::Bytes(bytes) => {
                        // 与 Redis 一致：对非整数值 INCR 是错误
                        let current = std::str::from_utf8(bytes)
                            .ok()
                            .and_then(|s| s.parse::<i64>().ok())
                            .ok_or_else(|| {
                                StoreError::Unavailable(format!(
                                    "value at {} is not an integer",
                                    key
                                ))
                            })?;
                        slot.value = Value::Counter(current + 1);
                        Ok(current + 1)
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::Counter(1),
                    expires_at: window.map(|w| now + w),
                });
                Ok(1)
            }
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        self.bump(key, None)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(mut slot) = self.slots.get_mut(key) {
            if !slot.is_expired(now) {
                slot.expires_at = Some(now + ttl);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let value = self.slots.get(key).and_then(|slot| {
            if slot.is_expired(now) {
                return None;
            }
            Some(match &slot.value {
                Value::Counter(count) => count.to_string().into_bytes(),
                Value::Bytes(bytes) => bytes.clone(),
            })
        });
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.slots.insert(
            key.to_string(),
            Slot {
                value: Value::Bytes(value.to_vec()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.slots.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self.slots.get(key).and_then(|slot| match slot.expires_at {
            Some(at) if at > now => Some(at - now),
            _ => None,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn increment_window(&self, key: &str, window: Duration) -> Result<i64, StoreError> {
        // 过期时间只在计数新建时写入，窗口内后续自增不会改动它
        self.bump(key, Some(window))
    }
}
