// 持久化存储
// 写入由 queue 模块的后台任务异步完成，读取由路由在缓存未命中时直接发起

pub mod repositories;

pub use repositories::memory::MemoryUserRepository;
pub use repositories::user::PgUserRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{UserRecord, UserUpdate};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("user {0} already exists")]
    Conflict(i64),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 建表（已存在则跳过）
    async fn ensure_schema(&self) -> Result<(), RepositoryError>;

    async fn insert(&self, record: &UserRecord) -> Result<(), RepositoryError>;

    /// 返回是否有记录被更新
    async fn update(&self, user_id: i64, update: &UserUpdate) -> Result<bool, RepositoryError>;

    /// 返回是否有记录被删除
    async fn delete(&self, user_id: i64) -> Result<bool, RepositoryError>;

    async fn fetch(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError>;
}
