use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::{WriteCommand, WriteQueue};
use crate::database::{RepositoryError, UserRepository};
use crate::models::{UserRecord, UserUpdate};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
}

impl From<RepositoryError> for BackendError {
    fn from(e: RepositoryError) -> Self {
        BackendError::Unavailable(e.to_string())
    }
}

/// 持久化一侧的边界。submit_* 返回是否受理，受理后才允许写缓存或失效缓存。
#[async_trait]
pub trait UserBackend: Send + Sync {
    async fn submit_create(&self, record: &UserRecord) -> Result<bool, BackendError>;

    async fn submit_update(&self, user_id: i64, update: &UserUpdate) -> Result<bool, BackendError>;

    async fn submit_delete(&self, user_id: i64) -> Result<bool, BackendError>;

    async fn fetch(&self, user_id: i64) -> Result<Option<UserRecord>, BackendError>;
}

/// 写走队列、读直接查存储库
pub struct QueuedUserBackend {
    queue: WriteQueue,
    repository: Arc<dyn UserRepository>,
}

impl QueuedUserBackend {
    pub fn new(queue: WriteQueue, repository: Arc<dyn UserRepository>) -> Self {
        Self { queue, repository }
    }
}

#[async_trait]
impl UserBackend for QueuedUserBackend {
    async fn submit_create(&self, record: &UserRecord) -> Result<bool, BackendError> {
        // 已存在的用户不再受理，否则缓存会被一条永远不会落库的快照覆盖
        if self.repository.fetch(record.user_id).await?.is_some() {
            return Ok(false);
        }
        Ok(self.queue.submit(WriteCommand::Create(record.clone())))
    }

    async fn submit_update(&self, user_id: i64, update: &UserUpdate) -> Result<bool, BackendError> {
        // 不存在的用户直接拒绝，路由据此返回 400
        if self.repository.fetch(user_id).await?.is_none() {
            return Ok(false);
        }
        Ok(self.queue.submit(WriteCommand::Update {
            user_id,
            update: update.clone(),
        }))
    }

    async fn submit_delete(&self, user_id: i64) -> Result<bool, BackendError> {
        if self.repository.fetch(user_id).await?.is_none() {
            return Ok(false);
        }
        Ok(self.queue.submit(WriteCommand::Delete { user_id }))
    }

    async fn fetch(&self, user_id: i64) -> Result<Option<UserRecord>, BackendError> {
        Ok(self.repository.fetch(user_id).await?)
    }
}
