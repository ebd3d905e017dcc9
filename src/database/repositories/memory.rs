use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::database::{RepositoryError, UserRepository};
use crate::models::{UserRecord, UserUpdate};

/// 进程内用户存储库，用于测试和不接数据库的本地运行
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: DashMap<i64, UserRecord>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), RepositoryError> {
        match self.users.entry(record.user_id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(record.user_id)),
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, user_id: i64, update: &UserUpdate) -> Result<bool, RepositoryError> {
        Ok(match self.users.get_mut(&user_id) {
            Some(mut record) => {
                update.apply_to(&mut record);
                true
            }
            None => false,
        })
    }

    async fn delete(&self, user_id: i64) -> Result<bool, RepositoryError> {
        Ok(self.users.remove(&user_id).is_some())
    }

    async fn fetch(&self, user_id: i64) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self.users.get(&user_id).map(|record| record.clone()))
    }
}
