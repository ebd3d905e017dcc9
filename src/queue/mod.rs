//! 异步写入路径
//!
//! 路由只负责把写命令投递到有界队列，后台任务再把它们落到存储库。
//! 投递成功即视为"已受理"，并不代表已经持久化。

mod backend;
mod worker;

pub use backend::{BackendError, QueuedUserBackend, UserBackend};
pub use worker::{WriteQueue, spawn_worker};

use crate::models::{UserRecord, UserUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum WriteCommand {
    Create(UserRecord),
    Update { user_id: i64, update: UserUpdate },
    Delete { user_id: i64 },
}

impl WriteCommand {
    pub fn user_id(&self) -> i64 {
        match self {
            WriteCommand::Create(record) => record.user_id,
            WriteCommand::Update { user_id, .. } | WriteCommand::Delete { user_id } => *user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteCommand::Create(_) => "create",
            WriteCommand::Update { .. } => "update",
            WriteCommand::Delete { .. } => "delete",
        }
    }
}
