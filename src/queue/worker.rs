use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;

use super::WriteCommand;
use crate::database::UserRepository;

/// 写命令生产者
#[derive(Clone)]
pub struct WriteQueue {
    tx: Sender<WriteCommand>,
}

impl WriteQueue {
    pub fn bounded(capacity: usize) -> (Self, Receiver<WriteCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// 投递命令，队列已满或已关闭时返回 false，不会等待
    pub fn submit(&self, command: WriteCommand) -> bool {
        let user_id = command.user_id();
        let kind = command.kind();
        match self.tx.try_send(command) {
            Ok(()) => {
                tracing::debug!(user_id, kind, "Write command queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id, kind, "Write queue is full, rejecting command");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(user_id, kind, "Write queue is closed, rejecting command");
                false
            }
        }
    }
}

/// 启动写入任务；所有 WriteQueue 被丢弃后，任务处理完剩余命令自行退出
pub fn spawn_worker(
    mut rx: Receiver<WriteCommand>,
    repository: Arc<dyn UserRepository>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            apply(repository.as_ref(), command).await;
        }
        tracing::info!("Write queue drained, worker stopped");
    })
}

async fn apply(repository: &dyn UserRepository, command: WriteCommand) {
    let user_id = command.user_id();
    let kind = command.kind();
    let result = match command {
        WriteCommand::Create(record) => repository.insert(&record).await.map(|_| true),
        WriteCommand::Update { user_id, update } => repository.update(user_id, &update).await,
        WriteCommand::Delete { user_id } => repository.delete(user_id).await,
    };

    match result {
        Ok(true) => tracing::info!(user_id, kind, "Write command persisted"),
        Ok(false) => tracing::warn!(user_id, kind, "Write command matched no user"),
        Err(e) => tracing::error!(user_id, kind, error = %e, "Failed to persist write command"),
    }
}
