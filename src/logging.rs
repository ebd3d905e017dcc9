use std::path::Path;

use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 保留的日志文件个数，超出后删除最旧的
const MAX_LOG_FILES: usize = 5;

/// 初始化全局日志。控制台输出总是开启；传入 `log_file` 时再加一层文件输出。
///
/// 返回的 guard 必须存活到进程退出，否则缓冲中的日志会丢失。
pub fn init(log_file: Option<&str>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => match file_writer(Path::new(path)) {
            Ok((writer, guard)) => (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            ),
            Err(e) => {
                // 订阅者还没装好，只能写 stderr
                eprintln!("Failed to open log file {}: {}", path, e);
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// 按天滚动的非阻塞文件写入器，文件名为 `<name>.<yyyy-mm-dd>`
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "user_service.log".to_string());

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
