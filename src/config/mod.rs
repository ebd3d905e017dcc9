use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 限流存储不可用时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// 放行请求（限流器失效期间存在被滥用的风险）
    Open,
    /// 拒绝请求（限流器失效期间服务整体不可用）
    Closed,
}

impl FromStr for FailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailMode::Open),
            "closed" => Ok(FailMode::Closed),
            other => Err(format!("expected `open` or `closed`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_fail_mode: FailMode,
    pub trust_proxy_headers: bool,
    pub user_cache_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub write_queue_capacity: usize,
    /// 设置后日志同时按天滚动写入该文件
    pub log_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let config = Config {
            database_url: required("DATABASE_URL")?,
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: required("REDIS_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0".to_string())?,
            server_port: optional("SERVER_PORT", 8000)?,
            rate_limit_requests: optional("RATE_LIMIT_REQUESTS", 5)?,
            rate_limit_window_secs: optional("RATE_LIMIT_WINDOW", 60)?,
            rate_limit_fail_mode: optional("RATE_LIMIT_FAIL_MODE", FailMode::Closed)?,
            trust_proxy_headers: optional("RATE_LIMIT_TRUST_PROXY", false)?,
            user_cache_ttl_secs: optional("USER_CACHE_TTL", 3600)?,
            store_timeout_ms: optional("STORE_TIMEOUT_MS", 500)?,
            write_queue_capacity: optional("WRITE_QUEUE_CAPACITY", 1024)?,
            log_file: env::var("LOG_FILE").ok().filter(|path| !path.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// 零值的限额、窗口或 TTL 会让限流和缓存失去意义
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 6] = [
            ("RATE_LIMIT_REQUESTS", self.rate_limit_requests > 0),
            ("RATE_LIMIT_WINDOW", self.rate_limit_window_secs > 0),
            ("USER_CACHE_TTL", self.user_cache_ttl_secs > 0),
            ("STORE_TIMEOUT_MS", self.store_timeout_ms > 0),
            ("WRITE_QUEUE_CAPACITY", self.write_queue_capacity > 0),
            ("DATABASE_MAX_CONNECTIONS", self.database_max_connections > 0),
        ];
        for (name, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
