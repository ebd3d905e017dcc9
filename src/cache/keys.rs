/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 用户缓存键前缀
const USER_PREFIX: &str = "user:";

/// 生成限流计数键
pub fn rate_limit_key(identity: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, identity)
}

/// 生成用户缓存键
pub fn user_key(user_id: i64) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}
