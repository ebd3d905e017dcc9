// 缓存模块
// 用户快照缓存：读优先命中缓存，创建成功受理后写入，更新/删除受理后失效

pub mod keys;
pub mod user;

pub use user::{CacheError, UserCache, WriteOutcome};
