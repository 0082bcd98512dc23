use std::env;

use anyhow::Result;
use redis::aio::MultiplexedConnection;
use redis::Client;

/// Get a Redis multiplexed async connection using REDIS_HOST from env
pub async fn get_redis_connection() -> Result<MultiplexedConnection> {
    let url = env::var("REDIS_HOST").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let client = Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

/// 任务配置缓存 key 前缀
pub const CONFIG_CACHE_PREFIX: &str = "config:";

pub fn config_cache_key(key: &str) -> String {
    format!("{}{}", CONFIG_CACHE_PREFIX, key)
}

/// TTL for cached job config entries, seconds
pub fn config_cache_ttl_secs() -> u64 {
    crate::app_config::env::env_u64("CONFIG_CACHE_TTL_SECS", 300)
}
