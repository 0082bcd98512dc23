use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::AppError;

/// 抽象：任务配置缓存层。实现方错误原样返回，
/// 由 JobConfigService 决定吞掉还是上报（缓存不可用不拖垮任务）。
#[async_trait]
pub trait ConfigCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// 按前缀扫描删除，返回删除的 key 数
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, AppError>;
}

/// 具体实现：Redis
pub struct RedisConfigCache {
    conn: MultiplexedConnection,
}

impl RedisConfigCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ConfigCache for RedisConfigCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&keys).await?;
        Ok(keys.len() as u64)
    }
}

/// 具体实现：进程内 HashMap（测试与单机兜底用，不做 TTL 过期）
#[derive(Default)]
pub struct InMemoryConfigCache {
    map: Mutex<HashMap<String, String>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigCache for InMemoryConfigCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), AppError> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, AppError> {
        let mut map = self.map.lock().unwrap();
        let keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            map.remove(key);
        }
        Ok(keys.len() as u64)
    }
}
