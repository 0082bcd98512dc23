extern crate rbatis;

use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::db;
use crate::error::AppError;
use crate::trading::model::ConfigRepository;

/// table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfigEntity {
    pub config_key: String,
    pub config_value: String,
    pub updated_at: Option<rbatis::rbdc::DateTime>,
}

crud!(JobConfigEntity {}, "job_config");
impl_select!(JobConfigEntity{fetch_by_key(config_key: &str) -> Option =>
    "`where config_key = #{config_key} limit 1`"}, "job_config");

pub struct JobConfigModel {
    db: &'static RBatis,
}

impl JobConfigModel {
    pub async fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

#[async_trait]
impl ConfigRepository for JobConfigModel {
    async fn fetch_by_key(&self, key: &str) -> Result<Option<JobConfigEntity>, AppError> {
        let row = JobConfigEntity::fetch_by_key(self.db, key).await?;
        Ok(row)
    }

    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<JobConfigEntity>, AppError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let query = format!(
            "select * from job_config where config_key in ({})",
            placeholders
        );
        let params = keys.iter().map(|k| k.to_string().into()).collect();
        let rows: Vec<JobConfigEntity> = self.db.query_decode(&query, params).await?;
        Ok(rows)
    }

    async fn upsert(&self, key: &str, value: &str) -> Result<JobConfigEntity, AppError> {
        let query = "insert into job_config (config_key, config_value, updated_at) \
             values (?, ?, now()) \
             on duplicate key update config_value = ?, updated_at = now()";
        let data = self
            .db
            .exec(
                query,
                vec![
                    key.to_string().into(),
                    value.to_string().into(),
                    value.to_string().into(),
                ],
            )
            .await?;
        debug!("job_config upsert: key={}, rows={}", key, data.rows_affected);

        let row = JobConfigEntity::fetch_by_key(self.db, key).await?;
        row.ok_or_else(|| AppError::DbError(format!("job_config upsert后读取失败: {}", key)))
    }
}
