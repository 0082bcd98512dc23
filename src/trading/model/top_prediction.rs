extern crate rbatis;

use async_trait::async_trait;
use chrono::NaiveDate;
use rbatis::executor::RBatisTxExecutor;
use rbatis::RBatis;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::model::prediction::RankAssignment;
use crate::trading::model::stock::IndustryCode;
use crate::trading::model::TopPredictionStore;

/// table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopPredictionEntity {
    pub id: Option<i64>,
    pub industry_code: String,
    pub target_date: String,
    pub period: i64,
    pub created_at: Option<rbatis::rbdc::DateTime>,
}

pub struct TopPredictionModel {
    db: &'static RBatis,
}

impl TopPredictionModel {
    pub async fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }

    /// 事务体：唯一性探测 + 分组插入 + 批量回写 rank
    async fn write_group(
        tx: &RBatisTxExecutor,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
        ranked: &[RankAssignment],
    ) -> Result<i64, AppError> {
        let date_str = time_util::format_date(target_date);

        let count: u64 = tx
            .query_decode(
                "select count(*) from top_prediction \
                 where industry_code = ? and target_date = ? and period = ?",
                vec![
                    industry.as_str().to_string().into(),
                    date_str.clone().into(),
                    period.into(),
                ],
            )
            .await?;
        if count > 0 {
            return Err(AppError::AlreadyRanked {
                industry: industry.as_str().to_string(),
                target_date: date_str,
                period,
            });
        }

        let res = tx
            .exec(
                "insert into top_prediction (industry_code, target_date, period, created_at) \
                 values (?, ?, ?, now())",
                vec![
                    industry.as_str().to_string().into(),
                    date_str.clone().into(),
                    period.into(),
                ],
            )
            .await?;
        let group_id = res
            .last_insert_id
            .as_i64()
            .ok_or_else(|| AppError::DbError("top_prediction 未返回自增 id".to_string()))?;

        // rank 是 MySQL 保留字，必须反引号
        for item in ranked {
            tx.exec(
                "update prediction set `rank` = ?, top_prediction_id = ? where id = ?",
                vec![item.rank.into(), group_id.into(), item.prediction_id.into()],
            )
            .await?;
        }
        Ok(group_id)
    }
}

#[async_trait]
impl TopPredictionStore for TopPredictionModel {
    async fn create_top_prediction_and_update_ranks(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
        ranked: &[RankAssignment],
    ) -> Result<i64, AppError> {
        let tx = self.db.acquire_begin().await?;
        match Self::write_group(&tx, industry, target_date, period, ranked).await {
            Ok(group_id) => {
                tx.commit().await?;
                debug!(
                    "top_prediction created: id={}, industry={}, period={}, links={}",
                    group_id,
                    industry,
                    period,
                    ranked.len()
                );
                Ok(group_id)
            }
            Err(e) => {
                // 分组插入与 rank 回写必须同生共死
                if let Err(rb_err) = tx.rollback().await {
                    error!("top_prediction rollback 失败: {}", rb_err);
                }
                Err(e)
            }
        }
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let data = self
            .db
            .exec(
                "delete from top_prediction where target_date < ?",
                vec![time_util::format_date(cutoff).into()],
            )
            .await?;
        debug!("delete top_prediction rows: {}", data.rows_affected);
        Ok(data.rows_affected)
    }
}
