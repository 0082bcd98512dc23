use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::error::AppError;
use crate::trading::model::{PredictionStore, TopPredictionStore, TradingDataStore};

/// 三张表各自独立的保留窗口
#[derive(Clone, Copy, Debug)]
pub struct RetentionWindows {
    pub trading_data_days: i64,
    pub prediction_days: i64,
    pub top_prediction_days: i64,
}

/// 一张表的清理结果
#[derive(Clone, Debug)]
pub struct CleanupOutcome {
    pub table: &'static str,
    pub cutoff: NaiveDate,
    pub deleted: u64,
}

/// 历史数据清理：每张表独立删除，互不影响
pub struct CleanupService {
    trading_data: Arc<dyn TradingDataStore>,
    predictions: Arc<dyn PredictionStore>,
    top_predictions: Arc<dyn TopPredictionStore>,
}

impl CleanupService {
    pub fn new(
        trading_data: Arc<dyn TradingDataStore>,
        predictions: Arc<dyn PredictionStore>,
        top_predictions: Arc<dyn TopPredictionStore>,
    ) -> Self {
        Self {
            trading_data,
            predictions,
            top_predictions,
        }
    }

    pub async fn cleanup_trading_data(
        &self,
        today: NaiveDate,
        retention_days: i64,
    ) -> Result<CleanupOutcome, AppError> {
        let cutoff = today - chrono::Duration::days(retention_days);
        let deleted = self.trading_data.delete_older_than(cutoff).await?;
        info!("清理 trading_data: cutoff={}, 删除 {} 行", cutoff, deleted);
        Ok(CleanupOutcome {
            table: "trading_data",
            cutoff,
            deleted,
        })
    }

    pub async fn cleanup_predictions(
        &self,
        today: NaiveDate,
        retention_days: i64,
    ) -> Result<CleanupOutcome, AppError> {
        let cutoff = today - chrono::Duration::days(retention_days);
        let deleted = self.predictions.delete_older_than(cutoff).await?;
        info!("清理 prediction: cutoff={}, 删除 {} 行", cutoff, deleted);
        Ok(CleanupOutcome {
            table: "prediction",
            cutoff,
            deleted,
        })
    }

    pub async fn cleanup_top_predictions(
        &self,
        today: NaiveDate,
        retention_days: i64,
    ) -> Result<CleanupOutcome, AppError> {
        let cutoff = today - chrono::Duration::days(retention_days);
        let deleted = self.top_predictions.delete_older_than(cutoff).await?;
        info!("清理 top_prediction: cutoff={}, 删除 {} 行", cutoff, deleted);
        Ok(CleanupOutcome {
            table: "top_prediction",
            cutoff,
            deleted,
        })
    }
}
