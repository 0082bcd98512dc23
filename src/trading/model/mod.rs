pub mod job_config;
pub mod prediction;
pub mod stock;
pub mod top_prediction;
pub mod trading_data;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppError;
use crate::trading::model::job_config::JobConfigEntity;
use crate::trading::model::prediction::{
    EvaluationPair, NewPrediction, PredictionCandidate, RankAssignment,
};
use crate::trading::model::stock::IndustryCode;
use crate::trading::model::trading_data::{DailyBar, TradingDataEntity};

/// job_config 表的持久化契约
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn fetch_by_key(&self, key: &str) -> Result<Option<JobConfigEntity>, AppError>;
    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<JobConfigEntity>, AppError>;
    async fn upsert(&self, key: &str, value: &str) -> Result<JobConfigEntity, AppError>;
}

/// 股票目录：活跃股票池与按行业划分
#[async_trait]
pub trait StockDirectory: Send + Sync {
    async fn active_tickers(&self) -> Result<Vec<String>, AppError>;
    async fn active_tickers_by_industry(
        &self,
        industry: IndustryCode,
    ) -> Result<Vec<String>, AppError>;
}

/// 日线行情数据的持久化契约
#[async_trait]
pub trait TradingDataStore: Send + Sync {
    /// 批量落库，一次任务一个 batch
    async fn save_daily_bars(&self, bars: &[DailyBar]) -> Result<u64, AppError>;
    /// 取 last_date 往前 days_back 天内的行情，按 (ticker, date) 升序
    async fn fetch_window(
        &self,
        tickers: &[String],
        last_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<TradingDataEntity>, AppError>;
    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError>;
}

/// prediction 表的持久化契约
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn save_predictions(&self, rows: &[NewPrediction]) -> Result<u64, AppError>;
    /// 某 (行业, 日期, 周期) 下的候选，按插入顺序（id 升序）返回
    async fn fetch_candidates(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
    ) -> Result<Vec<PredictionCandidate>, AppError>;
    /// period=1 的预测与已实现收盘价配对，用于精度评估
    async fn fetch_evaluation_pairs(
        &self,
        tickers: &[String],
        target_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<EvaluationPair>, AppError>;
    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError>;
}

/// top_prediction 表的持久化契约
#[async_trait]
pub trait TopPredictionStore: Send + Sync {
    /// 在一个事务里插入 top_prediction 分组并回写各候选的 rank；
    /// 同一 (行业, 日期, 周期) 已存在分组时返回 AlreadyRanked
    async fn create_top_prediction_and_update_ranks(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
        ranked: &[RankAssignment],
    ) -> Result<i64, AppError>;
    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError>;
}
