#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use stock_quant::error::AppError;
use stock_quant::time_util;
use stock_quant::trading::cache::config_cache::ConfigCache;
use stock_quant::trading::clients::discord_client::NotificationSink;
use stock_quant::trading::clients::market_client::MarketDataSource;
use stock_quant::trading::clients::ml_client::{InferenceClient, InferenceResult, StockToPredict};
use stock_quant::trading::model::job_config::JobConfigEntity;
use stock_quant::trading::model::prediction::{
    EvaluationPair, NewPrediction, PredictionCandidate, RankAssignment,
};
use stock_quant::trading::model::stock::IndustryCode;
use stock_quant::trading::model::trading_data::{DailyBar, TradingDataEntity};
use stock_quant::trading::model::{
    ConfigRepository, PredictionStore, StockDirectory, TopPredictionStore, TradingDataStore,
};
use stock_quant::trading::task::stage::{JobStage, JobStatus};

/// 跨 fake 共享的事件流水，用于断言副作用的先后顺序
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// 进程内配置仓库
pub struct InMemoryConfigRepository {
    rows: Mutex<HashMap<String, String>>,
    fail_upserts: Mutex<bool>,
    log: Option<EventLog>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail_upserts: Mutex::new(false),
            log: None,
        }
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail_upserts: Mutex::new(false),
            log: Some(log),
        }
    }

    /// 让后续 upsert 全部报库错，模拟写水位失败
    pub fn set_fail_upserts(&self, fail: bool) {
        *self.fail_upserts.lock().unwrap() = fail;
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.rows
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.rows.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn fetch_by_key(&self, key: &str) -> Result<Option<JobConfigEntity>, AppError> {
        Ok(self.rows.lock().unwrap().get(key).map(|v| JobConfigEntity {
            config_key: key.to_string(),
            config_value: v.clone(),
            updated_at: None,
        }))
    }

    async fn fetch_by_keys(&self, keys: &[&str]) -> Result<Vec<JobConfigEntity>, AppError> {
        let rows = self.rows.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|k| {
                rows.get(*k).map(|v| JobConfigEntity {
                    config_key: k.to_string(),
                    config_value: v.clone(),
                    updated_at: None,
                })
            })
            .collect())
    }

    async fn upsert(&self, key: &str, value: &str) -> Result<JobConfigEntity, AppError> {
        if *self.fail_upserts.lock().unwrap() {
            return Err(AppError::DbError("连接已断开".to_string()));
        }
        self.rows
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("upsert:{}", key));
        }
        Ok(JobConfigEntity {
            config_key: key.to_string(),
            config_value: value.to_string(),
            updated_at: None,
        })
    }
}

/// 所有操作都报错的缓存，用于验证缓存故障不拖垮调用方
pub struct FailingConfigCache;

#[async_trait]
impl ConfigCache for FailingConfigCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
        Err(AppError::CacheError("连接拒绝".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), AppError> {
        Err(AppError::CacheError("连接拒绝".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), AppError> {
        Err(AppError::CacheError("连接拒绝".to_string()))
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> Result<u64, AppError> {
        Err(AppError::CacheError("连接拒绝".to_string()))
    }
}

/// 记录每次上报的通知通道
pub struct RecordingNotifier {
    pub reports: Mutex<Vec<(JobStage, JobStatus, String, bool)>>,
    pub messages: Mutex<Vec<String>>,
    log: Option<EventLog>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.reports.lock().unwrap().iter().map(|r| r.1).collect()
    }

    pub fn last_detail(&self) -> Option<String> {
        self.reports.lock().unwrap().last().map(|r| r.2.clone())
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn report(
        &self,
        stage: JobStage,
        status: JobStatus,
        detail: &str,
        critical: bool,
    ) -> bool {
        if let Some(log) = &self.log {
            log.lock()
                .unwrap()
                .push(format!("report:{}:{}", stage.as_str(), status.as_str()));
        }
        self.reports
            .lock()
            .unwrap()
            .push((stage, status, detail.to_string(), critical));
        true
    }

    async fn send_message(&self, message: &str, _job_name: &str, _critical: bool) -> bool {
        if let Some(log) = &self.log {
            log.lock().unwrap().push("message".to_string());
        }
        self.messages.lock().unwrap().push(message.to_string());
        true
    }
}

/// 固定映射的股票目录
pub struct InMemoryStocks {
    by_industry: HashMap<IndustryCode, Vec<String>>,
}

impl InMemoryStocks {
    pub fn new(by_industry: HashMap<IndustryCode, Vec<String>>) -> Self {
        Self { by_industry }
    }
}

#[async_trait]
impl StockDirectory for InMemoryStocks {
    async fn active_tickers(&self) -> Result<Vec<String>, AppError> {
        let mut all: Vec<String> = self.by_industry.values().flatten().cloned().collect();
        all.sort();
        Ok(all)
    }

    async fn active_tickers_by_industry(
        &self,
        industry: IndustryCode,
    ) -> Result<Vec<String>, AppError> {
        Ok(self.by_industry.get(&industry).cloned().unwrap_or_default())
    }
}

/// 进程内日线行情表
#[derive(Default)]
pub struct InMemoryTradingDataStore {
    pub rows: Mutex<Vec<TradingDataEntity>>,
}

impl InMemoryTradingDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_bar(&self, ticker: &str, date: NaiveDate, close: f64) {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(TradingDataEntity {
            id: Some(id),
            stock_ticker: ticker.to_string(),
            target_date: time_util::format_date(date),
            open: close,
            high: close,
            low: close,
            close,
            volumes: 1000,
        });
    }
}

#[async_trait]
impl TradingDataStore for InMemoryTradingDataStore {
    async fn save_daily_bars(&self, bars: &[DailyBar]) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        for bar in bars {
            let id = rows.len() as i64 + 1;
            rows.push(TradingDataEntity {
                id: Some(id),
                stock_ticker: bar.stock_ticker.clone(),
                target_date: time_util::format_date(bar.target_date),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volumes: bar.volumes,
            });
        }
        Ok(bars.len() as u64)
    }

    async fn fetch_window(
        &self,
        tickers: &[String],
        last_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<TradingDataEntity>, AppError> {
        let first = last_date - chrono::Duration::days(days_back);
        let mut out: Vec<TradingDataEntity> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                let Some(date) = time_util::parse_date(&r.target_date) else {
                    return false;
                };
                tickers.contains(&r.stock_ticker) && date <= last_date && date > first
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.stock_ticker.as_str(), a.target_date.as_str())
                .cmp(&(b.stock_ticker.as_str(), b.target_date.as_str()))
        });
        Ok(out)
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| match time_util::parse_date(&r.target_date) {
            Some(date) => date >= cutoff,
            None => true,
        });
        Ok((before - rows.len()) as u64)
    }
}

/// 进程内预测表；行业归属由外部映射提供
pub struct InMemoryPredictionStore {
    pub rows: Mutex<Vec<(i64, NewPrediction)>>,
    industry_of: HashMap<String, IndustryCode>,
    /// (ticker, date) -> 已实现收盘价，评估配对用
    actual_closes: Mutex<HashMap<(String, String), f64>>,
}

impl InMemoryPredictionStore {
    pub fn new(industry_of: HashMap<String, IndustryCode>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            industry_of,
            actual_closes: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed_actual_close(&self, ticker: &str, date: NaiveDate, close: f64) {
        self.actual_closes
            .lock()
            .unwrap()
            .insert((ticker.to_string(), time_util::format_date(date)), close);
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn save_predictions(&self, new_rows: &[NewPrediction]) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        for row in new_rows {
            let id = rows.len() as i64 + 1;
            rows.push((id, row.clone()));
        }
        Ok(new_rows.len() as u64)
    }

    async fn fetch_candidates(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
    ) -> Result<Vec<PredictionCandidate>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| {
                self.industry_of.get(&p.stock_ticker) == Some(&industry)
                    && p.target_date == target_date
                    && p.period == period
            })
            .map(|(id, p)| PredictionCandidate {
                prediction_id: *id,
                predicted_price: p.predicted_price,
                closing_price: p.closing_price,
            })
            .collect())
    }

    async fn fetch_evaluation_pairs(
        &self,
        tickers: &[String],
        target_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<EvaluationPair>, AppError> {
        let first = target_date - chrono::Duration::days(days_back);
        let actuals = self.actual_closes.lock().unwrap();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| {
                p.period == 1
                    && tickers.contains(&p.stock_ticker)
                    && p.target_date <= target_date
                    && p.target_date > first
            })
            .filter_map(|(_, p)| {
                let date = time_util::format_date(p.target_date);
                actuals
                    .get(&(p.stock_ticker.clone(), date.clone()))
                    .map(|actual| EvaluationPair {
                        stock_ticker: p.stock_ticker.clone(),
                        target_date: date,
                        predicted_price: p.predicted_price,
                        actual_close: *actual,
                    })
            })
            .collect())
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(_, p)| p.target_date >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

/// 进程内 top_prediction 表
#[derive(Default)]
pub struct InMemoryTopPredictionStore {
    pub groups: Mutex<Vec<(IndustryCode, String, i64, Vec<RankAssignment>)>>,
}

impl InMemoryTopPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TopPredictionStore for InMemoryTopPredictionStore {
    async fn create_top_prediction_and_update_ranks(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
        ranked: &[RankAssignment],
    ) -> Result<i64, AppError> {
        let date_str = time_util::format_date(target_date);
        let mut groups = self.groups.lock().unwrap();
        if groups
            .iter()
            .any(|(i, d, p, _)| *i == industry && *d == date_str && *p == period)
        {
            return Err(AppError::AlreadyRanked {
                industry: industry.as_str().to_string(),
                target_date: date_str,
                period,
            });
        }
        groups.push((industry, date_str, period, ranked.to_vec()));
        Ok(groups.len() as i64)
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let cutoff_str = time_util::format_date(cutoff);
        let mut groups = self.groups.lock().unwrap();
        let before = groups.len();
        groups.retain(|(_, d, _, _)| d.as_str() >= cutoff_str.as_str());
        Ok((before - groups.len()) as u64)
    }
}

/// 固定行情源：可指定失败的股票
pub struct FakeMarket {
    pub closes: HashMap<String, f64>,
    pub fail: Vec<String>,
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn fetch_daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<DailyBar, AppError> {
        if self.fail.contains(&ticker.to_string()) {
            return Err(AppError::MarketDataError(format!("{}: 无日线数据", ticker)));
        }
        let close = self.closes.get(ticker).copied().unwrap_or(10.0);
        Ok(DailyBar {
            stock_ticker: ticker.to_string(),
            target_date: date,
            open: close,
            high: close,
            low: close,
            close,
            volumes: 1000,
        })
    }
}

/// 固定推理服务：按票给预测价数组，可指定失败的票或整体报错
pub struct FakeMl {
    pub predicted: HashMap<String, Vec<f64>>,
    pub fail: Vec<String>,
    pub hard_error: bool,
}

impl FakeMl {
    pub fn ok(predicted: HashMap<String, Vec<f64>>) -> Self {
        Self {
            predicted,
            fail: vec![],
            hard_error: false,
        }
    }
}

#[async_trait]
impl InferenceClient for FakeMl {
    async fn run_inference(
        &self,
        stocks: &[StockToPredict],
        _days_ahead: i64,
    ) -> Result<Vec<InferenceResult>, AppError> {
        if self.hard_error {
            return Err(AppError::MlServerError("请求失败: status=500".to_string()));
        }
        Ok(stocks
            .iter()
            .map(|s| {
                let failed = self.fail.contains(&s.stock_ticker);
                InferenceResult {
                    stock_ticker: s.stock_ticker.clone(),
                    predicted_price: if failed {
                        vec![]
                    } else {
                        self.predicted
                            .get(&s.stock_ticker)
                            .cloned()
                            .unwrap_or_default()
                    },
                    success: !failed,
                    error_message: failed.then(|| "model error".to_string()),
                }
            })
            .collect())
    }
}
