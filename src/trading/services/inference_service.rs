use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::AppError;
use crate::trading::clients::ml_client::{InferenceClient, StockToPredict};
use crate::trading::model::prediction::NewPrediction;
use crate::trading::model::stock::IndustryCode;
use crate::trading::model::{PredictionStore, StockDirectory, TradingDataStore};

/// 推理服务：按行业组特征窗口、调远程推理、展开多周期预测并落库
pub struct InferenceService {
    stocks: Arc<dyn StockDirectory>,
    trading_data: Arc<dyn TradingDataStore>,
    predictions: Arc<dyn PredictionStore>,
    ml: Arc<dyn InferenceClient>,
}

impl InferenceService {
    pub fn new(
        stocks: Arc<dyn StockDirectory>,
        trading_data: Arc<dyn TradingDataStore>,
        predictions: Arc<dyn PredictionStore>,
        ml: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            stocks,
            trading_data,
            predictions,
            ml,
        }
    }

    /// 一个行业分区的完整推理：返回落库的预测行数。
    /// 任何一只票推理失败则整个分区失败；已经落库的其他分区不回滚。
    pub async fn run_and_save_inference_for_industry(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        days_back: i64,
        days_forward: i64,
        periods: &[i64],
    ) -> Result<u64, AppError> {
        let tickers = self.stocks.active_tickers_by_industry(industry).await?;
        if tickers.is_empty() {
            info!("行业 {} 没有活跃股票，跳过推理", industry.as_str());
            return Ok(0);
        }

        let window = self
            .trading_data
            .fetch_window(&tickers, target_date, days_back)
            .await?;

        // fetch_window 按 (ticker, date) 升序返回，分桶后桶内天然有序
        let mut by_ticker: BTreeMap<&str, Vec<&crate::trading::model::trading_data::TradingDataEntity>> =
            BTreeMap::new();
        for row in &window {
            by_ticker.entry(row.stock_ticker.as_str()).or_default().push(row);
        }

        let mut payloads = Vec::with_capacity(tickers.len());
        let mut last_close: BTreeMap<String, f64> = BTreeMap::new();
        let mut last_trading_data_id: BTreeMap<String, Option<i64>> = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        for ticker in &tickers {
            let Some(rows) = by_ticker.get(ticker.as_str()) else {
                missing.push(ticker.clone());
                continue;
            };
            // 特征窗口只取最近 days_back 根
            let take = days_back.max(0) as usize;
            let start = rows.len().saturating_sub(take);
            let rows = &rows[start..];
            let last = rows[rows.len() - 1];
            last_close.insert(ticker.clone(), last.close);
            last_trading_data_id.insert(ticker.clone(), last.id);
            payloads.push(StockToPredict {
                stock_ticker: ticker.clone(),
                trading_data_id: last.id,
                close: rows.iter().map(|r| r.close).collect(),
                open: rows.iter().map(|r| r.open).collect(),
                high: rows.iter().map(|r| r.high).collect(),
                low: rows.iter().map(|r| r.low).collect(),
                volumes: rows.iter().map(|r| r.volumes).collect(),
            });
        }
        if !missing.is_empty() {
            return Err(AppError::MlServerError(format!(
                "行业 {} 缺少特征窗口的股票: {}",
                industry.as_str(),
                missing.join(", ")
            )));
        }

        // days_ahead 比业务预测天数多一天，留出 period 从 1 起的偏移
        let results = self.ml.run_inference(&payloads, days_forward + 1).await?;

        let failed: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                warn!(
                    "推理失败: ticker={}, err={}",
                    r.stock_ticker,
                    r.error_message.as_deref().unwrap_or("unknown")
                );
                r.stock_ticker.clone()
            })
            .collect();
        if !failed.is_empty() {
            return Err(AppError::MlServerError(format!(
                "行业 {} 推理失败的股票: {}",
                industry.as_str(),
                failed.join(", ")
            )));
        }

        let mut rows = Vec::new();
        for result in &results {
            let closing_price = last_close
                .get(&result.stock_ticker)
                .copied()
                .unwrap_or(0.0);
            let trading_data_id = last_trading_data_id
                .get(&result.stock_ticker)
                .copied()
                .flatten();
            for &period in periods {
                // 预测数组按天偏移索引，越界的周期直接丢弃
                let idx = period.max(0) as usize;
                if idx >= result.predicted_price.len() {
                    continue;
                }
                rows.push(NewPrediction {
                    stock_ticker: result.stock_ticker.clone(),
                    target_date,
                    period,
                    predicted_price: result.predicted_price[idx],
                    closing_price,
                    trading_data_id,
                });
            }
        }

        let saved = self.predictions.save_predictions(&rows).await?;
        info!(
            "行业 {} 推理落库 {} 行 (股票 {} 只, 周期 {:?})",
            industry.as_str(),
            saved,
            results.len(),
            periods
        );
        Ok(saved)
    }
}
