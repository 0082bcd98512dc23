use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::error::AppError;
use crate::trading::model::prediction::EvaluationPair;
use crate::trading::model::{PredictionStore, StockDirectory};

/// 单只股票的评估结果
#[derive(Clone, Debug)]
pub struct TickerAccuracy {
    pub stock_ticker: String,
    pub pairs: usize,
    /// 平均绝对百分比误差
    pub mape: f64,
}

/// 一次评估任务的汇总
#[derive(Clone, Debug)]
pub struct EvaluationSummary {
    pub window_days: i64,
    pub per_ticker: Vec<TickerAccuracy>,
    /// 窗口内没有任何可配对预测的股票
    pub unmatched: Vec<String>,
    /// 全部配对上的总体 MAPE
    pub overall_mape: f64,
}

impl EvaluationSummary {
    pub fn evaluated_count(&self) -> usize {
        self.per_ticker.len()
    }
}

fn abs_pct_error(pair: &EvaluationPair) -> Option<f64> {
    if pair.actual_close == 0.0 {
        return None;
    }
    Some(((pair.predicted_price - pair.actual_close) / pair.actual_close).abs() * 100.0)
}

/// 预测精度评估：period=1 的预测对已实现收盘价
pub struct EvaluationService {
    stocks: Arc<dyn StockDirectory>,
    predictions: Arc<dyn PredictionStore>,
}

impl EvaluationService {
    pub fn new(stocks: Arc<dyn StockDirectory>, predictions: Arc<dyn PredictionStore>) -> Self {
        Self { stocks, predictions }
    }

    pub async fn evaluate(
        &self,
        target_date: NaiveDate,
        days_back: i64,
    ) -> Result<EvaluationSummary, AppError> {
        let tickers = self.stocks.active_tickers().await?;
        let pairs = self
            .predictions
            .fetch_evaluation_pairs(&tickers, target_date, days_back)
            .await?;

        let mut by_ticker: BTreeMap<&str, Vec<&EvaluationPair>> = BTreeMap::new();
        for pair in &pairs {
            by_ticker.entry(pair.stock_ticker.as_str()).or_default().push(pair);
        }

        let mut per_ticker = Vec::new();
        let mut unmatched = Vec::new();
        let mut total_error = 0.0;
        let mut total_pairs = 0usize;
        for ticker in &tickers {
            let Some(ticker_pairs) = by_ticker.get(ticker.as_str()) else {
                unmatched.push(ticker.clone());
                continue;
            };
            let errors: Vec<f64> = ticker_pairs.iter().filter_map(|p| abs_pct_error(p)).collect();
            if errors.is_empty() {
                unmatched.push(ticker.clone());
                continue;
            }
            let sum: f64 = errors.iter().sum();
            total_error += sum;
            total_pairs += errors.len();
            per_ticker.push(TickerAccuracy {
                stock_ticker: ticker.clone(),
                pairs: errors.len(),
                mape: sum / errors.len() as f64,
            });
        }

        let overall_mape = if total_pairs > 0 {
            total_error / total_pairs as f64
        } else {
            0.0
        };
        info!(
            "评估完成: 窗口 {} 天, 覆盖 {} 只, 未覆盖 {} 只, overall_mape={:.2}%",
            days_back,
            per_ticker.len(),
            unmatched.len(),
            overall_mape
        );
        Ok(EvaluationSummary {
            window_days: days_back,
            per_ticker,
            unmatched,
            overall_mape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_error_is_absolute() {
        let pair = EvaluationPair {
            stock_ticker: "AAA".to_string(),
            target_date: "2026-08-20".to_string(),
            predicted_price: 90.0,
            actual_close: 100.0,
        };
        assert!((abs_pct_error(&pair).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_actual_close_is_skipped() {
        let pair = EvaluationPair {
            stock_ticker: "AAA".to_string(),
            target_date: "2026-08-20".to_string(),
            predicted_price: 90.0,
            actual_close: 0.0,
        };
        assert!(abs_pct_error(&pair).is_none());
    }
}
