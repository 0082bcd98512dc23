use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::app_config::env::{env_or_default, env_u64};
use crate::error::AppError;
use crate::time_util;
use crate::trading::model::trading_data::DailyBar;

/// 行情源的交易所后缀（原始票代码 + ".BK"）
const MARKET_SUFFIX: &str = ".BK";

/// 抽象：外部行情数据源，按 (票, 日期) 取一根日线
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<DailyBar, AppError>;
}

#[derive(Debug, Deserialize)]
struct DailyBarResponse {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<i64>,
}

/// 具体实现：HTTP 行情网关
pub struct HttpMarketClient {
    client: Client,
    base_url: String,
}

impl HttpMarketClient {
    pub fn new() -> Self {
        let base_url = env_or_default("MARKET_DATA_URL", "http://127.0.0.1:8200");
        let timeout_secs = env_u64("MARKET_DATA_TIMEOUT_SECS", 30);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

impl Default for HttpMarketClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketClient {
    async fn fetch_daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<DailyBar, AppError> {
        let symbol = format!("{}{}", ticker, MARKET_SUFFIX);
        let url = format!(
            "{}/daily?symbol={}&date={}",
            self.base_url,
            symbol,
            time_util::format_date(date)
        );
        debug!("fetch daily bar: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::MarketDataError(format!("{}: {}", ticker, e)))?;

        let status_code = response.status();
        if status_code != StatusCode::OK {
            return Err(AppError::MarketDataError(format!(
                "{}: status={}",
                ticker, status_code
            )));
        }

        let body: DailyBarResponse = response
            .json()
            .await
            .map_err(|e| AppError::MarketDataError(format!("{}: 响应解析失败: {}", ticker, e)))?;

        match (body.open, body.high, body.low, body.close) {
            (Some(open), Some(high), Some(low), Some(close)) => Ok(DailyBar {
                stock_ticker: ticker.to_string(),
                target_date: date,
                open,
                high,
                low,
                close,
                volumes: body.volume.unwrap_or(0),
            }),
            _ => Err(AppError::MarketDataError(format!(
                "{}: {} 无日线数据",
                ticker,
                time_util::format_date(date)
            ))),
        }
    }
}
