extern crate rbatis;

use async_trait::async_trait;
use chrono::NaiveDate;
use rbatis::{crud, RBatis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::model::TradingDataStore;

/// 某只股票某天的日线行情（外部行情源抓取的结果）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyBar {
    pub stock_ticker: String,
    pub target_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volumes: i64,
}

/// table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingDataEntity {
    pub id: Option<i64>,
    pub stock_ticker: String,
    pub target_date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volumes: i64,
}

crud!(TradingDataEntity {}, "trading_data");

pub struct TradingDataModel {
    db: &'static RBatis,
}

impl TradingDataModel {
    pub async fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

#[async_trait]
impl TradingDataStore for TradingDataModel {
    async fn save_daily_bars(&self, bars: &[DailyBar]) -> Result<u64, AppError> {
        if bars.is_empty() {
            return Ok(0);
        }
        // 构建批量插入的 SQL 语句
        let mut query = String::from(
            "insert into trading_data (stock_ticker, target_date, open, high, low, close, volumes) values ",
        );
        let mut params = Vec::new();
        for bar in bars {
            query.push_str("(?, ?, ?, ?, ?, ?, ?),");
            params.push(bar.stock_ticker.clone().into());
            params.push(time_util::format_date(bar.target_date).into());
            params.push(bar.open.into());
            params.push(bar.high.into());
            params.push(bar.low.into());
            params.push(bar.close.into());
            params.push(bar.volumes.into());
        }
        query.pop();

        let data = self.db.exec(&query, params).await?;
        debug!("insert trading_data rows: {}", data.rows_affected);
        Ok(data.rows_affected)
    }

    async fn fetch_window(
        &self,
        tickers: &[String],
        last_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<TradingDataEntity>, AppError> {
        if tickers.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; tickers.len()].join(", ");
        let query = format!(
            "select * from trading_data \
             where stock_ticker in ({}) \
               and target_date <= ? \
               and target_date > date_sub(?, interval ? day) \
             order by stock_ticker, target_date asc",
            placeholders
        );
        let mut params: Vec<rbs::Value> = tickers.iter().map(|t| t.clone().into()).collect();
        let last = time_util::format_date(last_date);
        params.push(last.clone().into());
        params.push(last.into());
        params.push(days_back.into());

        let rows: Vec<TradingDataEntity> = self.db.query_decode(&query, params).await?;
        Ok(rows)
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let data = self
            .db
            .exec(
                "delete from trading_data where target_date < ?",
                vec![time_util::format_date(cutoff).into()],
            )
            .await?;
        debug!("delete trading_data rows: {}", data.rows_affected);
        Ok(data.rows_affected)
    }
}
