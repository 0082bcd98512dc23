extern crate rbatis;

use async_trait::async_trait;
use chrono::NaiveDate;
use rbatis::RBatis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::model::stock::IndustryCode;
use crate::trading::model::PredictionStore;

/// 推理结果的一行：一只股票在 (target_date, period) 上的预测
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPrediction {
    pub stock_ticker: String,
    pub target_date: NaiveDate,
    pub period: i64,
    pub predicted_price: f64,
    pub closing_price: f64,
    pub trading_data_id: Option<i64>,
}

/// 排名候选：已落库预测行的投影
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionCandidate {
    pub prediction_id: i64,
    pub predicted_price: f64,
    pub closing_price: f64,
}

/// 排名结果：回写到 prediction 行的变更
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankAssignment {
    pub prediction_id: i64,
    pub rank: i64,
}

/// 评估用：period=1 的预测与已实现收盘价的配对
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationPair {
    pub stock_ticker: String,
    pub target_date: String,
    pub predicted_price: f64,
    pub actual_close: f64,
}

/// query_decode 用的候选行（rank 列是 MySQL 保留字，全部走手写 SQL）
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CandidateRow {
    prediction_id: i64,
    predicted_price: f64,
    closing_price: f64,
}

pub struct PredictionModel {
    db: &'static RBatis,
}

impl PredictionModel {
    pub async fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

#[async_trait]
impl PredictionStore for PredictionModel {
    async fn save_predictions(&self, rows: &[NewPrediction]) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut query = String::from(
            "insert into prediction \
             (stock_ticker, target_date, period, predicted_price, closing_price, trading_data_id) values ",
        );
        let mut params = Vec::new();
        for row in rows {
            query.push_str("(?, ?, ?, ?, ?, ?),");
            params.push(row.stock_ticker.clone().into());
            params.push(time_util::format_date(row.target_date).into());
            params.push(row.period.into());
            params.push(row.predicted_price.into());
            params.push(row.closing_price.into());
            match row.trading_data_id {
                Some(id) => params.push(id.into()),
                None => params.push(rbs::Value::Null),
            }
        }
        query.pop();

        let data = self.db.exec(&query, params).await?;
        debug!("insert prediction rows: {}", data.rows_affected);
        Ok(data.rows_affected)
    }

    async fn fetch_candidates(
        &self,
        industry: IndustryCode,
        target_date: NaiveDate,
        period: i64,
    ) -> Result<Vec<PredictionCandidate>, AppError> {
        let query = "select p.id as prediction_id, p.predicted_price, p.closing_price \
             from prediction p \
             join stock s on s.ticker = p.stock_ticker \
             where s.industry_code = ? and p.target_date = ? and p.period = ? \
             order by p.id asc";
        let rows: Vec<CandidateRow> = self
            .db
            .query_decode(
                query,
                vec![
                    industry.as_str().to_string().into(),
                    time_util::format_date(target_date).into(),
                    period.into(),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| PredictionCandidate {
                prediction_id: r.prediction_id,
                predicted_price: r.predicted_price,
                closing_price: r.closing_price,
            })
            .collect())
    }

    async fn fetch_evaluation_pairs(
        &self,
        tickers: &[String],
        target_date: NaiveDate,
        days_back: i64,
    ) -> Result<Vec<EvaluationPair>, AppError> {
        if tickers.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; tickers.len()].join(", ");
        let query = format!(
            "select p.stock_ticker, p.target_date, p.predicted_price, t.close as actual_close \
             from prediction p \
             join trading_data t \
               on t.stock_ticker = p.stock_ticker and t.target_date = p.target_date \
             where p.period = 1 \
               and p.stock_ticker in ({}) \
               and p.target_date <= ? \
               and p.target_date > date_sub(?, interval ? day) \
             order by p.stock_ticker, p.target_date asc",
            placeholders
        );
        let mut params: Vec<rbs::Value> = tickers.iter().map(|t| t.clone().into()).collect();
        let last = time_util::format_date(target_date);
        params.push(last.clone().into());
        params.push(last.into());
        params.push(days_back.into());

        let rows: Vec<EvaluationPair> = self.db.query_decode(&query, params).await?;
        Ok(rows)
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let data = self
            .db
            .exec(
                "delete from prediction where target_date < ?",
                vec![time_util::format_date(cutoff).into()],
            )
            .await?;
        debug!("delete prediction rows: {}", data.rows_affected);
        Ok(data.rows_affected)
    }
}
