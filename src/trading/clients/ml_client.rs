use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::app_config::env::{env_or_default, env_u64};
use crate::error::AppError;

/// 一只股票的推理输入：截止 target_date 的特征窗口
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockToPredict {
    pub stock_ticker: String,
    pub trading_data_id: Option<i64>,
    pub close: Vec<f64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub volumes: Vec<i64>,
}

/// ML 服务对一只股票的输出；success=false 表示该股票推理失败
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceResult {
    pub stock_ticker: String,
    #[serde(default)]
    pub predicted_price: Vec<f64>,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// 抽象：外部推理服务（远程过程，内部算法不在本仓库范围）
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn run_inference(
        &self,
        stocks: &[StockToPredict],
        days_ahead: i64,
    ) -> Result<Vec<InferenceResult>, AppError>;
}

/// 具体实现：HTTP POST /predict
pub struct MlServerClient {
    client: Client,
    base_url: String,
}

impl MlServerClient {
    pub fn new() -> Self {
        let base_url = env_or_default("ML_SERVER_URL", "http://127.0.0.1:8100");
        let timeout_secs = env_u64("ML_SERVER_TIMEOUT_SECS", 120);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

impl Default for MlServerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceClient for MlServerClient {
    async fn run_inference(
        &self,
        stocks: &[StockToPredict],
        days_ahead: i64,
    ) -> Result<Vec<InferenceResult>, AppError> {
        let url = format!("{}/predict", self.base_url);
        let payload = json!({
            "stocks": stocks,
            "days_ahead": days_ahead,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::MlServerError(e.to_string()))?;

        let status_code = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::MlServerError(e.to_string()))?;
        info!("ml_server /predict: stocks={}, status={}", stocks.len(), status_code);

        if status_code == StatusCode::OK {
            let results: Vec<InferenceResult> = serde_json::from_str(&response_body)
                .map_err(|e| AppError::MlServerError(format!("响应解析失败: {}", e)))?;
            Ok(results)
        } else {
            Err(AppError::MlServerError(format!(
                "请求失败: status={}, body={}",
                status_code, response_body
            )))
        }
    }
}
