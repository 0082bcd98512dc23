use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tracing::{info, warn};

use crate::app_config::{db, log, redis};
use crate::trading::cache::config_cache::{ConfigCache, InMemoryConfigCache, RedisConfigCache};
use crate::trading::clients::discord_client::{DiscordNotifier, NotificationSink};
use crate::trading::clients::market_client::{HttpMarketClient, MarketDataSource};
use crate::trading::clients::ml_client::{InferenceClient, MlServerClient};
use crate::trading::model::job_config::JobConfigModel;
use crate::trading::model::prediction::PredictionModel;
use crate::trading::model::stock::StockModel;
use crate::trading::model::top_prediction::TopPredictionModel;
use crate::trading::model::trading_data::TradingDataModel;
use crate::trading::model::{
    PredictionStore, StockDirectory, TopPredictionStore, TradingDataStore,
};
use crate::trading::services::cleanup_service::CleanupService;
use crate::trading::services::evaluation_service::EvaluationService;
use crate::trading::services::inference_service::InferenceService;
use crate::trading::services::job_config_service::JobConfigService;
use crate::trading::services::ranking_service::RankingService;
use crate::trading::task::JobContext;

/// 应用初始化：环境变量、日志、数据库
pub async fn app_init() -> Result<()> {
    dotenv().ok();
    log::setup_logging().await?;
    db::init_db().await;
    info!("应用初始化完成");
    Ok(())
}

/// 装配任务上下文。Redis 不可达时降级为进程内缓存，
/// 配置读取仍然以 MySQL 为准，不影响正确性。
pub async fn build_context() -> Result<JobContext> {
    let repo = Arc::new(JobConfigModel::new().await);
    let cache: Arc<dyn ConfigCache> = match redis::get_redis_connection().await {
        Ok(conn) => Arc::new(RedisConfigCache::new(conn)),
        Err(e) => {
            warn!("Redis 连接失败，降级为进程内配置缓存: {}", e);
            Arc::new(InMemoryConfigCache::new())
        }
    };
    let notifier: Arc<dyn NotificationSink> = Arc::new(DiscordNotifier::new());
    let config = Arc::new(JobConfigService::new(repo, cache, notifier.clone()));

    let stocks: Arc<dyn StockDirectory> = Arc::new(StockModel::new().await);
    let trading_data: Arc<dyn TradingDataStore> = Arc::new(TradingDataModel::new().await);
    let predictions: Arc<dyn PredictionStore> = Arc::new(PredictionModel::new().await);
    let top_predictions: Arc<dyn TopPredictionStore> = Arc::new(TopPredictionModel::new().await);
    let market: Arc<dyn MarketDataSource> = Arc::new(HttpMarketClient::new());
    let ml: Arc<dyn InferenceClient> = Arc::new(MlServerClient::new());

    let inference = Arc::new(InferenceService::new(
        stocks.clone(),
        trading_data.clone(),
        predictions.clone(),
        ml,
    ));
    let ranking = Arc::new(RankingService::new(
        predictions.clone(),
        top_predictions.clone(),
    ));
    let evaluation = Arc::new(EvaluationService::new(stocks.clone(), predictions.clone()));
    let cleanup = Arc::new(CleanupService::new(
        trading_data.clone(),
        predictions,
        top_predictions,
    ));

    Ok(JobContext {
        config,
        notifier,
        stocks,
        trading_data,
        market,
        inference,
        ranking,
        evaluation,
        cleanup,
    })
}
