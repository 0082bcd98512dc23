pub mod cleanup_job;
pub mod evaluate_job;
pub mod inference_job;
pub mod pull_trading_data_job;
pub mod rank_job;
pub mod stage;

use std::sync::Arc;

use crate::trading::clients::discord_client::NotificationSink;
use crate::trading::clients::market_client::MarketDataSource;
use crate::trading::model::{StockDirectory, TradingDataStore};
use crate::trading::services::cleanup_service::CleanupService;
use crate::trading::services::evaluation_service::EvaluationService;
use crate::trading::services::inference_service::InferenceService;
use crate::trading::services::job_config_service::JobConfigService;
use crate::trading::services::ranking_service::RankingService;

/// 任务运行时依赖的一揽子服务，启动时装配一次
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<JobConfigService>,
    pub notifier: Arc<dyn NotificationSink>,
    pub stocks: Arc<dyn StockDirectory>,
    pub trading_data: Arc<dyn TradingDataStore>,
    pub market: Arc<dyn MarketDataSource>,
    pub inference: Arc<InferenceService>,
    pub ranking: Arc<RankingService>,
    pub evaluation: Arc<EvaluationService>,
    pub cleanup: Arc<CleanupService>,
}
