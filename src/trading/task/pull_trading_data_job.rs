use tracing::warn;

use crate::error::AppError;
use crate::time_util;
use crate::trading::task::stage::{
    run_stage, FailurePolicy, JobStage, PartitionFailure, StageOutcome, StageReport, StageSpec,
};
use crate::trading::task::JobContext;
use crate::trading::services::job_config_service::JobConfigKey;

/// 拉取当日日线行情。单只股票失败只记录不中断，
/// 全部股票都失败才算阶段失败。
pub async fn run(ctx: &JobContext) -> Result<StageOutcome, AppError> {
    let spec = StageSpec {
        stage: JobStage::PullTradingData,
        circuit_breaker: JobConfigKey::PullTradingDataCircuitBreaker,
        extra_keys: vec![],
        upstream: None,
        last_success: JobConfigKey::LastSuccessPullTradingData,
        failure_policy: FailurePolicy::ReportOnly,
    };

    let config = ctx.config.clone();
    let notifier = ctx.notifier.clone();
    let ctx = ctx.clone();
    run_stage(spec, &config, notifier.as_ref(), move |_configs| async move {
        let target_date = time_util::today();
        let tickers = ctx.stocks.active_tickers().await?;
        let total = tickers.len();

        let mut bars = Vec::with_capacity(total);
        let mut failures = Vec::new();
        // 顺序拉取，保证对行情源的压力与落库顺序都是确定的
        for ticker in &tickers {
            match ctx.market.fetch_daily_bar(ticker, target_date).await {
                Ok(bar) => bars.push(bar),
                Err(e) => {
                    warn!("拉取日线失败: ticker={}, err={}", ticker, e);
                    failures.push(PartitionFailure {
                        partition: ticker.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let saved = ctx.trading_data.save_daily_bars(&bars).await?;
        Ok(StageReport {
            detail: format!(
                "{} 拉取 {}/{} 只股票，落库 {} 行",
                target_date,
                bars.len(),
                total,
                saved
            ),
            total_partitions: total,
            failed_partitions: failures,
        })
    })
    .await
}
