use crate::error::AppError;
use crate::time_util;
use crate::trading::services::job_config_service::JobConfigKey;
use crate::trading::task::stage::{
    run_stage, FailurePolicy, JobStage, JobStatus, PartitionFailure, StageOutcome, StageReport,
    StageSpec,
};
use crate::trading::task::JobContext;

/// 按各自的保留窗口清理三张历史表。
/// 每张表是一个分区，任一张删不掉即阶段失败，其余表照常清理。
pub async fn run(ctx: &JobContext) -> Result<StageOutcome, AppError> {
    let spec = StageSpec {
        stage: JobStage::Cleanup,
        circuit_breaker: JobConfigKey::CleanupCircuitBreaker,
        extra_keys: vec![
            JobConfigKey::CleanupTradingDataDaysBack,
            JobConfigKey::CleanupPredictionsDaysBack,
            JobConfigKey::CleanupTopPredictionsDaysBack,
        ],
        upstream: None,
        last_success: JobConfigKey::LastSuccessCleanup,
        failure_policy: FailurePolicy::FailStage,
    };

    let config = ctx.config.clone();
    let notifier = ctx.notifier.clone();
    let ctx = ctx.clone();
    run_stage(spec, &config, notifier.as_ref(), move |configs| async move {
        let trading_days = configs[&JobConfigKey::CleanupTradingDataDaysBack].as_i64()?;
        let prediction_days = configs[&JobConfigKey::CleanupPredictionsDaysBack].as_i64()?;
        let top_days = configs[&JobConfigKey::CleanupTopPredictionsDaysBack].as_i64()?;

        ctx.notifier
            .report(
                JobStage::Cleanup,
                JobStatus::Started,
                &format!(
                    "保留窗口: trading_data={}d, prediction={}d, top_prediction={}d",
                    trading_days, prediction_days, top_days
                ),
                false,
            )
            .await;

        let today = time_util::today();
        let mut parts = Vec::new();
        let mut failures = Vec::new();

        match ctx.cleanup.cleanup_trading_data(today, trading_days).await {
            Ok(outcome) => parts.push(format!("{} 删 {} 行", outcome.table, outcome.deleted)),
            Err(e) => failures.push(PartitionFailure {
                partition: "trading_data".to_string(),
                error: e.to_string(),
            }),
        }
        match ctx.cleanup.cleanup_predictions(today, prediction_days).await {
            Ok(outcome) => parts.push(format!("{} 删 {} 行", outcome.table, outcome.deleted)),
            Err(e) => failures.push(PartitionFailure {
                partition: "prediction".to_string(),
                error: e.to_string(),
            }),
        }
        match ctx.cleanup.cleanup_top_predictions(today, top_days).await {
            Ok(outcome) => parts.push(format!("{} 删 {} 行", outcome.table, outcome.deleted)),
            Err(e) => failures.push(PartitionFailure {
                partition: "top_prediction".to_string(),
                error: e.to_string(),
            }),
        }

        Ok(StageReport {
            detail: parts.join(", "),
            total_partitions: 3,
            failed_partitions: failures,
        })
    })
    .await
}
