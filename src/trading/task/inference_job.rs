use chrono::Duration;
use futures::future::join_all;

use crate::error::AppError;
use crate::time_util;
use crate::trading::model::stock::IndustryCode;
use crate::trading::services::job_config_service::JobConfigKey;
use crate::trading::task::stage::{
    run_stage, FailurePolicy, JobStage, JobStatus, PartitionFailure, StageOutcome, StageReport,
    StageSpec, UpstreamGate,
};
use crate::trading::task::JobContext;

/// 上游 last-success 允许的最大时距（小时）
pub const UPSTREAM_WINDOW_HOURS: i64 = 6;

/// 按行业并行推理并落库。依赖当晚行情拉取成功；
/// 任何一个行业分区失败即阶段失败，已落库的行业不回滚。
pub async fn run(ctx: &JobContext) -> Result<StageOutcome, AppError> {
    let spec = StageSpec {
        stage: JobStage::Inference,
        circuit_breaker: JobConfigKey::RunInferenceCircuitBreaker,
        extra_keys: vec![
            JobConfigKey::RunInferenceDaysBack,
            JobConfigKey::RunInferenceDaysForward,
            JobConfigKey::SaveInferencePeriods,
        ],
        upstream: Some(UpstreamGate::within_hours(
            JobConfigKey::LastSuccessPullTradingData,
            UPSTREAM_WINDOW_HOURS,
        )),
        last_success: JobConfigKey::LastSuccessInference,
        failure_policy: FailurePolicy::FailStage,
    };

    let config = ctx.config.clone();
    let notifier = ctx.notifier.clone();
    let ctx = ctx.clone();
    run_stage(spec, &config, notifier.as_ref(), move |configs| async move {
        let days_back = configs[&JobConfigKey::RunInferenceDaysBack].as_i64()?;
        let days_forward = configs[&JobConfigKey::RunInferenceDaysForward].as_i64()?;
        let periods = configs[&JobConfigKey::SaveInferencePeriods].as_int_list()?;

        ctx.notifier
            .report(
                JobStage::Inference,
                JobStatus::Started,
                &format!("days_back={}, days_forward={}, periods={:?}", days_back, days_forward, periods),
                false,
            )
            .await;

        // 推理面向次日行情
        let target_date = time_util::today() + Duration::days(1);

        let mut handles = Vec::with_capacity(IndustryCode::ALL.len());
        for industry in IndustryCode::ALL {
            let inference = ctx.inference.clone();
            let periods = periods.clone();
            handles.push((
                industry,
                tokio::spawn(async move {
                    inference
                        .run_and_save_inference_for_industry(
                            industry,
                            target_date,
                            days_back,
                            days_forward,
                            &periods,
                        )
                        .await
                }),
            ));
        }

        let total = handles.len();
        let mut saved_rows = 0u64;
        let mut failures = Vec::new();
        for (industry, result) in
            join_all(handles.into_iter().map(|(industry, handle)| async move {
                (industry, handle.await)
            }))
            .await
        {
            match result {
                Ok(Ok(rows)) => saved_rows += rows,
                Ok(Err(e)) => failures.push(PartitionFailure {
                    partition: industry.as_str().to_string(),
                    error: e.to_string(),
                }),
                Err(e) => failures.push(PartitionFailure {
                    partition: industry.as_str().to_string(),
                    error: format!("任务 panic: {}", e),
                }),
            }
        }

        Ok(StageReport {
            detail: format!("{} 推理落库 {} 行预测", target_date, saved_rows),
            total_partitions: total,
            failed_partitions: failures,
        })
    })
    .await
}
