use chrono::Duration;

use crate::error::AppError;
use crate::time_util;
use crate::trading::model::stock::IndustryCode;
use crate::trading::services::job_config_service::JobConfigKey;
use crate::trading::task::inference_job::UPSTREAM_WINDOW_HOURS;
use crate::trading::task::stage::{
    run_stage, FailurePolicy, JobStage, PartitionFailure, StageOutcome, StageReport, StageSpec,
    UpstreamGate,
};
use crate::trading::task::JobContext;

/// 对每个 (行业, 周期) 分区做 top-5 排名。依赖当晚推理成功；
/// 任一分区失败（包括重复排名）即阶段失败。
pub async fn run(ctx: &JobContext) -> Result<StageOutcome, AppError> {
    let spec = StageSpec {
        stage: JobStage::RankPredictions,
        circuit_breaker: JobConfigKey::RankPredictionsCircuitBreaker,
        extra_keys: vec![JobConfigKey::SaveInferencePeriods],
        upstream: Some(UpstreamGate::within_hours(
            JobConfigKey::LastSuccessInference,
            UPSTREAM_WINDOW_HOURS,
        )),
        last_success: JobConfigKey::LastSuccessRank,
        failure_policy: FailurePolicy::FailStage,
    };

    let config = ctx.config.clone();
    let notifier = ctx.notifier.clone();
    let ctx = ctx.clone();
    run_stage(spec, &config, notifier.as_ref(), move |configs| async move {
        let periods = configs[&JobConfigKey::SaveInferencePeriods].as_int_list()?;
        let target_date = time_util::today() + Duration::days(1);

        let mut groups = 0usize;
        let mut total = 0usize;
        let mut failures = Vec::new();
        // 分区之间相互独立，顺序执行保证结果可复现
        for industry in IndustryCode::ALL {
            for &period in &periods {
                total += 1;
                match ctx
                    .ranking
                    .rank_and_save_top_prediction(industry, period, target_date)
                    .await
                {
                    Ok(_) => groups += 1,
                    Err(e) => failures.push(PartitionFailure {
                        partition: format!("{}/period={}/{}", industry.as_str(), period, target_date),
                        error: e.to_string(),
                    }),
                }
            }
        }

        Ok(StageReport {
            detail: format!("{} 生成 {} 个 top-5 分组", target_date, groups),
            total_partitions: total,
            failed_partitions: failures,
        })
    })
    .await
}
