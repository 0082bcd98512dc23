use crate::error::AppError;
use crate::time_util;
use crate::trading::services::job_config_service::JobConfigKey;
use crate::trading::task::stage::{
    run_stage, FailurePolicy, JobStage, StageOutcome, StageReport, StageSpec,
};
use crate::trading::task::JobContext;

/// 回看窗口内 period=1 预测的精度评估。
/// 只读任务，没有上游依赖，覆盖不到的股票写进结果而不是报错。
pub async fn run(ctx: &JobContext) -> Result<StageOutcome, AppError> {
    let spec = StageSpec {
        stage: JobStage::Evaluate,
        circuit_breaker: JobConfigKey::EvaluateCircuitBreaker,
        extra_keys: vec![JobConfigKey::EvaluateDaysBack],
        upstream: None,
        last_success: JobConfigKey::LastSuccessEvaluation,
        failure_policy: FailurePolicy::ReportOnly,
    };

    let config = ctx.config.clone();
    let notifier = ctx.notifier.clone();
    let ctx = ctx.clone();
    run_stage(spec, &config, notifier.as_ref(), move |configs| async move {
        let days_back = configs[&JobConfigKey::EvaluateDaysBack].as_i64()?;
        let summary = ctx.evaluation.evaluate(time_util::today(), days_back).await?;

        let mut detail = format!(
            "窗口 {} 天: 覆盖 {} 只, overall MAPE {:.2}%",
            summary.window_days,
            summary.evaluated_count(),
            summary.overall_mape
        );
        if !summary.unmatched.is_empty() {
            detail.push_str(&format!(
                ", 未覆盖 {} 只: {}",
                summary.unmatched.len(),
                summary.unmatched.join(", ")
            ));
        }

        Ok(StageReport::ok(detail, 1))
    })
    .await
}
