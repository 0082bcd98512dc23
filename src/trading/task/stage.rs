use std::collections::HashMap;
use std::future::Future;

use chrono::Duration;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::time_util;
use crate::trading::clients::discord_client::NotificationSink;
use crate::trading::services::job_config_service::{ConfigValue, JobConfigKey, JobConfigService};

/// 夜间流水线的五个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    PullTradingData,
    Inference,
    RankPredictions,
    Evaluate,
    Cleanup,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::PullTradingData => "pull_trading_data",
            JobStage::Inference => "inference",
            JobStage::RankPredictions => "rank_predictions",
            JobStage::Evaluate => "evaluate_accuracy",
            JobStage::Cleanup => "cleanup",
        }
    }
}

/// 上报用的任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Started,
    Success,
    Skipped,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Started => "STARTED",
            JobStatus::Success => "SUCCESS",
            JobStatus::Skipped => "SKIPPED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// 一个分区（票 / 行业 / 表）的失败记录
#[derive(Debug, Clone)]
pub struct PartitionFailure {
    pub partition: String,
    pub error: String,
}

/// 阶段主体的执行结果：总分区数与其中失败的分区
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub detail: String,
    pub total_partitions: usize,
    pub failed_partitions: Vec<PartitionFailure>,
}

impl StageReport {
    pub fn ok(detail: String, total_partitions: usize) -> Self {
        Self {
            detail,
            total_partitions,
            failed_partitions: vec![],
        }
    }
}

/// 分区失败如何影响整个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 任一分区失败即阶段失败
    FailStage,
    /// 只报告；全部分区失败才算阶段失败
    ReportOnly,
}

/// 上游新鲜度闸门：依赖阶段的 last-success 必须落在时间窗内
#[derive(Debug, Clone, Copy)]
pub struct UpstreamGate {
    pub last_success: JobConfigKey,
    pub max_age: Duration,
}

impl UpstreamGate {
    pub fn within_hours(last_success: JobConfigKey, hours: i64) -> Self {
        Self {
            last_success,
            max_age: Duration::hours(hours),
        }
    }
}

/// 一个阶段的声明：闸门 key、依赖、失败策略
pub struct StageSpec {
    pub stage: JobStage,
    pub circuit_breaker: JobConfigKey,
    pub extra_keys: Vec<JobConfigKey>,
    pub upstream: Option<UpstreamGate>,
    pub last_success: JobConfigKey,
    pub failure_policy: FailurePolicy,
}

/// 阶段的终态
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Skipped(String),
    Completed(StageReport),
}

fn failure_detail(report: &StageReport) -> String {
    report
        .failed_partitions
        .iter()
        .map(|f| format!("{}: {}", f.partition, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 统一的阶段执行骨架：熔断闸门 -> 上游新鲜度 -> 主体 -> last-success -> 通知。
/// 成功时先写 last-success 再发成功通知；失败与跳过都不写。
pub async fn run_stage<F, Fut>(
    spec: StageSpec,
    config: &JobConfigService,
    notifier: &dyn NotificationSink,
    work: F,
) -> Result<StageOutcome, AppError>
where
    F: FnOnce(HashMap<JobConfigKey, ConfigValue>) -> Fut,
    Fut: Future<Output = Result<StageReport, AppError>>,
{
    let stage = spec.stage;
    let mut keys = vec![spec.circuit_breaker];
    keys.extend(spec.extra_keys.iter().copied());

    let configs = match config.get_many(&keys).await {
        Ok(map) => map,
        Err(e) => {
            error!("[{}] 配置闸门读取失败: {}", stage.as_str(), e);
            notifier
                .report(stage, JobStatus::Failed, &format!("配置读取失败: {}", e), true)
                .await;
            return Err(e);
        }
    };

    let breaker_on = match configs[&spec.circuit_breaker].as_bool() {
        Ok(v) => v,
        Err(e) => {
            error!("[{}] 熔断开关解码失败: {}", stage.as_str(), e);
            notifier
                .report(stage, JobStatus::Failed, &format!("配置读取失败: {}", e), true)
                .await;
            return Err(e);
        }
    };
    if breaker_on {
        let detail = format!("熔断开关 {} 已打开，跳过本次执行", spec.circuit_breaker);
        warn!("[{}] {}", stage.as_str(), detail);
        notifier.report(stage, JobStatus::Skipped, &detail, false).await;
        return Ok(StageOutcome::Skipped(detail));
    }

    if let Some(gate) = spec.upstream {
        match config.get(gate.last_success).await {
            Ok(value) => {
                let last = match value.as_timestamp() {
                    Ok(ts) => ts,
                    Err(e) => {
                        error!("[{}] 上游水位解码失败: {}", stage.as_str(), e);
                        notifier
                            .report(stage, JobStatus::Failed, &format!("上游检查失败: {}", e), true)
                            .await;
                        return Err(e);
                    }
                };
                // last-success 统一按 UTC 写入，比较也用 UTC
                let deadline = chrono::Utc::now().naive_utc() - gate.max_age;
                if last < deadline {
                    let detail = format!(
                        "上游 {} 最近成功于 {}，超出 {} 小时窗口，跳过",
                        gate.last_success,
                        time_util::format_datetime(last),
                        gate.max_age.num_hours()
                    );
                    warn!("[{}] {}", stage.as_str(), detail);
                    notifier.report(stage, JobStatus::Skipped, &detail, false).await;
                    return Ok(StageOutcome::Skipped(detail));
                }
            }
            Err(AppError::ConfigNotFound(_)) => {
                let detail = format!("上游 {} 从未成功过，跳过", gate.last_success);
                warn!("[{}] {}", stage.as_str(), detail);
                notifier.report(stage, JobStatus::Skipped, &detail, false).await;
                return Ok(StageOutcome::Skipped(detail));
            }
            Err(e) => {
                error!("[{}] 上游新鲜度读取失败: {}", stage.as_str(), e);
                notifier
                    .report(stage, JobStatus::Failed, &format!("上游检查失败: {}", e), true)
                    .await;
                return Err(e);
            }
        }
    }

    let report = match work(configs).await {
        Ok(report) => report,
        Err(e) => {
            error!("[{}] 执行失败: {}", stage.as_str(), e);
            notifier.report(stage, JobStatus::Failed, &e.to_string(), true).await;
            return Err(e);
        }
    };

    let failed = report.failed_partitions.len();
    let stage_failed = match spec.failure_policy {
        FailurePolicy::FailStage => failed > 0,
        FailurePolicy::ReportOnly => report.total_partitions > 0 && failed == report.total_partitions,
    };

    if stage_failed {
        let detail = format!(
            "{} ({}/{} 分区失败: {})",
            report.detail,
            failed,
            report.total_partitions,
            failure_detail(&report)
        );
        error!("[{}] {}", stage.as_str(), detail);
        notifier.report(stage, JobStatus::Failed, &detail, true).await;
        return Err(AppError::StageFailed {
            stage: stage.as_str().to_string(),
            detail,
        });
    }

    let detail = if failed > 0 {
        format!(
            "{} (部分失败 {}/{}: {})",
            report.detail,
            failed,
            report.total_partitions,
            failure_detail(&report)
        )
    } else {
        report.detail.clone()
    };

    // 先落 last-success 再发成功通知，保证看到成功消息时水位已经推进
    if let Err(e) = config
        .set(spec.last_success, &time_util::now_datetime_str())
        .await
    {
        error!("[{}] last-success 写入失败: {}", stage.as_str(), e);
        notifier
            .report(stage, JobStatus::Failed, &format!("水位写入失败: {}", e), true)
            .await;
        return Err(e);
    }
    info!("[{}] 成功: {}", stage.as_str(), detail);
    notifier.report(stage, JobStatus::Success, &detail, false).await;
    Ok(StageOutcome::Completed(report))
}
