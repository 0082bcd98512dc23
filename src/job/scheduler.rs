use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::app_config::env::env_or_default;
use crate::trading::task::{
    cleanup_job, evaluate_job, inference_job, pull_trading_data_job, rank_job, JobContext,
};

/// 全局调度器
pub static SCHEDULER: Lazy<Arc<Mutex<Option<Arc<JobScheduler>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// 初始化并启动调度器
pub async fn init_scheduler() -> Result<Arc<JobScheduler>> {
    let mut scheduler_opt = SCHEDULER.lock().await;

    if scheduler_opt.is_none() {
        let mut scheduler = JobScheduler::new().await?;
        scheduler.start().await?;
        let arc_scheduler = Arc::new(scheduler);
        *scheduler_opt = Some(Arc::clone(&arc_scheduler));
        return Ok(arc_scheduler);
    }

    Ok(Arc::clone(scheduler_opt.as_ref().unwrap()))
}

/// 注册夜间流水线的五个阶段。cron 可用环境变量覆盖，
/// 默认按 拉取 -> 推理 -> 排名 -> 评估 -> 清理 的顺序错峰排布。
pub async fn register_jobs(scheduler: &JobScheduler, ctx: JobContext) -> Result<()> {
    let cron = env_or_default("PULL_TRADING_DATA_CRON", "0 0 18 * * *");
    info!("注册 pull_trading_data: cron={}", cron);
    let job_ctx = ctx.clone();
    scheduler
        .add(Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                if let Err(e) = pull_trading_data_job::run(&ctx).await {
                    error!("pull_trading_data 执行失败: {}", e);
                }
            })
        })?)
        .await?;

    let cron = env_or_default("INFERENCE_CRON", "0 0 19 * * *");
    info!("注册 inference: cron={}", cron);
    let job_ctx = ctx.clone();
    scheduler
        .add(Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                if let Err(e) = inference_job::run(&ctx).await {
                    error!("inference 执行失败: {}", e);
                }
            })
        })?)
        .await?;

    let cron = env_or_default("RANK_PREDICTIONS_CRON", "0 0 20 * * *");
    info!("注册 rank_predictions: cron={}", cron);
    let job_ctx = ctx.clone();
    scheduler
        .add(Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                if let Err(e) = rank_job::run(&ctx).await {
                    error!("rank_predictions 执行失败: {}", e);
                }
            })
        })?)
        .await?;

    let cron = env_or_default("EVALUATE_CRON", "0 30 20 * * *");
    info!("注册 evaluate_accuracy: cron={}", cron);
    let job_ctx = ctx.clone();
    scheduler
        .add(Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                if let Err(e) = evaluate_job::run(&ctx).await {
                    error!("evaluate_accuracy 执行失败: {}", e);
                }
            })
        })?)
        .await?;

    let cron = env_or_default("CLEANUP_CRON", "0 0 21 * * *");
    info!("注册 cleanup: cron={}", cron);
    let job_ctx = ctx;
    scheduler
        .add(Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                if let Err(e) = cleanup_job::run(&ctx).await {
                    error!("cleanup 执行失败: {}", e);
                }
            })
        })?)
        .await?;

    Ok(())
}

/// 关闭调度器
pub async fn shutdown_scheduler() -> Result<()> {
    info!("正在关闭调度器...");

    let scheduler_guard = SCHEDULER.lock().await;
    if let Some(scheduler) = scheduler_guard.as_ref() {
        info!("调度器引用计数: {}", Arc::strong_count(scheduler));
        drop(scheduler_guard);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        info!("调度器关闭完成");
    } else {
        info!("调度器未初始化，跳过关闭");
    }

    Ok(())
}
