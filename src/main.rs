use anyhow::Result;
use tracing::info;

use stock_quant::app::bootstrap;
use stock_quant::job::scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::app_init().await?;

    let ctx = bootstrap::build_context().await?;
    let sched = scheduler::init_scheduler().await?;
    scheduler::register_jobs(&sched, ctx).await?;

    tokio::signal::ctrl_c().await?;
    info!("收到关闭信号");
    scheduler::shutdown_scheduler().await?;
    Ok(())
}
