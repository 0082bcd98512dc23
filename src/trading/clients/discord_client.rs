use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::trading::task::stage::{JobStage, JobStatus};

/// 抽象：任务状态上报通道。只许尽力而为：
/// 实现方吞掉自己的传输错误，返回是否送达，调用方不依赖返回值。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn report(&self, stage: JobStage, status: JobStatus, detail: &str, critical: bool)
        -> bool;
    async fn send_message(&self, message: &str, job_name: &str, critical: bool) -> bool;
}

/// 具体实现：Discord webhook
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new() -> Self {
        let webhook_url = env::var("DISCORD_WEBHOOK_URL").unwrap_or_default();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url,
        }
    }

    async fn post(&self, content: String) -> bool {
        if self.webhook_url.is_empty() {
            warn!("DISCORD_WEBHOOK_URL 未配置，丢弃通知: {}", content);
            return false;
        }
        let payload = json!({ "content": content });
        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    true
                } else {
                    warn!("discord webhook 返回非 2xx: {}", status);
                    false
                }
            }
            Err(e) => {
                warn!("discord webhook 请求失败: {}", e);
                false
            }
        }
    }
}

impl Default for DiscordNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn report(
        &self,
        stage: JobStage,
        status: JobStatus,
        detail: &str,
        critical: bool,
    ) -> bool {
        let emoji = match status {
            JobStatus::Started => "🚀",
            JobStatus::Success => "✅",
            JobStatus::Skipped => "⚠️",
            JobStatus::Failed => "❌",
        };
        let alert = if critical { "@everyone " } else { "" };
        let prefix = if critical { "[CRITICAL] " } else { "" };
        let content = format!(
            "{}{}{} [{}] {}: {}",
            alert,
            prefix,
            emoji,
            stage.as_str(),
            status.as_str(),
            detail
        );
        self.post(content).await
    }

    async fn send_message(&self, message: &str, job_name: &str, critical: bool) -> bool {
        let prefix = if critical { "❌ [CRITICAL] " } else { "" };
        let content = format!("{}[{}] {}", prefix, job_name, message);
        self.post(content).await
    }
}
