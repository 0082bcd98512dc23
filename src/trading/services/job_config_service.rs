use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::app_config::redis::{config_cache_key, config_cache_ttl_secs, CONFIG_CACHE_PREFIX};
use crate::error::AppError;
use crate::time_util;
use crate::trading::cache::config_cache::ConfigCache;
use crate::trading::clients::discord_client::NotificationSink;
use crate::trading::model::ConfigRepository;

/// 任务配置 key 的封闭枚举。
/// 新增 key 必须同时给出 as_str 与 kind，解码规则由 kind 静态决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobConfigKey {
    PullTradingDataCircuitBreaker,
    LastSuccessPullTradingData,
    RunInferenceCircuitBreaker,
    RunInferenceDaysBack,
    RunInferenceDaysForward,
    SaveInferencePeriods,
    LastSuccessInference,
    RankPredictionsCircuitBreaker,
    LastSuccessRank,
    EvaluateCircuitBreaker,
    EvaluateDaysBack,
    LastSuccessEvaluation,
    CleanupCircuitBreaker,
    CleanupTradingDataDaysBack,
    CleanupPredictionsDaysBack,
    CleanupTopPredictionsDaysBack,
    LastSuccessCleanup,
}

/// key 的静态类别，决定解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 逗号分隔整数列表
    IntList,
    /// 时间戳（RFC-3339 或 "YYYY-MM-DD HH:MM:SS"）
    Timestamp,
    /// 按内容嗅探：bool / 整数 / 原始字符串
    Plain,
}

impl JobConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobConfigKey::PullTradingDataCircuitBreaker => "PULL_TRADING_DATA_CIRCUIT_BREAKER",
            JobConfigKey::LastSuccessPullTradingData => "LAST_SUCCESS_PULL_TRADING_DATA",
            JobConfigKey::RunInferenceCircuitBreaker => "RUN_INFERENCE_CIRCUIT_BREAKER",
            JobConfigKey::RunInferenceDaysBack => "RUN_INFERENCE_DAYS_BACK",
            JobConfigKey::RunInferenceDaysForward => "RUN_INFERENCE_DAYS_FORWARD",
            JobConfigKey::SaveInferencePeriods => "SAVE_INFERENCE_PERIODS",
            JobConfigKey::LastSuccessInference => "LAST_SUCCESS_INFERENCE",
            JobConfigKey::RankPredictionsCircuitBreaker => "RANK_PREDICTIONS_CIRCUIT_BREAKER",
            JobConfigKey::LastSuccessRank => "LAST_SUCCESS_RANK",
            JobConfigKey::EvaluateCircuitBreaker => "EVALUATE_CIRCUIT_BREAKER",
            JobConfigKey::EvaluateDaysBack => "EVALUATE_DAYS_BACK",
            JobConfigKey::LastSuccessEvaluation => "LAST_SUCCESS_EVALUATION",
            JobConfigKey::CleanupCircuitBreaker => "CLEANUP_CIRCUIT_BREAKER",
            JobConfigKey::CleanupTradingDataDaysBack => "CLEANUP_TRADING_DATA_DAYS_BACK",
            JobConfigKey::CleanupPredictionsDaysBack => "CLEANUP_PREDICTIONS_DAYS_BACK",
            JobConfigKey::CleanupTopPredictionsDaysBack => "CLEANUP_TOP_PREDICTIONS_DAYS_BACK",
            JobConfigKey::LastSuccessCleanup => "LAST_SUCCESS_CLEANUP",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            JobConfigKey::SaveInferencePeriods => ValueKind::IntList,
            JobConfigKey::LastSuccessPullTradingData
            | JobConfigKey::LastSuccessInference
            | JobConfigKey::LastSuccessRank
            | JobConfigKey::LastSuccessEvaluation
            | JobConfigKey::LastSuccessCleanup => ValueKind::Timestamp,
            _ => ValueKind::Plain,
        }
    }
}

impl std::fmt::Display for JobConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 解码后的强类型配置值
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    IntList(Vec<i64>),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Result<bool, AppError> {
        match self {
            ConfigValue::Bool(v) => Ok(*v),
            other => Err(AppError::BizError(format!("期望 bool 配置，实际 {:?}", other))),
        }
    }

    pub fn as_i64(&self) -> Result<i64, AppError> {
        match self {
            ConfigValue::Int(v) => Ok(*v),
            other => Err(AppError::BizError(format!("期望整数配置，实际 {:?}", other))),
        }
    }

    pub fn as_int_list(&self) -> Result<Vec<i64>, AppError> {
        match self {
            ConfigValue::IntList(v) => Ok(v.clone()),
            other => Err(AppError::BizError(format!("期望整数列表配置，实际 {:?}", other))),
        }
    }

    pub fn as_timestamp(&self) -> Result<NaiveDateTime, AppError> {
        match self {
            ConfigValue::Timestamp(v) => Ok(*v),
            other => Err(AppError::BizError(format!("期望时间戳配置，实际 {:?}", other))),
        }
    }

    /// 编码回落库用的原始字符串（IntList 与 decode 严格互逆）
    pub fn to_raw(&self) -> String {
        match self {
            ConfigValue::Bool(v) => v.to_string(),
            ConfigValue::Int(v) => v.to_string(),
            ConfigValue::IntList(v) => v
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(","),
            ConfigValue::Timestamp(v) => time_util::format_datetime(*v),
            ConfigValue::Text(v) => v.clone(),
        }
    }
}

/// 解码是 (key, value) 的纯函数，不依赖任何外部状态
pub fn decode_config_value(key: JobConfigKey, raw: &str) -> Result<ConfigValue, AppError> {
    match key.kind() {
        ValueKind::IntList => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(ConfigValue::IntList(vec![]));
            }
            let mut list = Vec::new();
            for part in trimmed.split(',') {
                let n = part.trim().parse::<i64>().map_err(|_| AppError::ConfigInvalid {
                    key: key.as_str().to_string(),
                    value: raw.to_string(),
                })?;
                list.push(n);
            }
            Ok(ConfigValue::IntList(list))
        }
        ValueKind::Timestamp => match time_util::parse_config_timestamp(raw.trim()) {
            Some(ts) => Ok(ConfigValue::Timestamp(ts)),
            None => Err(AppError::ConfigInvalid {
                key: key.as_str().to_string(),
                value: raw.to_string(),
            }),
        },
        ValueKind::Plain => {
            if raw.eq_ignore_ascii_case("true") {
                return Ok(ConfigValue::Bool(true));
            }
            if raw.eq_ignore_ascii_case("false") {
                return Ok(ConfigValue::Bool(false));
            }
            if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = raw.parse::<i64>() {
                    return Ok(ConfigValue::Int(n));
                }
            }
            Ok(ConfigValue::Text(raw.to_string()))
        }
    }
}

/// 任务配置存取：MySQL 为准、Redis 旁路缓存、写后失效。
/// 配置闸门宁可读到旧值也不能读到错值，所以不做 write-through。
pub struct JobConfigService {
    repo: Arc<dyn ConfigRepository>,
    cache: Arc<dyn ConfigCache>,
    notifier: Arc<dyn NotificationSink>,
}

impl JobConfigService {
    pub fn new(
        repo: Arc<dyn ConfigRepository>,
        cache: Arc<dyn ConfigCache>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repo,
            cache,
            notifier,
        }
    }

    pub async fn get(&self, key: JobConfigKey) -> Result<ConfigValue, AppError> {
        let cache_key = config_cache_key(key.as_str());
        match self.cache.get(&cache_key).await {
            Ok(Some(cached)) => return decode_config_value(key, &cached),
            Ok(None) => {}
            Err(e) => warn!("配置缓存读取失败，回源: key={}, err={}", key, e),
        }

        let row = self
            .repo
            .fetch_by_key(key.as_str())
            .await?
            .ok_or_else(|| AppError::ConfigNotFound(key.as_str().to_string()))?;

        // 旁路缓存：回源后回填
        if let Err(e) = self
            .cache
            .set_ex(&cache_key, &row.config_value, config_cache_ttl_secs())
            .await
        {
            warn!("配置缓存回填失败: key={}, err={}", key, e);
        }
        decode_config_value(key, &row.config_value)
    }

    /// 全有或全无：任何一个 key 缺失则整体失败，不返回半张配置表
    pub async fn get_many(
        &self,
        keys: &[JobConfigKey],
    ) -> Result<HashMap<JobConfigKey, ConfigValue>, AppError> {
        let raw_keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let rows = self.repo.fetch_by_keys(&raw_keys).await?;

        let by_key: HashMap<&str, &str> = rows
            .iter()
            .map(|r| (r.config_key.as_str(), r.config_value.as_str()))
            .collect();

        let missing: Vec<&str> = keys
            .iter()
            .map(|k| k.as_str())
            .filter(|k| !by_key.contains_key(k))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ConfigNotFound(missing.join(", ")));
        }

        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw = by_key[key.as_str()];
            result.insert(*key, decode_config_value(*key, raw)?);
        }
        Ok(result)
    }

    pub async fn set(&self, key: JobConfigKey, raw_value: &str) -> Result<ConfigValue, AppError> {
        let row = self.repo.upsert(key.as_str(), raw_value).await?;

        self.invalidate(key).await;

        // 配置变更通知只许尽力而为
        self.notifier
            .send_message(
                &format!("🔧 Job config `{}` updated to `{}`", key, raw_value),
                "Config Update",
                false,
            )
            .await;

        decode_config_value(key, &row.config_value)
    }

    /// 幂等；缓存不可达时记日志继续，绝不让调用方失败
    pub async fn invalidate(&self, key: JobConfigKey) {
        let cache_key = config_cache_key(key.as_str());
        if let Err(e) = self.cache.delete(&cache_key).await {
            warn!("配置缓存失效失败: key={}, err={}", key, e);
        }
    }

    pub async fn invalidate_all(&self) {
        match self.cache.delete_by_prefix(CONFIG_CACHE_PREFIX).await {
            Ok(count) => info!("✅ 已失效 {} 个配置缓存 key", count),
            Err(e) => warn!("配置缓存整体失效失败: {}", e),
        }
    }
}
