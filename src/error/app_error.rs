use thiserror::Error;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 任务配置不存在（必须先写入，才能作为闸门读取）
    #[error("配置不存在: {0}")]
    ConfigNotFound(String),

    /// 配置值无法按 key 的类型解码
    #[error("配置值非法: key={key}, value={value}")]
    ConfigInvalid { key: String, value: String },

    /// 数据库错误
    #[error("数据库错误: {0}")]
    DbError(String),

    /// 缓存错误（调用方记录日志后继续，不向上传播）
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// ML 推理服务错误
    #[error("ML服务错误: {0}")]
    MlServerError(String),

    /// 行情数据源错误
    #[error("行情数据错误: {0}")]
    MarketDataError(String),

    /// 同一 (行业, 日期, 周期) 已有排名结果
    #[error("重复排名: industry={industry}, target_date={target_date}, period={period}")]
    AlreadyRanked {
        industry: String,
        target_date: String,
        period: i64,
    },

    /// 任务阶段失败（聚合分区失败明细）
    #[error("任务失败: stage={stage}, detail={detail}")]
    StageFailed { stage: String, detail: String },

    /// 业务错误
    #[error("业务错误: {0}")]
    BizError(String),
}

impl From<rbatis::Error> for AppError {
    fn from(err: rbatis::Error) -> Self {
        AppError::DbError(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError(err.to_string())
    }
}
