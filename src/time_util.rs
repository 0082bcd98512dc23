use chrono::{NaiveDate, NaiveDateTime, Utc};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 当前 UTC 时间（秒精度字符串），作为 last-success 时间戳写入配置
pub fn now_datetime_str() -> String {
    Utc::now().naive_utc().format(DATETIME_FORMAT).to_string()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// 解析时间戳类配置值：先按 RFC-3339，再退回 "YYYY-MM-DD HH:MM:SS[.ffffff]"
pub fn parse_config_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).ok()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}
