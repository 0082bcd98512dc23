extern crate rbatis;

use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};

use crate::app_config::db;
use crate::error::AppError;
use crate::trading::model::StockDirectory;

/// 行业板块（沿用交易所的八个行业分类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndustryCode {
    Agro,
    Consumer,
    Financials,
    Industrials,
    Property,
    Resources,
    Services,
    Tech,
}

impl IndustryCode {
    pub const ALL: [IndustryCode; 8] = [
        IndustryCode::Agro,
        IndustryCode::Consumer,
        IndustryCode::Financials,
        IndustryCode::Industrials,
        IndustryCode::Property,
        IndustryCode::Resources,
        IndustryCode::Services,
        IndustryCode::Tech,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndustryCode::Agro => "agro_food_industry",
            IndustryCode::Consumer => "consumer_products",
            IndustryCode::Financials => "financials",
            IndustryCode::Industrials => "industrials",
            IndustryCode::Property => "property_construction",
            IndustryCode::Resources => "resources",
            IndustryCode::Services => "services",
            IndustryCode::Tech => "technology",
        }
    }
}

impl std::fmt::Display for IndustryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockEntity {
    pub ticker: String,
    pub stock_name: Option<String>,
    pub industry_code: String,
    pub is_active: i32,
}

crud!(StockEntity {}, "stock");
impl_select!(StockEntity{fetch_active() => "`where is_active = 1 order by ticker`"}, "stock");
impl_select!(StockEntity{fetch_active_by_industry(industry_code: &str) =>
    "`where is_active = 1 and industry_code = #{industry_code} order by ticker`"}, "stock");

pub struct StockModel {
    db: &'static RBatis,
}

impl StockModel {
    pub async fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

#[async_trait]
impl StockDirectory for StockModel {
    async fn active_tickers(&self) -> Result<Vec<String>, AppError> {
        let rows = StockEntity::fetch_active(self.db).await?;
        Ok(rows.into_iter().map(|s| s.ticker).collect())
    }

    async fn active_tickers_by_industry(
        &self,
        industry: IndustryCode,
    ) -> Result<Vec<String>, AppError> {
        let rows = StockEntity::fetch_active_by_industry(self.db, industry.as_str()).await?;
        Ok(rows.into_iter().map(|s| s.ticker).collect())
    }
}
