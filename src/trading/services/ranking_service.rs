use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::error::AppError;
use crate::trading::model::prediction::{PredictionCandidate, RankAssignment};
use crate::trading::model::stock::IndustryCode;
use crate::trading::model::{PredictionStore, TopPredictionStore};

/// 每个 (行业, 日期, 周期) 分组保留的名额
pub const TOP_N: usize = 5;

/// 纯排名函数：按 predicted/closing 比值降序取前 TOP_N，名次从 1 起。
/// closing_price 非正时比值记 0，使其稳定沉底而不是除零。
/// 稳定排序保证同比值候选按输入顺序（即 id 升序）出名次。
pub fn rank_predictions(candidates: &[PredictionCandidate]) -> Vec<RankAssignment> {
    let mut scored: Vec<(&PredictionCandidate, f64)> = candidates
        .iter()
        .map(|c| {
            let ratio = if c.closing_price > 0.0 {
                c.predicted_price / c.closing_price
            } else {
                0.0
            };
            (c, ratio)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(TOP_N)
        .enumerate()
        .map(|(i, (c, _))| RankAssignment {
            prediction_id: c.prediction_id,
            rank: (i + 1) as i64,
        })
        .collect()
}

/// 排名服务：拉候选、算名次、一个事务落分组与回写
pub struct RankingService {
    predictions: Arc<dyn PredictionStore>,
    top_predictions: Arc<dyn TopPredictionStore>,
}

impl RankingService {
    pub fn new(
        predictions: Arc<dyn PredictionStore>,
        top_predictions: Arc<dyn TopPredictionStore>,
    ) -> Self {
        Self {
            predictions,
            top_predictions,
        }
    }

    /// 对一个 (行业, 周期, 日期) 分区执行排名并落库，返回 top_prediction 分组 id。
    /// 无候选视为失败：说明上游推理没给这个分区产出。
    pub async fn rank_and_save_top_prediction(
        &self,
        industry: IndustryCode,
        period: i64,
        target_date: NaiveDate,
    ) -> Result<i64, AppError> {
        let candidates = self
            .predictions
            .fetch_candidates(industry, target_date, period)
            .await?;
        if candidates.is_empty() {
            return Err(AppError::BizError(format!(
                "行业 {} 在 {} period={} 没有可排名的预测",
                industry.as_str(),
                target_date,
                period
            )));
        }

        let ranked = rank_predictions(&candidates);
        let group_id = self
            .top_predictions
            .create_top_prediction_and_update_ranks(industry, target_date, period, &ranked)
            .await?;
        info!(
            "排名完成: industry={}, date={}, period={}, 候选={}, 入榜={}",
            industry.as_str(),
            target_date,
            period,
            candidates.len(),
            ranked.len()
        );
        Ok(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, predicted: f64, closing: f64) -> PredictionCandidate {
        PredictionCandidate {
            prediction_id: id,
            predicted_price: predicted,
            closing_price: closing,
        }
    }

    #[test]
    fn ranks_by_ratio_desc_top_five() {
        let candidates = vec![
            candidate(1, 15.0, 10.0), // 1.5
            candidate(2, 9.0, 10.0),  // 0.9
            candidate(3, 20.0, 10.0), // 2.0
            candidate(4, 11.0, 10.0), // 1.1
            candidate(5, 5.0, 0.0),   // 0.0
            candidate(6, 18.0, 10.0), // 1.8
            candidate(7, 10.0, 10.0), // 1.0
        ];
        let ranked = rank_predictions(&candidates);
        let ids: Vec<i64> = ranked.iter().map(|r| r.prediction_id).collect();
        assert_eq!(ids, vec![3, 6, 1, 4, 7]);
        let ranks: Vec<i64> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fewer_candidates_than_quota() {
        let ranked = rank_predictions(&[candidate(9, 12.0, 10.0)]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn empty_input_yields_empty() {
        assert!(rank_predictions(&[]).is_empty());
    }

    #[test]
    fn zero_closing_price_sinks_without_panic() {
        let candidates = vec![
            candidate(1, 100.0, 0.0),
            candidate(2, 1.0, 10.0), // 0.1
        ];
        let ranked = rank_predictions(&candidates);
        assert_eq!(ranked[0].prediction_id, 2);
        assert_eq!(ranked[1].prediction_id, 1);
    }

    #[test]
    fn never_returns_more_than_quota() {
        let candidates: Vec<PredictionCandidate> = (0..5000)
            .map(|i| candidate(i, 10.0 + (i % 97) as f64, 10.0))
            .collect();
        assert_eq!(rank_predictions(&candidates).len(), TOP_N);
    }

    #[test]
    fn deterministic_across_calls() {
        let candidates: Vec<PredictionCandidate> = (0..50)
            .map(|i| candidate(i, (i % 7) as f64 + 1.0, 10.0))
            .collect();
        assert_eq!(rank_predictions(&candidates), rank_predictions(&candidates));
    }

    #[test]
    fn stable_on_equal_ratio() {
        let candidates = vec![
            candidate(10, 10.0, 10.0),
            candidate(11, 20.0, 20.0),
            candidate(12, 30.0, 30.0),
        ];
        let ids: Vec<i64> = rank_predictions(&candidates)
            .iter()
            .map(|r| r.prediction_id)
            .collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }
}
