mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use common::{FakeMl, InMemoryPredictionStore, InMemoryStocks, InMemoryTradingDataStore};
use stock_quant::error::AppError;
use stock_quant::trading::model::stock::IndustryCode;
use stock_quant::trading::services::inference_service::InferenceService;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    trading_data: Arc<InMemoryTradingDataStore>,
    predictions: Arc<InMemoryPredictionStore>,
}

fn build(tickers: &[&str], ml: FakeMl) -> (Fixture, InferenceService) {
    let by_industry: HashMap<IndustryCode, Vec<String>> = HashMap::from([(
        IndustryCode::Tech,
        tickers.iter().map(|t| t.to_string()).collect(),
    )]);
    let industry_of: HashMap<String, IndustryCode> = tickers
        .iter()
        .map(|t| (t.to_string(), IndustryCode::Tech))
        .collect();

    let stocks = Arc::new(InMemoryStocks::new(by_industry));
    let trading_data = Arc::new(InMemoryTradingDataStore::new());
    let predictions = Arc::new(InMemoryPredictionStore::new(industry_of));
    let service = InferenceService::new(
        stocks,
        trading_data.clone(),
        predictions.clone(),
        Arc::new(ml),
    );
    (
        Fixture {
            trading_data,
            predictions,
        },
        service,
    )
}

fn seed_window(f: &Fixture, ticker: &str, last_date: NaiveDate, days: i64, last_close: f64) {
    for i in (0..days).rev() {
        let d = last_date - chrono::Duration::days(i + 1);
        // 最后一根收在 last_close，前面的略低
        let close = if i == 0 { last_close } else { last_close - 1.0 };
        f.trading_data.seed_bar(ticker, d, close);
    }
}

#[tokio::test]
async fn saves_one_row_per_ticker_and_period() {
    let target = date(2026, 8, 28);
    let ml = FakeMl::ok(HashMap::from([
        ("A".to_string(), vec![10.0, 11.0, 12.0]),
        ("B".to_string(), vec![20.0, 21.0, 22.0]),
    ]));
    let (f, service) = build(&["A", "B"], ml);
    seed_window(&f, "A", target, 5, 9.0);
    seed_window(&f, "B", target, 5, 19.0);

    let saved = service
        .run_and_save_inference_for_industry(IndustryCode::Tech, target, 5, 2, &[1, 2])
        .await
        .unwrap();
    assert_eq!(saved, 4);

    let rows = f.predictions.rows.lock().unwrap();
    let a1 = rows
        .iter()
        .find(|(_, p)| p.stock_ticker == "A" && p.period == 1)
        .map(|(_, p)| p.clone())
        .unwrap();
    assert_eq!(a1.predicted_price, 11.0);
    assert_eq!(a1.closing_price, 9.0);
    assert_eq!(a1.target_date, target);
    assert!(a1.trading_data_id.is_some());
}

#[tokio::test]
async fn period_beyond_prediction_horizon_is_dropped() {
    let target = date(2026, 8, 28);
    let ml = FakeMl::ok(HashMap::from([("A".to_string(), vec![10.0, 11.0, 12.0])]));
    let (f, service) = build(&["A"], ml);
    seed_window(&f, "A", target, 5, 9.0);

    let saved = service
        .run_and_save_inference_for_industry(IndustryCode::Tech, target, 5, 2, &[1, 5])
        .await
        .unwrap();
    assert_eq!(saved, 1);
    assert_eq!(f.predictions.rows.lock().unwrap()[0].1.period, 1);
}

#[tokio::test]
async fn single_ticker_failure_fails_the_partition() {
    let target = date(2026, 8, 28);
    let mut ml = FakeMl::ok(HashMap::from([("A".to_string(), vec![10.0, 11.0])]));
    ml.fail = vec!["B".to_string()];
    let (f, service) = build(&["A", "B"], ml);
    seed_window(&f, "A", target, 5, 9.0);
    seed_window(&f, "B", target, 5, 19.0);

    let result = service
        .run_and_save_inference_for_industry(IndustryCode::Tech, target, 5, 2, &[1])
        .await;
    match result {
        Err(AppError::MlServerError(message)) => assert!(message.contains("B")),
        other => panic!("期望 MlServerError, 实际 {:?}", other),
    }
    // 失败的分区不落任何行
    assert_eq!(f.predictions.count(), 0);
}

#[tokio::test]
async fn ticker_without_feature_window_fails_the_partition() {
    let target = date(2026, 8, 28);
    let ml = FakeMl::ok(HashMap::from([("A".to_string(), vec![10.0, 11.0])]));
    let (f, service) = build(&["A", "B"], ml);
    seed_window(&f, "A", target, 5, 9.0);
    // B 没有任何行情

    let result = service
        .run_and_save_inference_for_industry(IndustryCode::Tech, target, 5, 2, &[1])
        .await;
    match result {
        Err(AppError::MlServerError(message)) => assert!(message.contains("B")),
        other => panic!("期望 MlServerError, 实际 {:?}", other),
    }
    assert_eq!(f.predictions.count(), 0);
}

#[tokio::test]
async fn industry_without_stocks_is_a_noop() {
    let ml = FakeMl::ok(HashMap::new());
    let (f, service) = build(&[], ml);

    let saved = service
        .run_and_save_inference_for_industry(IndustryCode::Tech, date(2026, 8, 28), 5, 2, &[1])
        .await
        .unwrap();
    assert_eq!(saved, 0);
    assert_eq!(f.predictions.count(), 0);
}
