use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use spot_clob::config::Settings;
use spot_clob::driver;
use spot_clob::engine::{self, EngineHandle};
use spot_clob::{MatchingEngine, NewOrder, Side};

fn start() -> (EngineHandle, tokio::task::JoinHandle<MatchingEngine>) {
    engine::spawn(MatchingEngine::from_settings(&Settings::default()), 64)
}

async fn run_script(handle: &EngineHandle, script: &str) -> Vec<Value> {
    let mut out = Vec::new();
    driver::run(handle, script.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn driver_replays_reference_scenario() {
    let (handle, _task) = start();
    let script = r#"
{"type":"order","side":"ask","price":100,"quantity":5,"userId":"1"}
{"type":"order","side":"bid","price":100,"quantity":3,"userId":"2"}
{"type":"balance","userId":"1"}
{"type":"balance","userId":"2"}
{"type":"depth"}
{"type":"quote"}
"#;
    let responses = run_script(&handle, script).await;
    assert_eq!(responses.len(), 6);

    assert_eq!(decimal(&responses[0]["filledQuantity"]), Decimal::ZERO);
    assert_eq!(decimal(&responses[1]["filledQuantity"]), dec!(3));
    assert_eq!(decimal(&responses[2]["GOOGLE"]), dec!(7));
    assert_eq!(decimal(&responses[2]["USD"]), dec!(50300));
    assert_eq!(decimal(&responses[3]["GOOGLE"]), dec!(13));
    assert_eq!(decimal(&responses[3]["USD"]), dec!(49700));

    let depth = &responses[4];
    assert_eq!(depth["bids"], json!([]));
    assert_eq!(decimal(&depth["asks"][0]["price"]), dec!(100));
    assert_eq!(decimal(&depth["asks"][0]["quantity"]), dec!(2));

    assert_eq!(responses[5], json!({ "message": driver::NOT_ENOUGH_DATA }));
}

#[tokio::test]
async fn driver_reports_rejections() {
    let (handle, _task) = start();
    let script = r#"
{"type":"order","side":"bid","price":100,"userId":"1"}
{"type":"order","side":"bid","price":100,"quantity":1,"userId":"nobody"}
{"type":"order","side":"bid","price":1000,"quantity":60,"userId":"1"}
{"type":"order","side":"ask","price":-5,"quantity":1,"userId":"1"}
not json
"#;
    let responses = run_script(&handle, script).await;
    let errors: Vec<_> = responses.iter().map(|r| r["error"].as_str().unwrap()).collect();
    assert_eq!(
        errors,
        vec![
            "missing fields",
            "user not found",
            "insufficient funds",
            "invalid price",
            "malformed request",
        ]
    );
    assert_eq!(handle.depth(None).await.unwrap().bids.len(), 0);
}

#[tokio::test]
async fn unknown_balance_query_is_zeroed() {
    let (handle, _task) = start();
    let responses = run_script(&handle, r#"{"type":"balance","userId":"x"}"#).await;
    assert_eq!(decimal(&responses[0]["GOOGLE"]), Decimal::ZERO);
    assert_eq!(decimal(&responses[0]["USD"]), Decimal::ZERO);
}

#[tokio::test]
async fn quote_reports_touch_and_mid() {
    let (handle, _task) = start();
    handle.submit(NewOrder::new("1", Side::Bid, dec!(98), dec!(1))).await.unwrap();
    handle.submit(NewOrder::new("2", Side::Ask, dec!(101), dec!(1))).await.unwrap();

    let responses = run_script(&handle, r#"{"type":"quote"}"#).await;
    assert_eq!(decimal(&responses[0]["bestBid"]), dec!(98));
    assert_eq!(decimal(&responses[0]["bestAsk"]), dec!(101));
    assert_eq!(decimal(&responses[0]["mid"]), dec!(99.5));
}

#[tokio::test]
async fn depth_levels_limit_each_side() {
    let (handle, _task) = start();
    for price in [dec!(95), dec!(96), dec!(97)] {
        handle.submit(NewOrder::new("1", Side::Bid, price, dec!(1))).await.unwrap();
    }
    let responses = run_script(&handle, r#"{"type":"depth","levels":2}"#).await;
    let bids = responses[0]["bids"].as_array().unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(decimal(&bids[0]["price"]), dec!(97));
}

#[tokio::test]
async fn concurrent_submissions_are_serialized() {
    let (handle, task) = start();
    handle.submit(NewOrder::new("1", Side::Ask, dec!(10), dec!(10))).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.submit(NewOrder::new("2", Side::Bid, dec!(10), dec!(1))).await
        }));
    }
    let mut filled = Decimal::ZERO;
    for task in tasks {
        filled += task.await.unwrap().unwrap().filled_quantity;
    }
    assert_eq!(filled, dec!(10));

    drop(handle);
    let engine = task.await.unwrap();
    assert_eq!(engine.ledger().total("GOOGLE"), dec!(20));
    assert_eq!(engine.ledger().total("USD"), dec!(100000));
    assert_eq!(engine.balances("2")["GOOGLE"], dec!(20));
    assert_eq!(engine.book().level_quantity(Side::Bid, dec!(10)), dec!(10));
    assert!(!engine.book().is_crossed());
}
