use rust_decimal::Decimal;

use spot_clob::config::Settings;
use spot_clob::{MatchingEngine, NewOrder, Side};

fn main() -> anyhow::Result<()> {
    let mut engine = MatchingEngine::from_settings(&Settings::default());

    let ask = NewOrder::new("1", Side::Ask, Decimal::from(100), Decimal::from(5));
    let bid = NewOrder::new("2", Side::Bid, Decimal::from(100), Decimal::from(3));

    let r1 = engine.submit(ask)?;
    let r2 = engine.submit(bid)?;

    println!("r1: {r1:?}");
    println!("r2: {r2:?}");
    println!("depth: {:?}", engine.depth(None));
    println!("user 1: {:?}", engine.balances("1"));
    println!("user 2: {:?}", engine.balances("2"));
    Ok(())
}
