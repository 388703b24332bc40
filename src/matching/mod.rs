pub mod engine;
pub mod orderbook;

pub use engine::{MatchingEngine, SubmitError};
pub use orderbook::{BookError, OrderBook, RestingOrder};
