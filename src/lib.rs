pub mod config;
pub mod driver;
pub mod engine;
pub mod ledger;
pub mod matching;
pub mod models;

pub mod metrics;

pub use matching::{MatchingEngine, SubmitError};
pub use models::{Balances, Depth, ExecutionReport, NewOrder, OrderId, Price, Quantity, Quote, Side, UserId};
