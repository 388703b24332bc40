use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::matching::SubmitError;

pub type UserId = String;
pub type OrderId = u64;
pub type Asset = String;
pub type Price = Decimal;
pub type Quantity = Decimal;

/// Holdings per asset symbol.
pub type Balances = BTreeMap<Asset, Decimal>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }

    /// Whether an incoming order on this side at `limit` trades against a resting
    /// order priced at `resting`.
    pub fn crosses(self, limit: Price, resting: Price) -> bool {
        match self {
            Self::Bid => resting <= limit,
            Self::Ask => resting >= limit,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// A validated limit order entering the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl NewOrder {
    pub fn new(user_id: impl Into<UserId>, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            user_id: user_id.into(),
            side,
            price,
            quantity,
        }
    }
}

/// Order submission as it arrives at the boundary; every field may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub side: Option<Side>,
    pub price: Option<Price>,
    pub quantity: Option<Quantity>,
    pub user_id: Option<UserId>,
}

impl TryFrom<OrderRequest> for NewOrder {
    type Error = SubmitError;

    fn try_from(value: OrderRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            side: value.side.ok_or(SubmitError::MissingField("side"))?,
            price: value.price.ok_or(SubmitError::MissingField("price"))?,
            quantity: value.quantity.ok_or(SubmitError::MissingField("quantity"))?,
            user_id: value.user_id.ok_or(SubmitError::MissingField("userId"))?,
        })
    }
}

/// One execution between the incoming order and a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,
    pub taker_side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl Fill {
    pub fn buyer(&self) -> &str {
        match self.taker_side {
            Side::Bid => &self.taker_user_id,
            Side::Ask => &self.maker_user_id,
        }
    }

    pub fn seller(&self) -> &str {
        match self.taker_side {
            Side::Bid => &self.maker_user_id,
            Side::Ask => &self.taker_user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub filled_quantity: Quantity,
    /// Quantity left on the book under `order_id`; zero when fully filled.
    pub resting_quantity: Quantity,
    pub fills: Vec<Fill>,
}

impl ExecutionReport {
    pub fn is_resting(&self) -> bool {
        !self.resting_quantity.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// Aggregated resting quantity per price level, best level first on each side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub best_bid: Price,
    pub best_ask: Price,
    pub mid: Price,
}

impl Quote {
    /// Mid is taken from the spread; the sum of two touches can exceed `Decimal::MAX`.
    pub fn new(best_bid: Price, best_ask: Price) -> Self {
        Self {
            best_bid,
            best_ask,
            mid: best_bid + (best_ask - best_bid) / Decimal::TWO,
        }
    }
}
