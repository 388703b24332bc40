use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument};

use crate::config::Settings;
use crate::ledger::{Ledger, LedgerError};
use crate::matching::orderbook::{BookError, OrderBook, RestingOrder};
use crate::metrics;
use crate::models::{Balances, Depth, ExecutionReport, Fill, NewOrder, OrderId, Quote, Side, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("price must be positive")]
    InvalidPrice,
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("order notional overflows")]
    NotionalOverflow,
    #[error("resting quantity at this price would overflow")]
    LevelOverflow,
    #[error("user {0} not found")]
    UnknownUser(UserId),
    #[error("insufficient {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: Decimal,
        available: Decimal,
    },
    #[error("ledger integrity violation: {0}")]
    Ledger(#[from] LedgerError),
    #[error("book integrity violation: {0}")]
    Book(#[from] BookError),
}

impl SubmitError {
    /// Stable rejection code for the boundary and metrics labels.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing fields",
            Self::InvalidPrice => "invalid price",
            Self::InvalidQuantity | Self::LevelOverflow => "invalid quantity",
            Self::NotionalOverflow => "invalid notional",
            Self::UnknownUser(_) => "user not found",
            Self::InsufficientFunds { .. } => "insufficient funds",
            Self::Ledger(_) | Self::Book(_) => "integrity",
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Ledger(_) | Self::Book(_))
    }
}

/// Owns the book and the ledger of one instrument. Every mutation goes through
/// [`MatchingEngine::submit`].
#[derive(Debug)]
pub struct MatchingEngine {
    book: OrderBook,
    ledger: Ledger,
    next_order_id: OrderId,
}

impl MatchingEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            book: OrderBook::new(),
            ledger,
            next_order_id: 1,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Ledger::with_users(&settings.market, &settings.users))
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn depth(&self, max_levels: Option<usize>) -> Depth {
        self.book.depth(max_levels)
    }

    pub fn balances(&self, user_id: &str) -> Balances {
        self.ledger.balances_or_default(user_id)
    }

    /// Touch prices and mid; `None` until both sides hold an order.
    pub fn quote(&self) -> Option<Quote> {
        let best_bid = self.book.best_price(Side::Bid)?;
        let best_ask = self.book.best_price(Side::Ask)?;
        Some(Quote::new(best_bid, best_ask))
    }

    #[instrument(skip_all, fields(user = %order.user_id, side = %order.side, price = %order.price, quantity = %order.quantity))]
    pub fn submit(&mut self, order: NewOrder) -> Result<ExecutionReport, SubmitError> {
        metrics::record_submission();
        let result = self.validate(&order).and_then(|()| self.execute(order));
        match &result {
            Ok(report) => {
                info!(
                    order_id = report.order_id,
                    filled = %report.filled_quantity,
                    resting = %report.resting_quantity,
                    "order accepted"
                );
            }
            Err(err) if err.is_integrity() => error!(%err, "submission aborted"),
            Err(err) => info!(reason = err.reason(), %err, "order rejected"),
        }
        if let Err(err) = &result {
            metrics::record_rejection(err.reason());
        }
        metrics::set_resting_orders(self.book.len());
        result
    }

    /// Pre-trade checks against the full order; nothing is mutated here.
    fn validate(&self, order: &NewOrder) -> Result<(), SubmitError> {
        if order.price <= Decimal::ZERO {
            return Err(SubmitError::InvalidPrice);
        }
        if order.quantity <= Decimal::ZERO {
            return Err(SubmitError::InvalidQuantity);
        }
        if !self.ledger.contains(&order.user_id) {
            return Err(SubmitError::UnknownUser(order.user_id.clone()));
        }

        let (asset, required) = match order.side {
            Side::Bid => {
                let notional = order
                    .price
                    .checked_mul(order.quantity)
                    .ok_or(SubmitError::NotionalOverflow)?;
                (self.ledger.quote_asset(), notional)
            }
            Side::Ask => (self.ledger.base_asset(), order.quantity),
        };
        let available = self.ledger.available(&order.user_id, asset)?;
        if available < required {
            return Err(SubmitError::InsufficientFunds {
                asset: asset.to_string(),
                required,
                available,
            });
        }
        // The remainder can rest on this level, which must keep a representable total.
        if self
            .book
            .level_quantity(order.side, order.price)
            .checked_add(order.quantity)
            .is_none()
        {
            return Err(SubmitError::LevelOverflow);
        }
        Ok(())
    }

    fn execute(&mut self, order: NewOrder) -> Result<ExecutionReport, SubmitError> {
        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let maker_side = order.side.opposite();
        let mut remaining = order.quantity;
        let mut fills = Vec::new();

        while remaining > Decimal::ZERO && self.book.would_cross(order.side, order.price) {
            let Some(maker) = self.book.best_opposing(order.side).cloned() else {
                break;
            };
            let quantity = remaining.min(maker.remaining);
            let released = maker.released_by(quantity);
            let reserved_asset = self.ledger.reserved_asset(maker_side).to_string();

            let (seller, buyer) = match order.side {
                Side::Bid => (&maker.user_id, &order.user_id),
                Side::Ask => (&order.user_id, &maker.user_id),
            };
            // Every check runs before the first write of the trade step.
            self.book
                .check_reduce(maker_side, maker.price, maker.order_id, quantity, released)?;
            self.ledger.check_release(&maker.user_id, &reserved_asset, released)?;
            self.ledger.transfer(seller, buyer, quantity, maker.price)?;
            self.ledger.release(&maker.user_id, &reserved_asset, released)?;
            self.book
                .reduce_or_remove(maker_side, maker.price, maker.order_id, quantity, released)?;
            remaining -= quantity;

            debug!(maker_order_id = maker.order_id, price = %maker.price, %quantity, "trade");
            metrics::record_trade();
            fills.push(Fill {
                maker_order_id: maker.order_id,
                taker_order_id: order_id,
                maker_user_id: maker.user_id,
                taker_user_id: order.user_id.clone(),
                taker_side: order.side,
                price: maker.price,
                quantity,
            });
        }

        if remaining > Decimal::ZERO {
            let asset = self.ledger.reserved_asset(order.side).to_string();
            let reserved = self.ledger.backing(order.side, order.price, remaining)?;
            self.book.insert(RestingOrder {
                order_id,
                user_id: order.user_id.clone(),
                side: order.side,
                price: order.price,
                remaining,
                reserved,
            })?;
            if let Err(err) = self.ledger.commit(&order.user_id, &asset, reserved) {
                self.book
                    .reduce_or_remove(order.side, order.price, order_id, remaining, reserved)?;
                return Err(err.into());
            }
        }
        debug_assert!(!self.book.is_crossed(), "book crossed after order {order_id}");

        Ok(ExecutionReport {
            order_id,
            filled_quantity: order.quantity - remaining,
            resting_quantity: remaining,
            fills,
        })
    }
}
