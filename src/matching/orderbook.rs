use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;

use crate::models::{BookLevel, Depth, OrderId, Price, Quantity, Side, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub remaining: Quantity,
    /// Ledger commitment still backing this order: currency for bids, asset for asks.
    pub reserved: Decimal,
}

impl RestingOrder {
    /// Portion of `reserved` a fill of `filled` frees. The fill that exhausts the
    /// order frees everything left, so rounded slices always add up to the commitment.
    pub fn released_by(&self, filled: Quantity) -> Decimal {
        if filled >= self.remaining {
            return self.reserved;
        }
        let share = match self.side {
            Side::Bid => self.price.checked_mul(filled),
            Side::Ask => Some(filled),
        };
        share.map_or(self.reserved, |share| share.min(self.reserved))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("order {0} is not resting")]
    UnknownOrder(OrderId),
    #[error("fill of {filled} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        order_id: OrderId,
        filled: Quantity,
        remaining: Quantity,
    },
    #[error("release of {released} exceeds reservation {reserved} on order {order_id}")]
    OverRelease {
        order_id: OrderId,
        released: Decimal,
        reserved: Decimal,
    },
    #[error("resting quantity at {price} overflows")]
    LevelOverflow { price: Price },
}

#[derive(Debug, Default)]
struct Level {
    orders: VecDeque<RestingOrder>,
    total_qty: Quantity,
}

/// Resting orders of one instrument. Levels are keyed by price; each level is a
/// FIFO so equal prices keep arrival order.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<Price, Level>,
    asks: BTreeMap<Price, Level>,
    order_count: usize,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order_count
    }

    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Appends `order` to the back of its level. Nothing changes on error.
    pub fn insert(&mut self, order: RestingOrder) -> Result<(), BookError> {
        let total = self
            .level_quantity(order.side, order.price)
            .checked_add(order.remaining)
            .ok_or(BookError::LevelOverflow { price: order.price })?;
        let level = self.levels_mut(order.side).entry(order.price).or_default();
        level.total_qty = total;
        level.orders.push_back(order);
        self.order_count += 1;
        Ok(())
    }

    /// Aggregate resting quantity at `price`, zero for an empty level.
    pub fn level_quantity(&self, side: Side, price: Price) -> Quantity {
        self.levels(side)
            .get(&price)
            .map_or(Decimal::ZERO, |level| level.total_qty)
    }

    /// Price-time head of `side`.
    pub fn best(&self, side: Side) -> Option<&RestingOrder> {
        let level = match side {
            Side::Bid => self.bids.values().next_back(),
            Side::Ask => self.asks.values().next(),
        }?;
        level.orders.front()
    }

    /// Head of the side an incoming `side` order trades against.
    pub fn best_opposing(&self, side: Side) -> Option<&RestingOrder> {
        self.best(side.opposite())
    }

    pub fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Bid => self.bids.keys().next_back().copied(),
            Side::Ask => self.asks.keys().next().copied(),
        }
    }

    /// Fails exactly when [`OrderBook::reduce_or_remove`] would, without touching the book.
    pub fn check_reduce(&self, side: Side, price: Price, order_id: OrderId, filled: Quantity, released: Decimal) -> Result<(), BookError> {
        let level = self.levels(side).get(&price).ok_or(BookError::UnknownOrder(order_id))?;
        let position = Self::position(level, order_id)?;
        Self::check_fill(&level.orders[position], filled, released)
    }

    /// Takes `filled` off a resting order and `released` off its reservation,
    /// dropping the order once nothing remains. The order keeps its queue position
    /// otherwise. Returns the quantity left; nothing changes on error.
    pub fn reduce_or_remove(&mut self, side: Side, price: Price, order_id: OrderId, filled: Quantity, released: Decimal) -> Result<Quantity, BookError> {
        let levels = self.levels_mut(side);
        let level = levels.get_mut(&price).ok_or(BookError::UnknownOrder(order_id))?;
        let position = Self::position(level, order_id)?;
        Self::check_fill(&level.orders[position], filled, released)?;

        let order = &mut level.orders[position];
        order.remaining -= filled;
        order.reserved -= released;
        let remaining = order.remaining;
        level.total_qty -= filled;

        if remaining.is_zero() {
            level.orders.remove(position);
            if level.orders.is_empty() {
                levels.remove(&price);
            }
            self.order_count -= 1;
        }
        Ok(remaining)
    }

    /// Aggregated quantity per price level, best first. `max_levels` caps each side.
    pub fn depth(&self, max_levels: Option<usize>) -> Depth {
        let take = max_levels.unwrap_or(usize::MAX);
        let bids = self
            .bids
            .iter()
            .rev()
            .take(take)
            .map(|(price, level)| BookLevel {
                price: *price,
                quantity: level.total_qty,
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(take)
            .map(|(price, level)| BookLevel {
                price: *price,
                quantity: level.total_qty,
            })
            .collect();
        Depth { bids, asks }
    }

    /// Resting orders of `side` in matching order.
    pub fn orders(&self, side: Side) -> Vec<&RestingOrder> {
        match side {
            Side::Bid => self.bids.values().rev().flat_map(|level| level.orders.iter()).collect(),
            Side::Ask => self.asks.values().flat_map(|level| level.orders.iter()).collect(),
        }
    }

    /// Whether an incoming `side` order limited at `price` reaches the opposite touch.
    pub fn would_cross(&self, side: Side, price: Price) -> bool {
        self.best_price(side.opposite())
            .is_some_and(|best| side.crosses(price, best))
    }

    /// True if the best bid reaches the best ask.
    pub fn is_crossed(&self) -> bool {
        match (self.best_price(Side::Bid), self.best_price(Side::Ask)) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    fn position(level: &Level, order_id: OrderId) -> Result<usize, BookError> {
        level
            .orders
            .iter()
            .position(|order| order.order_id == order_id)
            .ok_or(BookError::UnknownOrder(order_id))
    }

    fn check_fill(order: &RestingOrder, filled: Quantity, released: Decimal) -> Result<(), BookError> {
        if filled > order.remaining {
            return Err(BookError::Overfill {
                order_id: order.order_id,
                filled,
                remaining: order.remaining,
            });
        }
        if released > order.reserved {
            return Err(BookError::OverRelease {
                order_id: order.order_id,
                released,
                reserved: order.reserved,
            });
        }
        Ok(())
    }

    fn levels(&self, side: Side) -> &BTreeMap<Price, Level> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price, Level> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}
