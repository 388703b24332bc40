use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::{MarketConfig, UserConfig};
use crate::models::{Asset, Balances, Price, Quantity, Side, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("balance arithmetic overflow")]
    Overflow,
    #[error("release of {amount} {asset} exceeds committed {committed}")]
    OverRelease {
        asset: Asset,
        amount: Decimal,
        committed: Decimal,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Account {
    pub balances: Balances,
    /// Amounts promised to the account's resting orders.
    pub committed: Balances,
}

impl Account {
    fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    fn committed(&self, asset: &str) -> Decimal {
        self.committed.get(asset).copied().unwrap_or_default()
    }
}

/// Holdings of the traded asset and the reference currency for every known user.
#[derive(Debug, Clone)]
pub struct Ledger {
    base: Asset,
    quote: Asset,
    accounts: HashMap<UserId, Account>,
}

impl Ledger {
    pub fn new(market: &MarketConfig) -> Self {
        Self {
            base: market.base_asset.clone(),
            quote: market.quote_asset.clone(),
            accounts: HashMap::new(),
        }
    }

    pub fn with_users(market: &MarketConfig, users: &[UserConfig]) -> Self {
        let mut ledger = Self::new(market);
        for user in users {
            ledger.open_account(user.id.clone(), user.balances.clone());
        }
        ledger
    }

    pub fn base_asset(&self) -> &str {
        &self.base
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote
    }

    /// Registers a user. Both market assets are always present in the mapping.
    pub fn open_account(&mut self, user_id: UserId, mut balances: Balances) {
        balances.entry(self.base.clone()).or_default();
        balances.entry(self.quote.clone()).or_default();
        self.accounts.insert(
            user_id,
            Account {
                balances,
                committed: Balances::new(),
            },
        );
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.accounts.contains_key(user_id)
    }

    pub fn account(&self, user_id: &str) -> Option<&Account> {
        self.accounts.get(user_id)
    }

    pub fn balances(&self, user_id: &str) -> Option<&Balances> {
        self.accounts.get(user_id).map(|account| &account.balances)
    }

    /// Balances for `user_id`, or zero for both market assets when the user is unknown.
    pub fn balances_or_default(&self, user_id: &str) -> Balances {
        match self.balances(user_id) {
            Some(balances) => balances.clone(),
            None => Balances::from([
                (self.base.clone(), Decimal::ZERO),
                (self.quote.clone(), Decimal::ZERO),
            ]),
        }
    }

    /// Balance not yet promised to resting orders.
    pub fn available(&self, user_id: &str, asset: &str) -> Result<Decimal, LedgerError> {
        let account = self.account_ref(user_id)?;
        Ok(account.balance(asset) - account.committed(asset))
    }

    /// Sum of `asset` across all accounts.
    pub fn total(&self, asset: &str) -> Decimal {
        self.accounts.values().map(|account| account.balance(asset)).sum()
    }

    /// Asset a resting order on `side` keeps committed: currency for bids, the
    /// traded asset for asks.
    pub fn reserved_asset(&self, side: Side) -> &str {
        match side {
            Side::Bid => &self.quote,
            Side::Ask => &self.base,
        }
    }

    /// Amount a resting order of `quantity` at `price` commits.
    pub fn backing(&self, side: Side, price: Price, quantity: Quantity) -> Result<Decimal, LedgerError> {
        match side {
            Side::Bid => quantity.checked_mul(price).ok_or(LedgerError::Overflow),
            Side::Ask => Ok(quantity),
        }
    }

    /// Reserves `amount` of `asset` for a resting order.
    pub fn commit(&mut self, user_id: &str, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.account_mut(user_id)?;
        let committed = account.committed(asset).checked_add(amount).ok_or(LedgerError::Overflow)?;
        account.committed.insert(asset.to_string(), committed);
        Ok(())
    }

    /// Fails exactly when [`Ledger::release`] would, without touching the account.
    pub fn check_release(&self, user_id: &str, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        Self::released(self.account_ref(user_id)?, asset, amount).map(|_| ())
    }

    /// Frees holdings reserved by [`Ledger::commit`] once the resting order trades.
    pub fn release(&mut self, user_id: &str, asset: &str, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.account_mut(user_id)?;
        let committed = Self::released(account, asset, amount)?;
        if committed.is_zero() {
            account.committed.remove(asset);
        } else {
            account.committed.insert(asset.to_string(), committed);
        }
        Ok(())
    }

    /// Moves `quantity` of the traded asset from seller to buyer and `quantity × price`
    /// of currency from buyer to seller. Either both legs apply or neither does.
    pub fn transfer(&mut self, seller_id: &str, buyer_id: &str, quantity: Quantity, price: Price) -> Result<(), LedgerError> {
        let notional = quantity.checked_mul(price).ok_or(LedgerError::Overflow)?;
        let seller = self.account_ref(seller_id)?;
        let buyer = self.account_ref(buyer_id)?;
        if seller_id == buyer_id {
            return Ok(());
        }

        let seller_base = seller.balance(&self.base).checked_sub(quantity).ok_or(LedgerError::Overflow)?;
        let seller_quote = seller.balance(&self.quote).checked_add(notional).ok_or(LedgerError::Overflow)?;
        let buyer_base = buyer.balance(&self.base).checked_add(quantity).ok_or(LedgerError::Overflow)?;
        let buyer_quote = buyer.balance(&self.quote).checked_sub(notional).ok_or(LedgerError::Overflow)?;

        let (base, quote) = (self.base.clone(), self.quote.clone());
        let seller = self.account_mut(seller_id)?;
        seller.balances.insert(base.clone(), seller_base);
        seller.balances.insert(quote.clone(), seller_quote);
        let buyer = self.account_mut(buyer_id)?;
        buyer.balances.insert(base, buyer_base);
        buyer.balances.insert(quote, buyer_quote);

        debug!(seller = seller_id, buyer = buyer_id, %quantity, %price, "transfer applied");
        Ok(())
    }

    fn released(account: &Account, asset: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        let committed = account.committed(asset);
        if amount > committed {
            return Err(LedgerError::OverRelease {
                asset: asset.to_string(),
                amount,
                committed,
            });
        }
        Ok(committed - amount)
    }

    fn account_ref(&self, user_id: &str) -> Result<&Account, LedgerError> {
        self.accounts
            .get(user_id)
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))
    }

    fn account_mut(&mut self, user_id: &str) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UnknownUser(user_id.to_string()))
    }
}
