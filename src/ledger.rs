//! Account ledger: the only code that mutates credits and holdings.
//!
//! Every mutation goes through an [`AccountGuard`], obtained from [`Ledger::lock_account`]. The
//! guard holds the per-account lock and an account re-read from the store *after* the lock was
//! acquired, so no primitive ever works from a pre-lock snapshot. The guard's copy is only
//! replaced once the store write succeeded.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::ExchangeError;
use crate::locks::{AccountLock, LockRegistry};
use crate::store::Store;
use crate::types::{Account, OrderKind, Side};

/// Exclusive, freshly-read view of one account. Dropping it releases the lock.
pub struct AccountGuard {
    _lock: AccountLock,
    account: Account,
}

impl AccountGuard {
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }
}

/// Result of a ledger primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Execution {
    /// Credits and holdings were mutated and persisted at `price`.
    Settled { price: Decimal },
    /// Limit order accepted after validation; settlement is left to the matching engine.
    Validated,
}

/// Debits `quantity × price` and adds the units. Leaves `account` untouched on error.
pub fn apply_buy(
    account: &mut Account,
    symbol: &str,
    quantity: u64,
    price: Decimal,
) -> Result<Decimal, ExchangeError> {
    if quantity == 0 {
        return Err(ExchangeError::InvalidQuantity);
    }
    let cost = Decimal::from(quantity)
        .checked_mul(price)
        .ok_or(ExchangeError::InvalidQuantity)?;
    if account.credits < cost {
        return Err(ExchangeError::InsufficientCredits {
            needed: cost,
            available: account.credits,
        });
    }
    let held = account
        .holding(symbol)
        .checked_add(quantity)
        .ok_or(ExchangeError::InvalidQuantity)?;
    account.credits -= cost;
    account.holdings.insert(symbol.to_string(), held);
    Ok(cost)
}

/// Credits `quantity × price` and removes the units, dropping the entry when it reaches zero.
pub fn apply_sell(
    account: &mut Account,
    symbol: &str,
    quantity: u64,
    price: Decimal,
) -> Result<Decimal, ExchangeError> {
    if quantity == 0 {
        return Err(ExchangeError::InvalidQuantity);
    }
    let held = account.holding(symbol);
    if held < quantity {
        return Err(ExchangeError::InsufficientHoldings {
            symbol: symbol.to_string(),
            needed: quantity,
            available: held,
        });
    }
    let revenue = Decimal::from(quantity)
        .checked_mul(price)
        .and_then(|r| account.credits.checked_add(r).map(|_| r))
        .ok_or(ExchangeError::InvalidQuantity)?;
    account.credits += revenue;
    let remaining = held - quantity;
    if remaining == 0 {
        account.holdings.remove(symbol);
    } else {
        account.holdings.insert(symbol.to_string(), remaining);
    }
    Ok(revenue)
}

/// Ledger over a store, serialized per account by a shared [`LockRegistry`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    locks: Arc<LockRegistry>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, locks: Arc<LockRegistry>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Acquires the account lock, then reads the authoritative account from the store.
    pub async fn lock_account(&self, username: &str) -> Result<AccountGuard, ExchangeError> {
        let lock = self.locks.lock(username).await;
        let account = self
            .store
            .get_account(username)
            .await?
            .ok_or_else(|| ExchangeError::AccountNotFound(username.to_string()))?;
        Ok(AccountGuard {
            _lock: lock,
            account,
        })
    }

    /// Buy primitive. Market orders settle at the current price; limit orders only validate
    /// that credits cover `quantity × limit_price`.
    pub async fn execute_buy(
        &self,
        guard: &mut AccountGuard,
        symbol: &str,
        quantity: u64,
        kind: OrderKind,
        limit_price: Option<Decimal>,
    ) -> Result<Execution, ExchangeError> {
        match kind {
            OrderKind::Market => {
                let price = self.market_price(symbol).await?;
                self.settle(guard, Side::Buy, symbol, quantity, price).await?;
                Ok(Execution::Settled { price })
            }
            OrderKind::Limit => {
                let limit = positive_limit(limit_price)?;
                let mut scratch = guard.account.clone();
                apply_buy(&mut scratch, symbol, quantity, limit)?;
                Ok(Execution::Validated)
            }
        }
    }

    /// Sell primitive. Market orders settle at the current price; limit orders only validate
    /// that enough units are held.
    pub async fn execute_sell(
        &self,
        guard: &mut AccountGuard,
        symbol: &str,
        quantity: u64,
        kind: OrderKind,
        limit_price: Option<Decimal>,
    ) -> Result<Execution, ExchangeError> {
        match kind {
            OrderKind::Market => {
                let mut scratch = guard.account.clone();
                // holdings are checked before the price lookup so a bad sell fails fast
                apply_sell(&mut scratch, symbol, quantity, Decimal::ZERO)?;
                let price = self.market_price(symbol).await?;
                self.settle(guard, Side::Sell, symbol, quantity, price).await?;
                Ok(Execution::Settled { price })
            }
            OrderKind::Limit => {
                let limit = positive_limit(limit_price)?;
                let mut scratch = guard.account.clone();
                apply_sell(&mut scratch, symbol, quantity, limit)?;
                Ok(Execution::Validated)
            }
        }
    }

    /// Applies a trade at an explicit price and persists the whole account document.
    pub async fn settle(
        &self,
        guard: &mut AccountGuard,
        side: Side,
        symbol: &str,
        quantity: u64,
        price: Decimal,
    ) -> Result<Decimal, ExchangeError> {
        let mut next = guard.account.clone();
        let amount = match side {
            Side::Buy => apply_buy(&mut next, symbol, quantity, price)?,
            Side::Sell => apply_sell(&mut next, symbol, quantity, price)?,
        };
        self.store.put_account(&next).await?;
        log::debug!(
            "settled username={} side={:?} symbol={} quantity={} price={} amount={} credits={}",
            next.username,
            side,
            symbol,
            quantity,
            price,
            amount,
            next.credits
        );
        guard.account = next;
        Ok(amount)
    }

    async fn market_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.store
            .get_price(symbol)
            .await?
            .map(|p| p.price)
            .ok_or_else(|| ExchangeError::InstrumentNotFound(symbol.to_string()))
    }
}

fn positive_limit(limit_price: Option<Decimal>) -> Result<Decimal, ExchangeError> {
    match limit_price {
        Some(p) if p > Decimal::ZERO => Ok(p),
        _ => Err(ExchangeError::InvalidPrice),
    }
}
