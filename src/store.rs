//! Document-store boundary: accounts, orders, and instrument prices keyed by primary key.
//!
//! Every call is point-in-time and atomic for a single document; nothing spans documents.
//! [`MemoryStore`] is the in-process implementation, [`crate::persistence::FileStore`] adds
//! a JSON snapshot on disk, and [`TimeoutStore`] bounds each call with a deadline.

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::StoreError;
use crate::types::{Account, InstrumentPrice, Order, OrderId, OrderKind, OrderStatus};

/// Optional equality filters for [`Store::find_orders`]. `None` matches anything.
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub username: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<OrderStatus>,
    pub kind: Option<OrderKind>,
}

impl OrderFilter {
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    /// Pending limit orders for one symbol: what the matching engine evaluates each tick.
    pub fn pending_limits(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            status: Some(OrderStatus::Pending),
            kind: Some(OrderKind::Limit),
            ..Default::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.username.as_deref().map_or(true, |u| order.username == u)
            && self.symbol.as_deref().map_or(true, |s| order.symbol == s)
            && self.status.map_or(true, |s| order.status == s)
            && self.kind.map_or(true, |k| order.kind == k)
    }
}

/// Persistent store consumed by the ledger, matching engine, and simulator.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Inserts `account` unless the username is taken. Returns `false` when it already existed.
    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError>;

    /// Full-document upsert.
    async fn put_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_price(&self, symbol: &str) -> Result<Option<InstrumentPrice>, StoreError>;

    /// All instruments, in insertion order.
    async fn list_prices(&self) -> Result<Vec<InstrumentPrice>, StoreError>;

    async fn put_price(&self, price: &InstrumentPrice) -> Result<(), StoreError>;

    /// Inserts `price` unless the symbol exists. Returns `false` when it already existed.
    async fn insert_price_if_absent(&self, price: &InstrumentPrice) -> Result<bool, StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Sets status (and the executed price, when given). Returns `false` if the id is unknown.
    async fn update_order(
        &self,
        id: &OrderId,
        status: OrderStatus,
        executed_price: Option<rust_decimal::Decimal>,
    ) -> Result<bool, StoreError>;

    /// Matching orders, in insertion order.
    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;
}

/// Snapshot of every collection. Also the on-disk format of [`crate::persistence::FileStore`].
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Collections {
    pub accounts: Vec<Account>,
    pub orders: Vec<Order>,
    pub prices: Vec<InstrumentPrice>,
}

impl Collections {
    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }

    pub fn price(&self, symbol: &str) -> Option<&InstrumentPrice> {
        self.prices.iter().find(|p| p.symbol == symbol)
    }

    /// `false` when the username is taken.
    pub fn insert_account(&mut self, account: &Account) -> bool {
        if self.account(&account.username).is_some() {
            return false;
        }
        self.accounts.push(account.clone());
        true
    }

    pub fn put_account(&mut self, account: &Account) {
        match self.accounts.iter_mut().find(|a| a.username == account.username) {
            Some(existing) => *existing = account.clone(),
            None => self.accounts.push(account.clone()),
        }
    }

    /// `false` when the symbol exists.
    pub fn insert_price(&mut self, price: &InstrumentPrice) -> bool {
        if self.price(&price.symbol).is_some() {
            return false;
        }
        self.prices.push(price.clone());
        true
    }

    pub fn put_price(&mut self, price: &InstrumentPrice) {
        match self.prices.iter_mut().find(|p| p.symbol == price.symbol) {
            Some(existing) => *existing = price.clone(),
            None => self.prices.push(price.clone()),
        }
    }

    /// `false` when the id is unknown.
    pub fn update_order(
        &mut self,
        id: &OrderId,
        status: OrderStatus,
        executed_price: Option<rust_decimal::Decimal>,
    ) -> bool {
        match self.orders.iter_mut().find(|o| &o.id == id) {
            Some(order) => {
                order.status = status;
                if executed_price.is_some() {
                    order.executed_price = executed_price;
                }
                true
            }
            None => false,
        }
    }
}

/// In-process store. One mutex over all collections gives per-document atomicity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: Collections) -> Self {
        Self {
            inner: Mutex::new(collections),
        }
    }

    pub fn snapshot(&self) -> Collections {
        self.collections().clone()
    }

    /// Swaps in a whole new state, e.g. one that was just written to disk.
    pub fn replace(&self, collections: Collections) {
        *self.collections() = collections;
    }

    fn collections(&self) -> MutexGuard<'_, Collections> {
        // a panic while holding the guard cannot leave a half-written document
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.collections().account(username).cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        Ok(self.collections().insert_account(account))
    }

    async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        self.collections().put_account(account);
        Ok(())
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<InstrumentPrice>, StoreError> {
        Ok(self.collections().price(symbol).cloned())
    }

    async fn list_prices(&self) -> Result<Vec<InstrumentPrice>, StoreError> {
        Ok(self.collections().prices.clone())
    }

    async fn put_price(&self, price: &InstrumentPrice) -> Result<(), StoreError> {
        self.collections().put_price(price);
        Ok(())
    }

    async fn insert_price_if_absent(&self, price: &InstrumentPrice) -> Result<bool, StoreError> {
        Ok(self.collections().insert_price(price))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.collections().orders.push(order.clone());
        Ok(())
    }

    async fn update_order(
        &self,
        id: &OrderId,
        status: OrderStatus,
        executed_price: Option<rust_decimal::Decimal>,
    ) -> Result<bool, StoreError> {
        Ok(self.collections().update_order(id, status, executed_price))
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .collections()
            .orders
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }
}

/// Wraps a store so that no single call can stall its caller past `deadline`.
pub struct TimeoutStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S: Store> TimeoutStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.deadline, call)
            .await
            .map_err(|_| StoreError::Timeout(self.deadline))?
    }
}

#[async_trait]
impl<S: Store> Store for TimeoutStore<S> {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.bounded(self.inner.get_account(username)).await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        self.bounded(self.inner.insert_account(account)).await
    }

    async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        self.bounded(self.inner.put_account(account)).await
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<InstrumentPrice>, StoreError> {
        self.bounded(self.inner.get_price(symbol)).await
    }

    async fn list_prices(&self) -> Result<Vec<InstrumentPrice>, StoreError> {
        self.bounded(self.inner.list_prices()).await
    }

    async fn put_price(&self, price: &InstrumentPrice) -> Result<(), StoreError> {
        self.bounded(self.inner.put_price(price)).await
    }

    async fn insert_price_if_absent(&self, price: &InstrumentPrice) -> Result<bool, StoreError> {
        self.bounded(self.inner.insert_price_if_absent(price)).await
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.bounded(self.inner.insert_order(order)).await
    }

    async fn update_order(
        &self,
        id: &OrderId,
        status: OrderStatus,
        executed_price: Option<rust_decimal::Decimal>,
    ) -> Result<bool, StoreError> {
        self.bounded(self.inner.update_order(id, status, executed_price))
            .await
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        self.bounded(self.inner.find_orders(filter)).await
    }
}
