//! Core records of the exchange: accounts, orders, and instrument prices.
//!
//! Every record is a single document owned by its key (username, order id, symbol).
//! Wire names are camelCase so the JSON matches what browser clients already consume.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Number of samples kept in [`InstrumentPrice::price_history`].
pub const HISTORY_WINDOW: usize = 20;

/// Unique order identifier (UUID v4, hyphenated).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Market orders settle at submission; limit orders wait for the simulated price to cross.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
}

/// `Pending` only ever holds limit orders. `Done` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Done,
}

/// A user account. The password hash is persisted but never part of [`AccountView`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub credits: Decimal,
    /// symbol -> quantity; entries are always > 0.
    #[serde(default)]
    pub holdings: BTreeMap<String, u64>,
}

impl Account {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, credits: Decimal) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            credits,
            holdings: BTreeMap::new(),
        }
    }

    /// Quantity held for `symbol` (0 when absent).
    pub fn holding(&self, symbol: &str) -> u64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    pub fn view(&self) -> AccountView {
        AccountView {
            username: self.username.clone(),
            credits: self.credits,
            portfolio: self.holdings.clone(),
        }
    }
}

/// Public projection of an [`Account`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AccountView {
    pub username: String,
    pub credits: Decimal,
    pub portfolio: BTreeMap<String, u64>,
}

/// A submitted order.
///
/// `price` is the limit price for limit orders and the execution price for market orders.
/// `executed_price` is filled in when the matching engine settles a limit order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub username: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "orderType")]
    pub kind: OrderKind,
    pub quantity: u64,
    pub price: Decimal,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_limit(&self) -> bool {
        matches!(self.kind, OrderKind::Limit)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
    }
}

/// Current quote and derived day statistics for one instrument.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentPrice {
    pub symbol: String,
    pub name: String,
    pub logo: String,
    pub price: Decimal,
    /// Percentage change against the previous tick.
    pub change: Decimal,
    /// Oldest first; at most [`HISTORY_WINDOW`] entries.
    pub price_history: Vec<Decimal>,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub day_open: Decimal,
    pub volume: u64,
}

impl InstrumentPrice {
    /// Applies one simulated tick: price, change, day range, history window, and volume.
    pub fn record_tick(&mut self, new_price: Decimal, traded_volume: u64) {
        let old = self.price;
        self.change = if old.is_zero() {
            Decimal::ZERO
        } else {
            ((new_price - old) / old * Decimal::ONE_HUNDRED).round_dp(2)
        };
        self.price = new_price;
        if new_price > self.day_high {
            self.day_high = new_price;
        }
        // zero day_low means the range was never initialized
        if new_price < self.day_low || self.day_low.is_zero() {
            self.day_low = new_price;
        }
        self.price_history.push(new_price);
        if self.price_history.len() > HISTORY_WINDOW {
            let excess = self.price_history.len() - HISTORY_WINDOW;
            self.price_history.drain(..excess);
        }
        self.volume = self.volume.saturating_add(traded_volume);
    }
}
