//! # Dire Exchange Sim
//!
//! Simulated securities exchange: synthetic price ticks drive a ledger of user accounts and
//! market/limit orders. There is no order book; each limit order is matched unilaterally
//! against the simulated market price.
//!
//! ## Pieces
//!
//! - [`Store`]: document store boundary ([`MemoryStore`], [`FileStore`], [`TimeoutStore`]).
//! - [`LockRegistry`]: one async lock per account.
//! - [`Ledger`]: the only code that mutates credits and holdings, always through an
//!   [`AccountGuard`] that holds the account lock and a re-read copy of the account.
//! - [`Matcher`]: settles pending limit orders when the price crosses their limit.
//! - [`Simulator`]: bounded random walk per instrument, one pass per tick.
//! - [`Exchange`]: signup, login, order submission, and read queries.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dire_exchange_sim::{
//!     catalog, AuthConfig, Exchange, LockRegistry, MemoryStore, OrderKind, OrderRequest, Side,
//! };
//! use rust_decimal::Decimal;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! catalog::seed_catalog(store.as_ref(), &catalog::default_catalog()).await.unwrap();
//! let exchange = Exchange::new(
//!     store,
//!     Arc::new(LockRegistry::new()),
//!     AuthConfig::new("secret", Duration::from_secs(60)),
//! );
//! exchange.signup("alice", "pw").await.unwrap();
//! let order = exchange
//!     .submit_order(
//!         "alice",
//!         OrderRequest { symbol: "AAPL".into(), side: Side::Buy, kind: OrderKind::Market, quantity: 10, price: None },
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(order.price, Decimal::from(150));
//! assert_eq!(exchange.get_account("alice").await.unwrap().credits, Decimal::from(500));
//! # });
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod ledger;
pub mod locks;
pub mod matching;
pub mod persistence;
pub mod simulation;
pub mod store;
pub mod types;

pub use auth::{AuthConfig, AuthUser};
pub use config::Config;
pub use error::{ExchangeError, StoreError};
pub use events::{MarketEvent, PriceUpdate};
pub use exchange::{Exchange, OrderRequest};
pub use ledger::{AccountGuard, Execution, Ledger};
pub use locks::LockRegistry;
pub use matching::{MatchSummary, Matcher};
pub use persistence::FileStore;
pub use simulation::{PriceWalk, Simulator, SimulatorConfig, TickReport};
pub use store::{MemoryStore, OrderFilter, Store, TimeoutStore};
pub use types::{Account, AccountView, InstrumentPrice, Order, OrderId, OrderKind, OrderStatus, Side};
