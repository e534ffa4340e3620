//! Caller-facing exchange facade.
//!
//! Wraps the store, ledger, and credentials so the request layer can sign users up, log them in,
//! and submit orders without touching locks or documents directly.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink, LogAuditSink, Outcome};
use crate::auth::{hash_password, verify_password, AuthConfig};
use crate::error::ExchangeError;
use crate::ledger::{Execution, Ledger};
use crate::locks::LockRegistry;
use crate::matching::Matcher;
use crate::store::{OrderFilter, Store};
use crate::types::{Account, AccountView, InstrumentPrice, Order, OrderId, OrderKind, OrderStatus, Side};

/// Credits granted to every new account.
pub const DEFAULT_INITIAL_CREDITS: Decimal = Decimal::from_parts(2000, 0, 0, false, 0);

/// Order submission as received from a client. `quantity` is signed so non-positive input can
/// be rejected as [`ExchangeError::InvalidQuantity`] instead of failing to parse.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "orderType")]
    pub kind: OrderKind,
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Clone)]
pub struct Exchange {
    ledger: Ledger,
    auth: AuthConfig,
    audit: Arc<dyn AuditSink>,
    initial_credits: Decimal,
}

impl Exchange {
    pub fn new(store: Arc<dyn Store>, locks: Arc<LockRegistry>, auth: AuthConfig) -> Self {
        Self {
            ledger: Ledger::new(store, locks),
            auth,
            audit: Arc::new(LogAuditSink),
            initial_credits: DEFAULT_INITIAL_CREDITS,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_initial_credits(mut self, credits: Decimal) -> Self {
        self.initial_credits = credits;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.ledger.store()
    }

    /// Matching engine sharing this exchange's ledger, locks, and audit sink.
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.ledger.clone()).with_audit(Arc::clone(&self.audit))
    }

    /// Creates an account with the initial credit grant.
    pub async fn signup(&self, username: &str, password: &str) -> Result<AccountView, ExchangeError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ExchangeError::InvalidInput(
                "username and password are required".into(),
            ));
        }
        let account = Account::new(username, hash_password(username, password), self.initial_credits);
        if !self.store().insert_account(&account).await? {
            self.audit.emit(&AuditEvent::now(username, "signup", None, Outcome::Rejected));
            return Err(ExchangeError::AccountExists(username.to_string()));
        }
        log::info!("account created username={} credits={}", username, account.credits);
        self.audit.emit(&AuditEvent::now(username, "signup", None, Outcome::Success));
        Ok(account.view())
    }

    /// Verifies the password and returns a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ExchangeError> {
        let username = username.trim();
        let valid = match self.store().get_account(username).await? {
            Some(account) => verify_password(username, password, &account.password_hash),
            None => false,
        };
        if !valid {
            self.audit.emit(&AuditEvent::now(username, "login", None, Outcome::Rejected));
            return Err(ExchangeError::InvalidCredentials);
        }
        self.audit.emit(&AuditEvent::now(username, "login", None, Outcome::Success));
        self.auth.issue_token(username)
    }

    /// Validates and executes an order under the account lock, then records it.
    ///
    /// Market orders settle immediately and are stored as done at the execution price. Limit
    /// orders are validated against current credits/holdings and stored as pending; the matching
    /// engine settles them later.
    ///
    /// A store failure before settlement leaves the account untouched and is returned. Once a
    /// market order has settled it is returned as executed even if its record could not be saved.
    pub async fn submit_order(&self, username: &str, request: OrderRequest) -> Result<Order, ExchangeError> {
        let result = self.try_submit(username, &request).await;
        self.audit.emit(&AuditEvent::now(
            username,
            "order_submit",
            Some(serde_json::json!({
                "symbol": request.symbol,
                "side": request.side,
                "order_type": request.kind,
                "quantity": request.quantity,
                "order_id": result.as_ref().ok().map(|o| o.id.0.clone()),
            })),
            Outcome::of(&result),
        ));
        match &result {
            Ok(order) => log::info!(
                "order submitted order_id={} username={} side={:?} kind={:?} symbol={} quantity={} price={} status={:?}",
                order.id,
                order.username,
                order.side,
                order.kind,
                order.symbol,
                order.quantity,
                order.price,
                order.status
            ),
            Err(e) => log::info!("order rejected username={} symbol={} reason={}", username, request.symbol, e),
        }
        result
    }

    async fn try_submit(&self, username: &str, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let quantity = u64::try_from(request.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(ExchangeError::InvalidQuantity)?;
        if request.kind == OrderKind::Limit && !request.price.map_or(false, |p| p > Decimal::ZERO) {
            return Err(ExchangeError::InvalidPrice);
        }
        if self.store().get_price(&request.symbol).await?.is_none() {
            return Err(ExchangeError::InstrumentNotFound(request.symbol.clone()));
        }

        let mut guard = self.ledger.lock_account(username).await?;
        let execution = match request.side {
            Side::Buy => {
                self.ledger
                    .execute_buy(&mut guard, &request.symbol, quantity, request.kind, request.price)
                    .await?
            }
            Side::Sell => {
                self.ledger
                    .execute_sell(&mut guard, &request.symbol, quantity, request.kind, request.price)
                    .await?
            }
        };
        let (price, status) = match execution {
            Execution::Settled { price } => (price, OrderStatus::Done),
            Execution::Validated => (request.price.unwrap_or(Decimal::ZERO), OrderStatus::Pending),
        };
        let order = Order {
            id: OrderId::generate(),
            username: guard.username().to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            kind: request.kind,
            quantity,
            price,
            status,
            executed_price: None,
            created_at: Utc::now(),
        };
        // recorded while the account lock is still held
        if let Err(e) = self.store().insert_order(&order).await {
            if order.status == OrderStatus::Pending {
                return Err(e.into());
            }
            // the trade is already settled; a retry would execute it twice
            log::error!(
                "order record lost after execution order_id={} username={} symbol={} quantity={} price={} error={}",
                order.id,
                order.username,
                order.symbol,
                order.quantity,
                order.price,
                e
            );
        }
        Ok(order)
    }

    pub async fn list_orders(&self, username: &str) -> Result<Vec<Order>, ExchangeError> {
        Ok(self.store().find_orders(&OrderFilter::by_username(username)).await?)
    }

    pub async fn get_account(&self, username: &str) -> Result<AccountView, ExchangeError> {
        self.store()
            .get_account(username)
            .await?
            .map(|a| a.view())
            .ok_or_else(|| ExchangeError::AccountNotFound(username.to_string()))
    }

    pub async fn list_prices(&self) -> Result<Vec<InstrumentPrice>, ExchangeError> {
        Ok(self.store().list_prices().await?)
    }

    pub async fn get_price(&self, symbol: &str) -> Result<InstrumentPrice, ExchangeError> {
        self.store()
            .get_price(symbol)
            .await?
            .ok_or_else(|| ExchangeError::InstrumentNotFound(symbol.to_string()))
    }
}
