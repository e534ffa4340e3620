//! Limit-order triggering against the simulated price.
//!
//! There is no order book: each pending limit order is matched unilaterally against the new
//! market price. [`Matcher::on_price`] runs once per instrument per tick, settles every
//! triggered order at that tick's price, and leaves orders that cannot settle pending.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink, LogAuditSink, Outcome};
use crate::error::ExchangeError;
use crate::ledger::Ledger;
use crate::store::OrderFilter;
use crate::types::{Order, OrderStatus, Side};

/// True when `price` crosses the order's limit: buys at or below, sells at or above.
pub fn is_triggered(order: &Order, price: Decimal) -> bool {
    match order.side {
        Side::Buy => price <= order.price,
        Side::Sell => price >= order.price,
    }
}

/// Outcome counts of one [`Matcher::on_price`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub executed: usize,
    /// Triggered but left pending (insufficient funds, missing account, store failure).
    pub deferred: usize,
}

#[derive(Clone)]
pub struct Matcher {
    ledger: Ledger,
    audit: Arc<dyn AuditSink>,
}

impl Matcher {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            audit: Arc::new(LogAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Evaluates pending limit orders for `symbol` at `price`, in store order.
    ///
    /// Fails only when the pending orders cannot be listed; per-order failures are logged and
    /// counted as deferred.
    pub async fn on_price(&self, symbol: &str, price: Decimal) -> Result<MatchSummary, ExchangeError> {
        let orders = self
            .ledger
            .store()
            .find_orders(&OrderFilter::pending_limits(symbol))
            .await?;
        let mut summary = MatchSummary {
            evaluated: orders.len(),
            ..Default::default()
        };
        for order in orders.iter().filter(|o| is_triggered(o, price)) {
            summary.triggered += 1;
            match self.execute(order, price).await {
                Ok(()) => {
                    summary.executed += 1;
                    log::info!(
                        "limit order executed order_id={} username={} side={:?} symbol={} quantity={} limit={} price={}",
                        order.id,
                        order.username,
                        order.side,
                        order.symbol,
                        order.quantity,
                        order.price,
                        price
                    );
                    self.audit.emit(&AuditEvent::now(
                        &order.username,
                        "order_settle",
                        Some(serde_json::json!({
                            "order_id": order.id.0,
                            "symbol": order.symbol,
                            "price": price.to_string(),
                        })),
                        Outcome::Success,
                    ));
                }
                Err(e) => {
                    summary.deferred += 1;
                    if e.is_rejection() {
                        log::debug!("limit order deferred order_id={} reason={}", order.id, e);
                    } else {
                        log::warn!("limit order deferred order_id={} error={}", order.id, e);
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Settles one order, then marks it done.
    ///
    /// The account and the order are separate documents. If the status update is lost after
    /// the account was written, the order stays pending and can settle again on a later tick.
    async fn execute(&self, order: &Order, price: Decimal) -> Result<(), ExchangeError> {
        let mut guard = self.ledger.lock_account(&order.username).await?;
        self.ledger
            .settle(&mut guard, order.side, &order.symbol, order.quantity, price)
            .await?;
        match self
            .ledger
            .store()
            .update_order(&order.id, OrderStatus::Done, Some(price))
            .await
        {
            Ok(true) => {}
            Ok(false) => log::error!(
                "settled order vanished from store order_id={} username={}",
                order.id,
                order.username
            ),
            Err(e) => log::error!(
                "settled order still pending, may settle again order_id={} username={} symbol={} quantity={} price={} error={}",
                order.id,
                order.username,
                order.symbol,
                order.quantity,
                price,
                e
            ),
        }
        Ok(())
    }
}
