//! Price-update events fanned out to WebSocket clients.
//!
//! The simulator publishes on a [`tokio::sync::broadcast`] channel and never waits on readers;
//! a send with no subscribers is not an error for the engine.

use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::types::InstrumentPrice;

/// Slow subscribers lag (and skip) once this many events are buffered.
pub const EVENT_BUFFER: usize = 256;

pub type EventSender = broadcast::Sender<MarketEvent>;

pub fn channel() -> (EventSender, broadcast::Receiver<MarketEvent>) {
    broadcast::channel(EVENT_BUFFER)
}

/// One instrument's state after a tick.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub volume: u64,
    pub price_history: Vec<Decimal>,
}

impl From<&InstrumentPrice> for PriceUpdate {
    fn from(p: &InstrumentPrice) -> Self {
        Self {
            symbol: p.symbol.clone(),
            price: p.price,
            change: p.change,
            day_high: p.day_high,
            day_low: p.day_low,
            volume: p.volume,
            price_history: p.price_history.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarketEvent {
    PriceUpdate { prices: Vec<PriceUpdate> },
}

impl MarketEvent {
    pub fn from_prices<'a>(prices: impl IntoIterator<Item = &'a InstrumentPrice>) -> Self {
        MarketEvent::PriceUpdate {
            prices: prices.into_iter().map(PriceUpdate::from).collect(),
        }
    }
}
