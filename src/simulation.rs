//! Synthetic price driver.
//!
//! Every tick moves each instrument by a bounded symmetric random walk, records the derived
//! statistics, persists it, and runs limit-order matching at the new price. A fixed seed
//! reproduces the same walk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ExchangeError;
use crate::events::{EventSender, MarketEvent};
use crate::matching::Matcher;
use crate::store::Store;

/// Prices never walk below one cent.
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Configuration for the price simulator. Same seed ⇒ same walk.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// RNG seed. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub tick_interval: Duration,
    /// Largest move per tick as a percentage of the current price (2.0 = ±2%).
    pub max_move_pct: f64,
    /// Simulated traded volume added per tick (inclusive range).
    pub volume_min: u64,
    pub volume_max: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_interval: Duration::from_secs(2),
            max_move_pct: 2.0,
            volume_min: 1_000,
            volume_max: 50_000,
        }
    }
}

/// Bounded symmetric random walk.
pub struct PriceWalk {
    rng: StdRng,
    max_move: f64,
    volume: (u64, u64),
}

impl PriceWalk {
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_move = if config.max_move_pct.is_finite() {
            (config.max_move_pct.abs() / 100.0).min(1.0)
        } else {
            0.0
        };
        let volume = (
            config.volume_min.min(config.volume_max),
            config.volume_min.max(config.volume_max),
        );
        Self {
            rng,
            max_move,
            volume,
        }
    }

    /// Next price: `current × (1 + u)` with `u` uniform in `±max_move`, rounded to cents.
    pub fn step(&mut self, current: Decimal) -> Decimal {
        let u: f64 = self.rng.gen_range(-self.max_move..=self.max_move);
        let factor = Decimal::ONE + Decimal::try_from(u).unwrap_or(Decimal::ZERO);
        current
            .checked_mul(factor)
            .unwrap_or(current)
            .round_dp(2)
            .max(MIN_PRICE)
    }

    pub fn traded_volume(&mut self) -> u64 {
        self.rng.gen_range(self.volume.0..=self.volume.1)
    }
}

/// Outcome of one [`Simulator::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub updated: usize,
    /// Instruments whose update could not be persisted; retried next tick.
    pub failed: usize,
    pub orders_executed: usize,
}

/// Owns the walk; the driver task owns the simulator, so ticks never overlap.
pub struct Simulator {
    config: SimulatorConfig,
    walk: PriceWalk,
    store: Arc<dyn Store>,
    matcher: Matcher,
    events: EventSender,
}

impl Simulator {
    pub fn new(config: SimulatorConfig, store: Arc<dyn Store>, matcher: Matcher, events: EventSender) -> Self {
        let walk = PriceWalk::new(&config);
        Self {
            config,
            walk,
            store,
            matcher,
            events,
        }
    }

    /// One pass over every instrument, in store order.
    ///
    /// A failure to persist one instrument is logged and does not stop the others. Only a
    /// failure to list instruments fails the whole tick.
    pub async fn tick(&mut self) -> Result<TickReport, ExchangeError> {
        let instruments = self.store.list_prices().await?;
        let mut report = TickReport::default();
        let mut updated = Vec::with_capacity(instruments.len());
        for mut instrument in instruments {
            let new_price = self.walk.step(instrument.price);
            let volume = self.walk.traded_volume();
            instrument.record_tick(new_price, volume);
            if let Err(e) = self.store.put_price(&instrument).await {
                log::warn!("price update not persisted symbol={} error={}", instrument.symbol, e);
                report.failed += 1;
                continue;
            }
            report.updated += 1;
            match self.matcher.on_price(&instrument.symbol, new_price).await {
                Ok(summary) => report.orders_executed += summary.executed,
                Err(e) => log::warn!("matching skipped symbol={} error={}", instrument.symbol, e),
            }
            updated.push(instrument);
        }
        if !updated.is_empty() {
            // no subscribers is fine
            let _ = self.events.send(MarketEvent::from_prices(&updated));
        }
        Ok(report)
    }

    /// Ticks every `tick_interval` until the task is dropped or aborted.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick of an interval completes immediately
        interval.tick().await;
        log::info!("simulator started interval_ms={}", self.config.tick_interval.as_millis());
        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(report) => log::debug!(
                    "tick updated={} failed={} orders_executed={}",
                    report.updated,
                    report.failed,
                    report.orders_executed
                ),
                Err(e) => log::warn!("tick skipped error={}", e),
            }
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
