//! Fixed instrument catalog seeded at bootstrap.

use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::store::Store;
use crate::types::InstrumentPrice;

/// symbol, name, logo domain, price, day high, day low, day open, volume (prices in cents).
const SEED: &[(&str, &str, &str, i64, i64, i64, i64, u64)] = &[
    ("AAPL", "Apple Inc.", "apple.com", 15000, 15150, 14820, 14900, 45_000_000),
    ("TSLA", "Tesla, Inc.", "tesla.com", 25000, 25580, 24710, 24850, 82_000_000),
    ("AMZN", "Amazon.com, Inc.", "amazon.com", 13500, 13720, 13380, 13450, 52_000_000),
    ("GOOGL", "Alphabet Inc.", "google.com", 14000, 14250, 13890, 13950, 28_000_000),
    ("MSFT", "Microsoft Corporation", "microsoft.com", 38000, 38560, 37730, 37900, 35_000_000),
    ("NVDA", "NVIDIA Corporation", "nvidia.com", 49500, 50280, 49020, 49200, 68_000_000),
    ("META", "Meta Platforms, Inc.", "meta.com", 33000, 33590, 32740, 32850, 42_000_000),
    ("NFLX", "Netflix, Inc.", "netflix.com", 44500, 45030, 44180, 44300, 25_000_000),
    ("AMD", "Advanced Micro Devices", "amd.com", 12000, 12280, 11840, 11920, 58_000_000),
    ("DIS", "The Walt Disney Company", "disney.com", 9500, 9650, 9380, 9420, 32_000_000),
    ("INTC", "Intel Corporation", "intel.com", 4500, 4590, 4420, 4480, 48_000_000),
    ("BABA", "Alibaba Group", "alibaba.com", 8500, 8680, 8390, 8450, 38_000_000),
];

/// The default instruments with their opening statistics.
pub fn default_catalog() -> Vec<InstrumentPrice> {
    SEED.iter()
        .map(|&(symbol, name, domain, price, high, low, open, volume)| {
            let price = Decimal::new(price, 2);
            InstrumentPrice {
                symbol: symbol.to_string(),
                name: name.to_string(),
                logo: format!("https://logo.clearbit.com/{domain}"),
                price,
                change: Decimal::ZERO,
                price_history: vec![price],
                day_high: Decimal::new(high, 2),
                day_low: Decimal::new(low, 2),
                day_open: Decimal::new(open, 2),
                volume,
            }
        })
        .collect()
}

/// Inserts each instrument that is not already present. Existing records are left untouched,
/// so running this on every startup is safe. Returns how many were inserted.
pub async fn seed_catalog(store: &dyn Store, catalog: &[InstrumentPrice]) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for instrument in catalog {
        if store.insert_price_if_absent(instrument).await? {
            inserted += 1;
        }
    }
    log::info!("catalog seeded inserted={} total={}", inserted, catalog.len());
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn catalog_ranges_contain_price() {
        for p in default_catalog() {
            assert!(p.day_low <= p.price && p.price <= p.day_high, "{}", p.symbol);
            assert_eq!(p.price_history, vec![p.price]);
        }
    }

    #[tokio::test]
    async fn seeding_twice_neither_duplicates_nor_overwrites() {
        let store = MemoryStore::new();
        let catalog = default_catalog();
        assert_eq!(seed_catalog(&store, &catalog).await.unwrap(), catalog.len());

        let mut moved = store.get_price("AAPL").await.unwrap().unwrap();
        moved.record_tick(Decimal::new(15500, 2), 10);
        store.put_price(&moved).await.unwrap();

        assert_eq!(seed_catalog(&store, &catalog).await.unwrap(), 0);
        let prices = store.list_prices().await.unwrap();
        assert_eq!(prices.len(), catalog.len());
        let aapl = store.get_price("AAPL").await.unwrap().unwrap();
        assert_eq!(aapl.price, Decimal::new(15500, 2));
    }
}
