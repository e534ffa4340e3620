//! Persistence: a [`Store`] that keeps every collection in a JSON file.
//! Enables recovery after restart: accounts, orders, and prices are reloaded on open.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::store::{Collections, MemoryStore, OrderFilter, Store};
use crate::types::{Account, InstrumentPrice, Order, OrderId, OrderStatus};

/// File-based store: [`MemoryStore`] plus one JSON file rewritten after every write.
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    // one writer at a time: copy, write, publish
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Opens `path`, loading existing state. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let collections = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str::<Collections>(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::default(),
            Err(e) => return Err(e.into()),
        };
        log::info!(
            "store loaded path={} accounts={} orders={} prices={}",
            path.display(),
            collections.accounts.len(),
            collections.orders.len(),
            collections.prices.len()
        );
        Ok(Self {
            path,
            memory: MemoryStore::from_collections(collections),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the state, writes the copy, then publishes it to readers.
    ///
    /// `change` returns whether anything changed; an unchanged state is not written. If the
    /// write fails, readers keep seeing the previous state.
    async fn commit(&self, change: impl FnOnce(&mut Collections) -> bool) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.memory.snapshot();
        if !change(&mut next) {
            return Ok(false);
        }
        if let Err(e) = self.write(&next).await {
            log::warn!("store write failed path={} error={}", self.path.display(), e);
            return Err(e);
        }
        self.memory.replace(next);
        Ok(true)
    }

    async fn write(&self, collections: &Collections) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(collections)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.memory.get_account(username).await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        self.commit(|c| c.insert_account(account)).await
    }

    async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        self.commit(|c| {
            c.put_account(account);
            true
        })
        .await
        .map(|_| ())
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<InstrumentPrice>, StoreError> {
        self.memory.get_price(symbol).await
    }

    async fn list_prices(&self) -> Result<Vec<InstrumentPrice>, StoreError> {
        self.memory.list_prices().await
    }

    async fn put_price(&self, price: &InstrumentPrice) -> Result<(), StoreError> {
        self.commit(|c| {
            c.put_price(price);
            true
        })
        .await
        .map(|_| ())
    }

    async fn insert_price_if_absent(&self, price: &InstrumentPrice) -> Result<bool, StoreError> {
        self.commit(|c| c.insert_price(price)).await
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.commit(|c| {
            c.orders.push(order.clone());
            true
        })
        .await
        .map(|_| ())
    }

    async fn update_order(
        &self,
        id: &OrderId,
        status: OrderStatus,
        executed_price: Option<rust_decimal::Decimal>,
    ) -> Result<bool, StoreError> {
        self.commit(|c| c.update_order(id, status, executed_price)).await
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        self.memory.find_orders(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::catalog::{default_catalog, seed_catalog};
    use crate::error::ExchangeError;
    use crate::exchange::{Exchange, OrderRequest};
    use crate::locks::LockRegistry;
    use crate::types::{OrderKind, Side};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("dire-exchange-{}.json", uuid::Uuid::new_v4()))
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dire-exchange-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = temp_path();
        {
            let store = FileStore::open(&path).unwrap();
            let mut account = Account::new("carol", "h", Decimal::new(150025, 2));
            account.holdings.insert("AMD".into(), 4);
            store.insert_account(&account).await.unwrap();
        }
        let reopened = FileStore::open(&path).unwrap();
        let account = reopened.get_account("carol").await.unwrap().expect("persisted");
        assert_eq!(account.credits, Decimal::new(150025, 2));
        assert_eq!(account.holding("AMD"), 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_missing_file_starts_empty() {
        let store = FileStore::open(temp_path()).unwrap();
        assert!(store.memory.snapshot().accounts.is_empty());
    }

    #[test]
    fn open_corrupt_file_is_an_error() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Serialization(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn failed_write_leaves_state_unchanged() {
        let dir = std::env::temp_dir().join(format!("dire-exchange-missing-{}", uuid::Uuid::new_v4()));
        let store = FileStore::open(dir.join("state.json")).unwrap();
        let account = Account::new("alice", "h", Decimal::from(2000));

        assert!(matches!(store.put_account(&account).await, Err(StoreError::Io(_))));
        assert!(store.get_account("alice").await.unwrap().is_none());
        assert!(matches!(store.insert_account(&account).await, Err(StoreError::Io(_))));
        assert!(store.memory.snapshot().accounts.is_empty());
    }

    #[tokio::test]
    async fn unchanged_state_is_not_written() {
        let dir = std::env::temp_dir().join(format!("dire-exchange-missing-{}", uuid::Uuid::new_v4()));
        let store = FileStore::open(dir.join("state.json")).unwrap();
        let updated = store
            .update_order(&OrderId("nope".into()), OrderStatus::Done, None)
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn submit_failing_to_persist_does_not_charge_the_account() {
        let dir = temp_dir();
        let store = Arc::new(FileStore::open(dir.join("state.json")).unwrap());
        seed_catalog(store.as_ref(), &default_catalog()).await.unwrap();
        let exchange = Exchange::new(
            store.clone(),
            Arc::new(LockRegistry::new()),
            AuthConfig::new("secret", Duration::from_secs(60)),
        );
        exchange.signup("alice", "pw").await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let result = exchange
            .submit_order(
                "alice",
                OrderRequest {
                    symbol: "AAPL".into(),
                    side: Side::Buy,
                    kind: OrderKind::Market,
                    quantity: 10,
                    price: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ExchangeError::StoreUnavailable(_))));
        let view = exchange.get_account("alice").await.unwrap();
        assert_eq!(view.credits, Decimal::from(2000));
        assert!(view.portfolio.is_empty());
        assert!(exchange.list_orders("alice").await.unwrap().is_empty());
    }
}
