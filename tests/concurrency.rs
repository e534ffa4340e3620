//! Concurrent submissions against one account never oversell it.

use dire_exchange_sim::catalog::{default_catalog, seed_catalog};
use dire_exchange_sim::{
    AuthConfig, Exchange, ExchangeError, LockRegistry, MemoryStore, OrderKind, OrderRequest, Side, Store,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

async fn exchange(credits: i64) -> Arc<Exchange> {
    let store = Arc::new(MemoryStore::new());
    seed_catalog(store.as_ref(), &default_catalog()).await.unwrap();
    let exchange = Exchange::new(
        store,
        Arc::new(LockRegistry::new()),
        AuthConfig::new("secret", Duration::from_secs(60)),
    )
    .with_initial_credits(Decimal::from(credits));
    exchange.signup("alice", "pw").await.unwrap();
    Arc::new(exchange)
}

fn market(side: Side, quantity: i64) -> OrderRequest {
    OrderRequest {
        symbol: "AAPL".into(),
        side,
        kind: OrderKind::Market,
        quantity,
        price: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_funded_for_one_succeed_once() {
    const N: usize = 16;
    // AAPL is 150; 10 units cost 1500, two would need 3000
    let exchange = exchange(2000).await;
    let mut handles = Vec::new();
    for _ in 0..N {
        let exchange = Arc::clone(&exchange);
        handles.push(tokio::spawn(async move {
            exchange.submit_order("alice", market(Side::Buy, 10)).await
        }));
    }
    let mut ok = 0;
    let mut insufficient = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ExchangeError::InsufficientCredits { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(insufficient, N - 1);
    let account = exchange.get_account("alice").await.unwrap();
    assert_eq!(account.credits, Decimal::from(500));
    assert_eq!(account.portfolio.get("AAPL"), Some(&10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sells_never_go_below_zero_holdings() {
    const N: usize = 12;
    let exchange = exchange(2000).await;
    exchange.submit_order("alice", market(Side::Buy, 5)).await.unwrap();
    let mut handles = Vec::new();
    for _ in 0..N {
        let exchange = Arc::clone(&exchange);
        handles.push(tokio::spawn(async move {
            exchange.submit_order("alice", market(Side::Sell, 1)).await
        }));
    }
    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ExchangeError::InsufficientHoldings { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 5);
    let account = exchange.get_account("alice").await.unwrap();
    assert!(account.portfolio.is_empty());
    assert_eq!(account.credits, Decimal::from(2000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn matching_and_direct_orders_share_the_account_lock() {
    let exchange = exchange(1000).await;
    // two limit buys of 5 @ <=100 would need 1000 together at 100
    for _ in 0..2 {
        exchange
            .submit_order(
                "alice",
                OrderRequest {
                    symbol: "DIS".into(),
                    side: Side::Buy,
                    kind: OrderKind::Limit,
                    quantity: 5,
                    price: Some(Decimal::from(100)),
                },
            )
            .await
            .unwrap();
    }
    let matcher = exchange.matcher();
    let direct = {
        let exchange = Arc::clone(&exchange);
        tokio::spawn(async move {
            exchange
                .submit_order(
                    "alice",
                    OrderRequest {
                        symbol: "INTC".into(),
                        side: Side::Buy,
                        kind: OrderKind::Market,
                        quantity: 10,
                        price: None,
                    },
                )
                .await
        })
    };
    let summary = matcher.on_price("DIS", Decimal::from(95)).await.unwrap();
    let direct = direct.await.unwrap();

    let account = exchange.get_account("alice").await.unwrap();
    assert!(account.credits >= Decimal::ZERO);
    let spent_on_dis = Decimal::from(95 * 5) * Decimal::from(summary.executed as u64);
    let spent_on_intc = if direct.is_ok() { Decimal::from(450) } else { Decimal::ZERO };
    assert_eq!(account.credits, Decimal::from(1000) - spent_on_dis - spent_on_intc);
    let stored = exchange.store().get_account("alice").await.unwrap().unwrap();
    assert!(stored.holdings.values().all(|q| *q > 0));
}
