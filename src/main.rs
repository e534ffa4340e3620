//! Exchange server: seeds the catalog, starts the price simulator, and serves the HTTP/WebSocket API.

use dire_exchange_sim::{
    api, catalog, events, AuthConfig, Config, Exchange, FileStore, LockRegistry, MemoryStore,
    Simulator, Store, TimeoutStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = env_logger::try_init();
    let config = Config::from_env();

    let store: Arc<dyn Store> = match &config.data_file {
        Some(path) => Arc::new(TimeoutStore::new(FileStore::open(path)?, config.store_timeout)),
        None => {
            log::info!("DATA_FILE not set; state is kept in memory only");
            Arc::new(TimeoutStore::new(MemoryStore::new(), config.store_timeout))
        }
    };
    catalog::seed_catalog(store.as_ref(), &catalog::default_catalog()).await?;

    let auth = AuthConfig::new(&config.jwt_secret, config.token_ttl);
    let exchange = Exchange::new(Arc::clone(&store), Arc::new(LockRegistry::new()), auth.clone())
        .with_initial_credits(config.initial_credits);

    let (event_tx, _) = events::channel();
    let simulator = Simulator::new(
        config.simulator.clone(),
        Arc::clone(&store),
        exchange.matcher(),
        event_tx.clone(),
    );
    let sim_handle = simulator.spawn();

    let app = api::create_router(api::AppState::new(exchange, event_tx), auth);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("listening on http://{}", addr);
    let served = axum::serve(listener, app.into_make_service()).await;
    sim_handle.abort();
    served?;
    Ok(())
}
