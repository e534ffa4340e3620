//! HTTP and WebSocket surface.
//!
//! Used by the binary and by integration tests. Create with [`create_router`].
//! Uses Extension for state so the router is `Router<()>` and works with `into_make_service()`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::auth::{require_token, AuthConfig, AuthUser};
use crate::error::ExchangeError;
use crate::events::{EventSender, MarketEvent};
use crate::exchange::{Exchange, OrderRequest};

/// Shared app state: one exchange and the price-event fan-out.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<Exchange>,
    pub events: EventSender,
}

impl AppState {
    pub fn new(exchange: Exchange, events: EventSender) -> Self {
        Self {
            exchange: Arc::new(exchange),
            events,
        }
    }
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ExchangeError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            ExchangeError::InstrumentNotFound(_) => (StatusCode::NOT_FOUND, "INSTRUMENT_NOT_FOUND"),
            ExchangeError::InsufficientCredits { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_CREDITS"),
            ExchangeError::InsufficientHoldings { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_HOLDINGS"),
            ExchangeError::InvalidQuantity => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            ExchangeError::InvalidPrice => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
            ExchangeError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            ExchangeError::AccountExists(_) => (StatusCode::CONFLICT, "ACCOUNT_EXISTS"),
            ExchangeError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            ExchangeError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ExchangeError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            ExchangeError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = if self.is_rejection() {
            self.to_string()
        } else {
            log::error!("request failed error={}", self);
            "temporarily unavailable, please retry".to_string()
        };
        (
            status,
            Json(serde_json::json!({ "error": code, "message": message })),
        )
            .into_response()
    }
}

/// Builds the router. Returns `Router<()>` so you can call `.into_make_service()` for `axum::serve`.
pub fn create_router(state: AppState, auth: AuthConfig) -> Router<()> {
    let protected = Router::new()
        .route("/orders", post(submit_order).get(list_orders))
        .route("/account", get(account))
        .route_layer(middleware::from_fn_with_state(auth, require_token));

    Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/prices", get(prices))
        .route("/stocks/:symbol", get(stock))
        .route("/ws", get(ws_prices))
        .nest("/api", protected)
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(serde::Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn signup(
    Extension(state): Extension<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, ExchangeError> {
    let view = state.exchange.signup(&body.username, &body.password).await?;
    #[derive(serde::Serialize)]
    struct Out {
        username: String,
        credits: rust_decimal::Decimal,
    }
    Ok((
        StatusCode::CREATED,
        Json(Out {
            username: view.username,
            credits: view.credits,
        }),
    )
        .into_response())
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, ExchangeError> {
    let token = state.exchange.login(&body.username, &body.password).await?;
    #[derive(serde::Serialize)]
    struct Out {
        token: String,
        username: String,
    }
    Ok(Json(Out {
        token,
        username: body.username.trim().to_string(),
    })
    .into_response())
}

async fn prices(Extension(state): Extension<AppState>) -> Result<Response, ExchangeError> {
    Ok(Json(state.exchange.list_prices().await?).into_response())
}

async fn stock(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
) -> Result<Response, ExchangeError> {
    Ok(Json(state.exchange.get_price(&symbol.to_uppercase()).await?).into_response())
}

async fn submit_order(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<OrderRequest>,
) -> Result<Response, ExchangeError> {
    let order = state.exchange.submit_order(&user.username, request).await?;
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

async fn list_orders(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ExchangeError> {
    Ok(Json(state.exchange.list_orders(&user.username).await?).into_response())
}

async fn account(
    Extension(state): Extension<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ExchangeError> {
    Ok(Json(state.exchange.get_account(&user.username).await?).into_response())
}

async fn ws_prices(ws: WebSocketUpgrade, Extension(state): Extension<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_prices(socket, state))
}

/// Sends a snapshot of every price, then forwards each tick's event until the client leaves.
async fn stream_prices(socket: WebSocket, state: AppState) {
    // subscribe before reading the snapshot so no tick falls in between
    let mut rx = state.events.subscribe();
    let (mut sink, mut incoming) = socket.split();

    let snapshot = match state.exchange.list_prices().await {
        Ok(prices) => MarketEvent::from_prices(&prices),
        Err(e) => {
            log::warn!("ws snapshot failed error={}", e);
            return;
        }
    };
    if send_event(&mut sink, &snapshot).await.is_err() {
        return;
    }

    let forward = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("ws client lagging skipped={}", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    let drain = async {
        while let Some(Ok(msg)) = incoming.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    };
    tokio::select! {
        _ = forward => {}
        _ = drain => {}
    }
}

async fn send_event<S>(sink: &mut S, event: &MarketEvent) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let text = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
