//! Documentation of a restaurant recommendation backend.
//!
//! [Publishing](https://www.reddit.com/r/rust/comments/195ao81/publishing_documentation_as_github_page/) docs to GitHub Pages.
//!
//!
//!
//! # General Infrastructure
//! - The app authenticates users and calls this service with their uid
//! - Restaurants live in Meilisearch, shared with the app's search and CRUD endpoints
//! - Everything the recommender writes lives in Redis
//! - A `memory` backend runs the same pipeline without either, for local work and tests
//!
//!
//!
//! # Flow
//!
//! 1. Clicks on a restaurant bump its tags in a per-user accumulator (`POST /users/{uid}/clicks`)
//! 2. Registration, logout or an explicit preference submission triggers a recompute
//! 3. A recompute folds the clicks into the durable preference vector, scores every restaurant and
//!    writes the result as numbered pages under a fresh generation
//! 4. Only a fully written generation is published; readers page through it (`GET /recommend/{uid}/{page}`)
//!
//! See [`recommend`] for the pipeline and [`recommend::coordinator`] for how runs are serialized per user.
//!
//!
//!
//! # Routes
//!
//! | Method | Path                        | Status                                   |
//! |--------|-----------------------------|------------------------------------------|
//! | POST   | `/users/{uid}`              | 201, recompute runs in the background    |
//! | POST   | `/users/{uid}/logout`       | 202, recompute runs in the background    |
//! | PUT    | `/users/{uid}/preference`   | 200 with the run outcome                 |
//! | POST   | `/users/{uid}/clicks`       | 204                                      |
//! | GET    | `/recommend/{uid}/{page}`   | 200, 400 out of range, 404 not ready     |
//! | GET    | `/random_recommend`         | 200, 503 when the catalog is down        |
//!
//!
//!
//! # Notes
//!
//! ## Redis + Meilisearch
//! Meilisearch is fundamentally a search engine, not a database. Per-click increments and per-user lookups go to
//! Redis for atomic operations and O(1) access. The catalog is only ever listed in full by a recompute, so a
//! slightly stale listing is fine.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally without Redis or Meilisearch.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run --bin feed
//! ```
//!
//! Build the catalog bank from an export.
//! ```sh
//! cargo run --bin process -- restaurants.json
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod recommend;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;
pub mod utils;

use routes::{
    click_handler, logout_handler, preference_handler, random_handler, recommend_handler,
    register_handler,
};
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server shutting down...");
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/users/{uid}", post(register_handler))
        .route("/users/{uid}/logout", post(logout_handler))
        .route("/users/{uid}/preference", put(preference_handler))
        .route("/users/{uid}/clicks", post(click_handler))
        .route("/recommend/{uid}/{page}", get(recommend_handler))
        .route("/random_recommend", get(random_handler))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
