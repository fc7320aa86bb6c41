//! HTTP surface for the todo list.
//!
//! Every response body, success or failure, is a tab-indented JSON envelope
//! produced by [`todo_core::encode`]. Store calls are bounded by the
//! configured operation timeout.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use todo_core::MAX_BODY_BYTES;
use todo_store_sqlite::SqliteItemStore;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
mod errors;
mod handlers;
mod json;
pub mod logging;

pub use config::{Args, Config, Environment};
pub use errors::ApiFailure;

/// Shared, read-only request context.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SqliteItemStore,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, store: SqliteItemStore) -> Self {
        Self { config: Arc::new(config), store }
    }
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route(
            "/v1/healthcheck",
            get(handlers::healthcheck).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/list",
            get(handlers::list_items)
                .post(handlers::create_item)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/list/:id",
            get(handlers::show_item)
                .patch(handlers::update_item)
                .delete(handlers::delete_item)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found);
    with_request_limits(router, state.config.request_timeout).with_state(state)
}

/// Body cap, whole-request timeout (408 on expiry) and request tracing.
fn with_request_limits<S>(router: Router<S>, request_timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
