pub mod health;
pub mod margin;
pub mod positions;
pub mod reports;

use crate::config::Config;
use crate::db::Repository;
use crate::engine::{LifecycleManager, MarginLedger};
use crate::error::AppError;
use crate::pricing::PriceSource;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub lifecycle: Arc<LifecycleManager>,
    pub ledger: Arc<MarginLedger>,
    pub pricing: Arc<dyn PriceSource>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        lifecycle: Arc<LifecycleManager>,
        ledger: Arc<MarginLedger>,
        pricing: Arc<dyn PriceSource>,
        config: Config,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            ledger,
            pricing,
            config,
        }
    }
}

/// Resolved user id from the `user` query parameter.
///
/// The authorization layer in front of this service resolves the session to
/// a user id; this only rejects blank values.
pub(crate) fn parse_user(input: &str) -> Result<crate::domain::UserId, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("user must not be empty".to_string()));
    }
    Ok(crate::domain::UserId::new(trimmed.to_string()))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/positions",
            post(positions::open_position).get(positions::list_positions),
        )
        .route("/positions/:id/close", post(positions::close_position))
        .route("/positions/:id", delete(positions::delete_position))
        .route("/reports", get(reports::get_report))
        .route("/margin", get(margin::get_margin))
        .route("/margin/total", put(margin::set_total))
        .route("/margin/adjust", post(margin::adjust_total))
        .layer(cors)
        .with_state(state)
}
