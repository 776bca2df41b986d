//! HTTP surface for the admin tool.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Extension, Router,
};

use crate::config::RecalcDefaults;
use crate::store::StoreProvider;

pub use auth::BearerAuth;
pub use error::AppError;

/// Build the router. `/health` is public; everything under `/api` needs the
/// admin bearer token.
pub fn build_router(
    stores: Arc<dyn StoreProvider>,
    defaults: RecalcDefaults,
    auth: BearerAuth,
) -> Router {
    let protected = Router::new()
        .route("/api/tags", post(handlers::create_tag))
        .route("/api/tags/recalc", post(handlers::recalc))
        .route("/api/tags/lint", get(handlers::lint))
        .layer(axum_mw::from_fn(auth::bearer_auth))
        .layer(Extension(auth));

    let public = Router::new().route("/health", get(handlers::health));

    public
        .merge(protected)
        .layer(Extension(stores))
        .layer(Extension(defaults))
}
