use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod form;
mod handlers;
mod redirect;
mod render;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let body_limit = state.upload_max_bytes;
    Router::new()
        .merge(routes::health())
        .merge(routes::posts())
        .merge(routes::follow())
        .merge(routes::auth())
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
