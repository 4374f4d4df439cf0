use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod pagination;
mod routes;
mod validate;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts())
        .merge(routes::feed())
        .merge(routes::search());

    Router::new()
        .merge(routes::health())
        .nest("/v1", api)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
