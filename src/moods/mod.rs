mod dto;
pub mod handlers;
pub mod insights;
pub mod sentiment;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::api_routes())
        .merge(handlers::page_routes())
}
