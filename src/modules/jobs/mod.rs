use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod archive;
pub mod dto;
pub mod handler;
pub mod keys;
pub mod model;
pub mod orchestrator;
pub mod service;
pub mod status;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(handler::upload))
        .route("/convert", post(handler::convert))
        .route("/download/{unique_key}", get(handler::download))
        .route("/status/{unique_key}", get(handler::status))
}
