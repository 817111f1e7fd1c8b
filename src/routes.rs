use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::common::error::AppError;
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::docs::ApiDoc;
use crate::state::AppState;

pub fn configure_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(crate::modules::jobs::router())
        .route("/health", get(health))
        .fallback(not_found)
        .layer(cors)
}

async fn health() -> ApiSuccess<ApiResponse<&'static str>> {
    ApiSuccess(ApiResponse::success("ok", "Service is healthy"), StatusCode::OK)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}
