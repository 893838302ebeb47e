//! Administrative volume-tools endpoints.
//!
//! Served on a separate, optional listener so maintenance operations can
//! be firewalled independently of the plugin protocol.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use silo_driver::PermsOpener;
use silo_driver::protocol::{ErrorResponse, OpenPermsRequest};
use tower_http::trace::TraceLayer;

/// The administrative router.
pub fn app(opener: Arc<PermsOpener>) -> Router {
    Router::new()
        .route("/VolTools.OpenPerms", post(open_perms))
        .layer(TraceLayer::new_for_http())
        .with_state(opener)
}

async fn open_perms(
    State(opener): State<Arc<PermsOpener>>,
    Json(request): Json<OpenPermsRequest>,
) -> Json<ErrorResponse> {
    Json(match opener.open_perms(request).await {
        Ok(()) => ErrorResponse::default(),
        Err(err) => ErrorResponse::error(err),
    })
}
