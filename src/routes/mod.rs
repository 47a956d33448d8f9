mod v1;
mod v2;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", v1::router())
        .nest("/api/v2", v2::router())
        .with_state(state)
}
