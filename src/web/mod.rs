pub mod admin;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod hr;
pub mod reports;
pub mod session;
pub mod upload;

use crate::db;
use crate::state::SharedState;
use axum::{routing::get, Json, Router};
use session::EmployeeSession;

async fn health() -> &'static str {
    "OK"
}

/// The caller's own employee profile.
async fn me(EmployeeSession(employee): EmployeeSession) -> Json<db::EmployeeRow> {
    Json(employee)
}

pub fn routes(state: SharedState) -> Router {
    let hr = hr::router(state.clone())
        .merge(dashboard::router(state.clone()))
        .merge(reports::router(state.clone()))
        .merge(upload::router(state.clone()));

    let api = Router::new()
        .route("/me", get(me))
        .with_state(state.clone())
        .nest("/auth", auth::router(state.clone()))
        .nest("/chat", chat::router(state.clone()))
        .nest("/hr", hr)
        .nest("/admin", admin::router(state));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
}
