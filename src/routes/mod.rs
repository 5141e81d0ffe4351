pub mod auth;
pub mod keypairs;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/login", post(auth::login))
        // Keypairs
        .route("/api/keypairs", get(keypairs::list_keypairs))
        .route("/api/keypairs", post(keypairs::new_keypair))
        .route("/api/keypairs/scan", post(keypairs::scan_rfid))
        .route("/api/keypairs/name", post(keypairs::edit_keypair_name))
        .route("/api/keypairs/pin", post(keypairs::edit_keypair_pin))
        .route("/api/keypairs/uid", post(keypairs::edit_keypair_uid))
        .route("/api/keypairs/delete", post(keypairs::delete_keypair))
        .route("/api/keypairs/toggle-active", post(keypairs::toggle_keypair_active))
        .route("/api/keypairs/export.pdf", get(keypairs::export_pdf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
