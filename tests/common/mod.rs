//! Shared test helpers for integration tests.

#![allow(dead_code)]

use lifeflow::config::{ClientConfig, ServerConfig};
use lifeflow::endpoint::{build_router, AppState};
use lifeflow::sheet::SheetStore;
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed store in a fresh temporary directory.
///
/// The `TempDir` must be kept alive for as long as the store is used.
pub fn test_store() -> (SheetStore, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ServerConfig::default();
    let store = SheetStore::open(&dir.path().join("workbook.json"), config.layout())
        .expect("open workbook");
    (store, dir)
}

/// Endpoint state over a fresh file-backed workbook.
pub fn test_state() -> (Arc<AppState>, TempDir) {
    let (store, dir) = test_store();
    let mut config = ServerConfig::default();
    config.workbook = dir.path().join("workbook.json");
    (AppState::new(store, config), dir)
}

/// Build an Axum router over a fresh workbook, plus its state for direct inspection.
pub fn build_test_app() -> (axum::Router, Arc<AppState>, TempDir) {
    let (state, dir) = test_state();
    (build_router(state.clone()), state, dir)
}

/// Serve a fresh endpoint on an ephemeral port; returns its base URL.
pub async fn spawn_endpoint() -> (String, Arc<AppState>, TempDir) {
    let (state, dir) = test_state();
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{}", addr), state, dir)
}

/// Client settings pointing at `endpoint` with a short settle delay.
pub fn client_config(endpoint: &str) -> ClientConfig {
    ClientConfig {
        endpoint: endpoint.to_string(),
        settle_delay_ms: 50,
        max_retries: 0,
        retry_base_delay_ms: 10,
        ..Default::default()
    }
}

/// An `addDonor` payload with every required field filled in.
pub fn donor_json(name: &str, phone: &str) -> serde_json::Value {
    serde_json::json!({
        "donorName": name,
        "phoneNumber": phone,
        "channel": "Website",
        "donationType": "Blood",
        "appointmentDate": "2026-10-20",
        "time": "09:00",
        "status": "Queued"
    })
}

pub fn donor_draft(name: &str, phone: &str) -> lifeflow::records::DonorDraft {
    serde_json::from_value(donor_json(name, phone)).expect("draft")
}
