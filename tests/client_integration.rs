//! Client integration tests: `DataClient` against a live endpoint.
//!
//! Each test serves a fresh endpoint on an ephemeral port (see
//! `common::spawn_endpoint`) and drives it through the client exactly as the
//! dashboard does: fetch a snapshot, reconcile the target, send the write.
//!
//! # How to run
//!
//! ```bash
//! cargo test --test client_integration
//! ```
//!
//! # Testing strategy
//!
//! Covers both delivery modes, the refresh callback contract (fires after the
//! settle delay, only on success), reconciliation against stale lists with and
//! without record ids, connection retries, and the polling read path.

mod common;

use lifeflow::client::{DataClient, DeliveryMode, WriteError};
use lifeflow::records::{InventoryLevels, RowIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn client_for(endpoint: &str) -> DataClient {
    DataClient::new(&common::client_config(endpoint)).unwrap()
}

#[tokio::test]
async fn add_record_predicts_appended_row() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    for (n, p) in [("A", "1"), ("B", "2")] {
        client.add_donor(&common::donor_draft(n, p)).await.unwrap();
    }

    let snapshot = client.fetch_snapshot().await.unwrap();
    let added = client
        .add_record(&snapshot.donor_records, &common::donor_draft("C", "3"))
        .await
        .unwrap();
    assert_eq!(added.expected_row, RowIndex(4));
    assert_eq!(added.ack.row_index(), Some(RowIndex(4)));
    assert_eq!(added.ack.message(), Some("Donor added successfully"));
}

#[tokio::test]
async fn confirmed_mode_surfaces_endpoint_failures() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    let err = client
        .update_donor_status(RowIndex(9), "Booked")
        .await
        .unwrap_err();
    assert_eq!(err, WriteError::Rejected("Row index 9 is out of range".into()));
    assert_eq!(client.last_error().as_deref(), Some("Row index 9 is out of range"));
    assert!(!client.is_updating());
}

#[tokio::test]
async fn fire_and_forget_hides_endpoint_failures() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let mut config = common::client_config(&url);
    config.delivery = DeliveryMode::FireAndForget;
    let client = DataClient::new(&config).unwrap();

    let ack = client.delete_donor(RowIndex(42)).await.unwrap();
    assert_eq!(ack.action, "deleteDonor");
    assert!(ack.response.is_none());
    assert_eq!(client.last_error(), None);
}

#[tokio::test]
async fn refresh_runs_after_settle_delay_only_on_success() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    let client = client_for(&url)
        .with_refresh(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    client
        .update_inventory(InventoryLevels::all(120, 45, 30))
        .await
        .unwrap();
    assert_eq!(refreshes.load(Ordering::SeqCst), 0, "refresh must wait for the settle delay");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    client.delete_donor(RowIndex(2)).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inventory_ack_carries_stored_levels() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    let ack = client
        .update_inventory(InventoryLevels::all(120, 45, 30))
        .await
        .unwrap();
    let inv = ack.inventory().unwrap();
    assert_eq!((inv.blood_units, inv.plasma_units, inv.platelet_units), (120, 45, 30));
    let summary = client.fetch_summary().await.unwrap();
    assert_eq!(summary.total_units, 195);
}

#[tokio::test]
async fn reconciled_writes_refuse_stale_rows() {
    let (url, state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    for (n, p) in [("A", "1"), ("B", "2"), ("C", "3")] {
        client.add_donor(&common::donor_draft(n, p)).await.unwrap();
    }
    let stale = client.fetch_snapshot().await.unwrap().donor_records;

    client.remove_record(&stale, &stale[0]).await.unwrap();
    // B is now on row 2, but the stale list still places it on row 3.
    let err = client.remove_record(&stale, &stale[1]).await.unwrap_err();
    assert!(matches!(err, WriteError::Rejected(ref m) if m.starts_with("Row 3 no longer holds record")));

    let left: Vec<String> = state
        .store
        .donor_records()
        .unwrap()
        .into_iter()
        .map(|r| r.donor_name)
        .collect();
    assert_eq!(left, vec!["B", "C"]);

    let fresh = client.fetch_snapshot().await.unwrap().donor_records;
    client.set_record_status(&fresh, &fresh[0], "Completed").await.unwrap();
    assert_eq!(state.store.donor_records().unwrap()[0].status, "Completed");
}

#[tokio::test]
async fn edit_record_rewrites_details_in_place() {
    let (url, state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    client.add_donor(&common::donor_draft("Ann", "1")).await.unwrap();
    let list = client.fetch_snapshot().await.unwrap().donor_records;

    let mut draft = lifeflow::records::DonorDraft::from(&list[0]);
    draft.time = Some("15:45".into());
    draft.channel = Some("Referral".into());
    client.edit_record(&list, &list[0], &draft).await.unwrap();

    let stored = &state.store.donor_records().unwrap()[0];
    assert_eq!(stored.time, "15:45");
    assert_eq!(stored.channel, "Referral");
    assert_eq!(stored.timestamp, list[0].timestamp);
}

#[tokio::test]
async fn unknown_target_sends_nothing() {
    let (url, state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&url);
    client.add_donor(&common::donor_draft("Ann", "1")).await.unwrap();
    let list = client.fetch_snapshot().await.unwrap().donor_records;

    let mut ghost = list[0].clone();
    ghost.donor_name = "Nobody".into();
    ghost.record_id = None;
    let err = client.remove_record(&list, &ghost).await.unwrap_err();
    assert!(err.is_local());
    assert_eq!(state.store.donor_records().unwrap().len(), 1);
}

#[tokio::test]
async fn connection_failures_are_retried_then_reported() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = common::client_config(&format!("http://127.0.0.1:{}", port));
    config.max_retries = 2;
    config.retry_base_delay_ms = 20;
    let client = DataClient::new(&config).unwrap();

    let started = Instant::now();
    let err = client.delete_donor(RowIndex(2)).await.unwrap_err();
    assert!(matches!(err, WriteError::Transport(_)));
    // Two backoff sleeps: 20ms then 40ms.
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(client.last_error(), Some(err.to_string()));
}

#[tokio::test]
async fn non_json_answer_is_a_status_error() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = client_for(&format!("{}/no-such-prefix", url));
    let err = client.delete_donor(RowIndex(2)).await.unwrap_err();
    assert!(matches!(err, WriteError::Status { status: 404, .. }));
}

#[tokio::test]
async fn poll_snapshots_delivers_current_state() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = Arc::new(client_for(&url));
    client.add_donor(&common::donor_draft("Ann", "1")).await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = Arc::clone(&client).poll_snapshots(Duration::from_millis(50), move |snapshot| {
        let _ = tx.send(snapshot.donor_records.len());
    });
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, 1);
    handle.abort();
}

#[tokio::test]
async fn zero_poll_interval_still_polls() {
    let (url, _state, _dir) = common::spawn_endpoint().await;
    let client = Arc::new(client_for(&url));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = Arc::clone(&client).poll_snapshots(Duration::ZERO, move |snapshot| {
        let _ = tx.send(snapshot.donor_records.len());
    });
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, 0);
    handle.abort();
}
