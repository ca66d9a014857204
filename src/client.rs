//! # Client — Dashboard Data-Access Layer
//!
//! Wraps the write endpoint with one async method per action and the read
//! path with snapshot/summary fetches. The client tracks two pieces of shared
//! state the UI renders: whether a write is in flight ([`DataClient::is_updating`])
//! and the message of the most recent failure ([`DataClient::last_error`]).
//!
//! ## Write protocol
//!
//! Each write: marks the client as updating, clears the last error, posts the
//! envelope, and on success schedules the caller's refresh callback after the
//! settle delay so the next read observes the write. The updating flag is
//! cleared on every exit path.
//!
//! ## Delivery modes
//!
//! | Mode | Success means | Endpoint `success:false` |
//! |------|---------------|--------------------------|
//! | `Confirmed` (default) | endpoint answered `success:true` | [`WriteError::Rejected`] |
//! | `FireAndForget` | request was dispatched | invisible |
//!
//! `FireAndForget` reproduces the opaque-response transport the dashboard
//! originally used: application failures never reach the caller.
//!
//! ## Retries
//!
//! Only connection failures are retried (the request never reached the
//! endpoint), with exponential backoff. Timeouts and HTTP answers are not
//! retried because writes are not idempotent.

use crate::config::ClientConfig;
use crate::envelope::{Action, WriteResponse};
use crate::lock_or_recover;
use crate::query::DashboardSummary;
use crate::reconcile;
use crate::records::{DonorDraft, DonorRecord, InventoryEcho, InventoryLevels, RowIndex, Snapshot};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Confirmed,
    FireAndForget,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The target is not in the client's list; nothing was sent.
    #[error("Could not find record for {donor_name} ({phone_number})")]
    RecordNotFound {
        donor_name: String,
        phone_number: String,
    },
    /// Required form fields are blank; nothing was sent.
    #[error("Missing required fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),
    /// The request could not be delivered; message passed through verbatim.
    #[error("{0}")]
    Transport(String),
    /// The endpoint answered with something other than a result object.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The endpoint answered `success:false`.
    #[error("{0}")]
    Rejected(String),
}

impl WriteError {
    /// Failures detected before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(self, WriteError::RecordNotFound { .. } | WriteError::Validation(_))
    }
}

/// A write the client considers successful.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteAck {
    pub action: &'static str,
    /// The endpoint's result object; `None` in fire-and-forget mode.
    pub response: Option<WriteResponse>,
}

impl WriteAck {
    pub fn message(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.message.as_deref())
    }

    pub fn row_index(&self) -> Option<RowIndex> {
        self.response.as_ref().and_then(|r| r.echo_field("rowIndex"))
    }

    pub fn record_id(&self) -> Option<String> {
        self.response.as_ref().and_then(|r| r.echo_field("recordId"))
    }

    pub fn inventory(&self) -> Option<InventoryEcho> {
        self.response.as_ref().and_then(|r| r.echo_field("inventory"))
    }
}

/// Result of a reconciled add: the row the client expects the donor on.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedRecord {
    pub expected_row: RowIndex,
    pub ack: WriteAck,
}

pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

/// Keeps the in-flight count raised for the lifetime of one write.
struct Pending<'a>(&'a AtomicUsize);

impl<'a> Pending<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Pending(counter)
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct DataClient {
    base_url: String,
    http: reqwest::Client,
    delivery: DeliveryMode,
    settle_delay: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    in_flight: AtomicUsize,
    last_error: Mutex<Option<String>>,
    on_refresh: Option<RefreshCallback>,
}

impl DataClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout())
            .build()?;
        Ok(DataClient {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            http,
            delivery: config.delivery,
            settle_delay: config.settle_delay(),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            on_refresh: None,
        })
    }

    /// Run `callback` after every successful write, once the settle delay has passed.
    pub fn with_refresh(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(callback));
        self
    }

    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    pub fn write_url(&self) -> String {
        format!("{}/exec", self.base_url)
    }

    pub fn is_updating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<String> {
        lock_or_recover(&self.last_error).clone()
    }

    fn set_last_error(&self, error: Option<String>) {
        *lock_or_recover(&self.last_error) = error;
    }

    fn fail_locally(&self, error: WriteError) -> Result<WriteAck, WriteError> {
        warn!(error = %error, "write not sent");
        self.set_last_error(Some(error.to_string()));
        Err(error)
    }

    /// Backoff before retry number `attempt` (0-based).
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn schedule_refresh(&self) {
        let Some(callback) = self.on_refresh.clone() else {
            return;
        };
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }

    /// Send one envelope through the full write protocol.
    pub async fn send(&self, action: Action) -> Result<WriteAck, WriteError> {
        let _pending = Pending::enter(&self.in_flight);
        self.set_last_error(None);

        let result = self.dispatch(&action).await;
        match &result {
            Ok(ack) => {
                info!(
                    action = ack.action,
                    row = ?ack.row_index(),
                    confirmed = ack.response.is_some(),
                    "write acknowledged"
                );
                self.schedule_refresh();
            }
            Err(e) => {
                warn!(action = action.name(), error = %e, "write failed");
                self.set_last_error(Some(e.to_string()));
            }
        }
        result
    }

    async fn dispatch(&self, action: &Action) -> Result<WriteAck, WriteError> {
        let url = self.write_url();
        let body = action.to_value();
        let mut attempt = 0;
        loop {
            match self.http.post(&url).json(&body).send().await {
                Ok(resp) => return self.read_response(action.name(), resp).await,
                Err(e) if e.is_connect() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        action = action.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "endpoint unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(WriteError::Transport(e.to_string())),
            }
        }
    }

    async fn read_response(
        &self,
        action: &'static str,
        resp: reqwest::Response,
    ) -> Result<WriteAck, WriteError> {
        if self.delivery == DeliveryMode::FireAndForget {
            debug!(action, "response body ignored");
            return Ok(WriteAck {
                action,
                response: None,
            });
        }
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;
        match serde_json::from_str::<WriteResponse>(&text) {
            Ok(r) if r.success => Ok(WriteAck {
                action,
                response: Some(r),
            }),
            Ok(r) => Err(WriteError::Rejected(
                r.error
                    .unwrap_or_else(|| format!("{} failed without an error message", action)),
            )),
            Err(_) => Err(WriteError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            }),
        }
    }

    // ── One method per action ───────────────────────────────────

    pub async fn add_donor(&self, donor: &DonorDraft) -> Result<WriteAck, WriteError> {
        let missing = donor.missing_required();
        if !missing.is_empty() {
            return self.fail_locally(WriteError::Validation(missing));
        }
        self.send(Action::AddDonor {
            donor: donor.clone(),
        })
        .await
    }

    pub async fn update_donor_status(
        &self,
        row_index: RowIndex,
        new_status: &str,
    ) -> Result<WriteAck, WriteError> {
        self.send(Action::UpdateDonorStatus {
            row_index,
            new_status: new_status.to_string(),
            record_id: None,
        })
        .await
    }

    pub async fn update_donor_details(
        &self,
        row_index: RowIndex,
        donor: &DonorDraft,
    ) -> Result<WriteAck, WriteError> {
        let missing = donor.missing_required();
        if !missing.is_empty() {
            return self.fail_locally(WriteError::Validation(missing));
        }
        self.send(Action::UpdateDonorDetails {
            row_index,
            donor: donor.clone(),
            record_id: None,
        })
        .await
    }

    pub async fn delete_donor(&self, row_index: RowIndex) -> Result<WriteAck, WriteError> {
        self.send(Action::DeleteDonor {
            row_index,
            record_id: None,
        })
        .await
    }

    pub async fn update_inventory(&self, levels: InventoryLevels) -> Result<WriteAck, WriteError> {
        self.send(Action::update_inventory(levels)).await
    }

    // ── Reconciled writes ───────────────────────────────────────

    fn locate(
        &self,
        records: &[DonorRecord],
        target: &DonorRecord,
    ) -> Result<RowIndex, WriteError> {
        reconcile::locate(records, target).ok_or_else(|| WriteError::RecordNotFound {
            donor_name: target.donor_name.clone(),
            phone_number: target.phone_number.clone(),
        })
    }

    /// Add `donor` and report the row it is expected on (`len(records) + 2`).
    pub async fn add_record(
        &self,
        records: &[DonorRecord],
        donor: &DonorDraft,
    ) -> Result<AddedRecord, WriteError> {
        let expected_row = reconcile::appended_row_index(records);
        let ack = self.add_donor(donor).await?;
        Ok(AddedRecord { expected_row, ack })
    }

    pub async fn set_record_status(
        &self,
        records: &[DonorRecord],
        target: &DonorRecord,
        new_status: &str,
    ) -> Result<WriteAck, WriteError> {
        let row_index = match self.locate(records, target) {
            Ok(row) => row,
            Err(e) => return self.fail_locally(e),
        };
        self.send(Action::UpdateDonorStatus {
            row_index,
            new_status: new_status.to_string(),
            record_id: target.record_id.clone(),
        })
        .await
    }

    pub async fn edit_record(
        &self,
        records: &[DonorRecord],
        target: &DonorRecord,
        donor: &DonorDraft,
    ) -> Result<WriteAck, WriteError> {
        let row_index = match self.locate(records, target) {
            Ok(row) => row,
            Err(e) => return self.fail_locally(e),
        };
        let missing = donor.missing_required();
        if !missing.is_empty() {
            return self.fail_locally(WriteError::Validation(missing));
        }
        self.send(Action::UpdateDonorDetails {
            row_index,
            donor: donor.clone(),
            record_id: target.record_id.clone(),
        })
        .await
    }

    pub async fn remove_record(
        &self,
        records: &[DonorRecord],
        target: &DonorRecord,
    ) -> Result<WriteAck, WriteError> {
        let row_index = match self.locate(records, target) {
            Ok(row) => row,
            Err(e) => return self.fail_locally(e),
        };
        self.send(Action::DeleteDonor {
            row_index,
            record_id: target.record_id.clone(),
        })
        .await
    }

    // ── Read path ───────────────────────────────────────────────

    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let url = format!("{}/api/snapshot", self.base_url);
        let snapshot = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Snapshot>()
            .await?;
        Ok(snapshot)
    }

    pub async fn fetch_summary(&self) -> Result<DashboardSummary> {
        let url = format!("{}/api/summary", self.base_url);
        let summary = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<DashboardSummary>()
            .await?;
        Ok(summary)
    }

    /// Fetch a snapshot every `interval` and hand it to `on_snapshot`; failures are logged and skipped.
    pub fn poll_snapshots(
        self: Arc<Self>,
        interval: Duration,
        on_snapshot: impl Fn(Snapshot) + Send + Sync + 'static,
    ) -> tokio::task::JoinHandle<()> {
        let client = self;
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match client.fetch_snapshot().await {
                    Ok(snapshot) => on_snapshot(snapshot),
                    Err(e) => warn!(error = %e, "snapshot refresh failed"),
                }
            }
        })
    }
}
