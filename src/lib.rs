//! # Lifeflow — Blood-Donation Dashboard Backend
//!
//! A spreadsheet-shaped store of donor appointments and blood-product
//! inventory, the single action-dispatching write endpoint in front of it,
//! and the client data-access layer the dashboard uses to read and write.
//!
//! ## Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`records`] | Donor, inventory and snapshot types |
//! | [`sheet`] | Persisted workbook with the donor and inventory grids |
//! | [`envelope`] | Write request/response wire format |
//! | [`endpoint`] | Axum server: write dispatch, read API, probes |
//! | [`client`] | Async data-access layer with pending/error state |
//! | [`reconcile`] | Mapping client records to sheet rows |
//! | [`query`] | Search, status filter, sort, pagination, summary |
//! | [`export`] | CSV export with day cutoffs |
//! | [`config`] | TOML settings |
//! | [`prom_metrics`] | Prometheus exposition |

pub mod client;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod export;
pub mod prom_metrics;
pub mod query;
pub mod reconcile;
pub mod records;
pub mod sheet;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering from poisoning.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
