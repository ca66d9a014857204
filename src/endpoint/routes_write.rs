//! Write endpoint: decode one envelope, dispatch it to the store, answer with
//! a result object.

use super::{sheet_error_status, AppState};
use crate::envelope::{self, Action, WriteResponse};
use crate::records::{InventoryEcho, InventoryLevels};
use crate::sheet::{SheetError, SheetStore};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

/// Apply one decoded action to the store.
pub fn execute(store: &SheetStore, action: Action) -> Result<WriteResponse, SheetError> {
    match action {
        Action::AddDonor { donor } => {
            let added = store.append_donor(&donor)?;
            Ok(WriteResponse::ok("Donor added successfully")
                .with("rowIndex", added.row_index)
                .with("recordId", added.record_id))
        }
        Action::UpdateDonorStatus {
            row_index,
            new_status,
            record_id,
        } => {
            store.set_donor_status(row_index, &new_status, record_id.as_deref())?;
            Ok(WriteResponse::ok("Status updated successfully")
                .with("rowIndex", row_index)
                .with("newStatus", new_status))
        }
        Action::UpdateDonorDetails {
            row_index,
            donor,
            record_id,
        } => {
            store.update_donor_details(row_index, &donor, record_id.as_deref())?;
            Ok(WriteResponse::ok("Donor details updated successfully").with("rowIndex", row_index))
        }
        Action::DeleteDonor {
            row_index,
            record_id,
        } => {
            store.delete_donor(row_index, record_id.as_deref())?;
            Ok(WriteResponse::ok("Donor deleted successfully").with("rowIndex", row_index))
        }
        Action::UpdateInventory {
            blood_units,
            plasma_units,
            platelet_units,
        } => {
            let stored = store.update_inventory(&InventoryLevels {
                blood_units,
                plasma_units,
                platelet_units,
            })?;
            Ok(WriteResponse::ok("Inventory updated successfully")
                .with("inventory", InventoryEcho::from(&stored)))
        }
    }
}

pub(super) async fn handler_exec(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> impl IntoResponse {
    let action = match envelope::decode_body(&body, query.as_deref()).and_then(Action::from_value)
    {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, "envelope rejected");
            state.prom_metrics.record_write("invalid", false);
            return (StatusCode::BAD_REQUEST, Json(WriteResponse::failure(e)));
        }
    };

    let name = action.name();
    // Commits write the workbook file under the store lock.
    let store_state = Arc::clone(&state);
    let result = match tokio::task::spawn_blocking(move || execute(&store_state.store, action)).await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(action = name, error = %e, "write task failed");
            state.prom_metrics.record_write(name, false);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WriteResponse::failure(format!("Write task failed: {}", e))),
            );
        }
    };
    match result {
        Ok(response) => {
            info!(action = name, "write applied");
            state.prom_metrics.record_write(name, true);
            state.refresh_gauges();
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            warn!(action = name, error = %e, "write failed");
            state.prom_metrics.record_write(name, false);
            (sheet_error_status(&e), Json(WriteResponse::failure(e)))
        }
    }
}

/// `GET /exec`: lets a deployment be checked from a browser.
pub(super) async fn handler_exec_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Blood Bank API is running",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DonorDraft, RowIndex};
    use crate::sheet::{SheetLayout, Workbook};

    fn store() -> SheetStore {
        SheetStore::in_memory(Workbook::blank(&SheetLayout::default()), SheetLayout::default())
    }

    fn add(store: &SheetStore, name: &str) -> WriteResponse {
        execute(
            store,
            Action::AddDonor {
                donor: DonorDraft {
                    donor_name: Some(name.into()),
                    phone_number: Some("555".into()),
                    ..Default::default()
                },
            },
        )
        .unwrap()
    }

    #[test]
    fn add_echoes_row_and_record_id() {
        let s = store();
        add(&s, "A");
        let r = add(&s, "B");
        assert_eq!(r.message.as_deref(), Some("Donor added successfully"));
        assert_eq!(r.echo_field::<RowIndex>("rowIndex"), Some(RowIndex(3)));
        assert!(r.echo_field::<String>("recordId").is_some());
    }

    #[test]
    fn inventory_update_echoes_stored_values() {
        let s = store();
        let r = execute(
            &s,
            Action::update_inventory(InventoryLevels::all(120, 45, 30)),
        )
        .unwrap();
        let inv: InventoryEcho = r.echo_field("inventory").unwrap();
        assert_eq!(
            (inv.blood_units, inv.plasma_units, inv.platelet_units),
            (120, 45, 30)
        );
        assert!(!inv.last_updated.is_empty());
    }

    #[test]
    fn out_of_range_row_is_an_error() {
        let s = store();
        add(&s, "A");
        let err = execute(
            &s,
            Action::DeleteDonor {
                row_index: RowIndex(9),
                record_id: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Row index 9 is out of range");
    }
}
