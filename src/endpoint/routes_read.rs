//! Read API: snapshot, summary tiles, CSV export.

use super::{sheet_error_status, AppState};
use crate::export::{self, ExportRange};
use crate::query::DashboardSummary;
use crate::records::Snapshot;
use crate::sheet::SheetError;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

fn error_response(e: SheetError) -> Response {
    (
        sheet_error_status(&e),
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

fn load_snapshot(state: &AppState) -> Result<Snapshot, SheetError> {
    Ok(Snapshot {
        donor_records: state.store.donor_records()?,
        inventory: state.store.inventory()?,
    })
}

pub(super) async fn handler_api_snapshot(State(state): State<Arc<AppState>>) -> Response {
    match load_snapshot(&state) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

pub(super) async fn handler_api_summary(State(state): State<Arc<AppState>>) -> Response {
    match load_snapshot(&state) {
        Ok(s) => Json(DashboardSummary::compute(&s.donor_records, &s.inventory)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub(super) struct ExportQuery {
    days: Option<String>,
}

pub(super) async fn handler_api_export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
) -> Response {
    let range = match params.days.as_deref().map(str::parse::<ExportRange>) {
        None => ExportRange::All,
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e})),
            )
                .into_response();
        }
    };
    let records = match state.store.donor_records() {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    let today = export::today();
    let selected = export::select(&records, range, today);
    tracing::info!(range = %range, rows = selected.len(), "export rendered");
    let csv = export::render_csv(selected);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::export_filename(today)),
            ),
        ],
        csv,
    )
        .into_response()
}
