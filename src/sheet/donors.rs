//! Donor sheet reads and writes.

use super::{now_iso, Sheet, SheetError, SheetStore};
use crate::records::{DonorDraft, DonorRecord, DonorStatus, RowIndex};
use serde::Serialize;
use tracing::info;

const COL_TIMESTAMP: usize = 0;
const COL_NAME: usize = 1;
const COL_PHONE: usize = 2;
const COL_CHANNEL: usize = 3;
const COL_DONATION_TYPE: usize = 4;
const COL_DATE: usize = 5;
const COL_TIME: usize = 6;
const COL_STATUS: usize = 7;
const COL_RECORD_ID: usize = 8;
const WIDTH: usize = 9;

/// Where an `addDonor` landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendedDonor {
    pub row_index: RowIndex,
    pub record_id: String,
    pub timestamp: String,
}

fn cell(cells: &[String], col: usize) -> String {
    cells.get(col).cloned().unwrap_or_default()
}

pub(crate) fn row_to_record(cells: &[String]) -> DonorRecord {
    let id = cell(cells, COL_RECORD_ID);
    DonorRecord {
        timestamp: cell(cells, COL_TIMESTAMP),
        donor_name: cell(cells, COL_NAME),
        phone_number: cell(cells, COL_PHONE),
        channel: cell(cells, COL_CHANNEL),
        donation_type: cell(cells, COL_DONATION_TYPE),
        appointment_date: cell(cells, COL_DATE),
        time: cell(cells, COL_TIME),
        status: cell(cells, COL_STATUS),
        record_id: (!id.is_empty()).then_some(id),
    }
}

fn record_to_row(r: &DonorRecord) -> Vec<String> {
    let mut row = vec![String::new(); WIDTH];
    row[COL_TIMESTAMP] = r.timestamp.clone();
    row[COL_NAME] = r.donor_name.clone();
    row[COL_PHONE] = r.phone_number.clone();
    row[COL_CHANNEL] = r.channel.clone();
    row[COL_DONATION_TYPE] = r.donation_type.clone();
    row[COL_DATE] = r.appointment_date.clone();
    row[COL_TIME] = r.time.clone();
    row[COL_STATUS] = r.status.clone();
    row[COL_RECORD_ID] = r.record_id.clone().unwrap_or_default();
    row
}

/// Refuse the write when the caller names a record that is no longer at `row`.
fn check_record_id(
    sheet: &Sheet,
    row: RowIndex,
    expected: Option<&str>,
) -> Result<(), SheetError> {
    sheet.check_data_row(row)?;
    if let Some(expected) = expected {
        let stored = sheet.cell(row.get(), COL_RECORD_ID as u32 + 1).unwrap_or("");
        if stored != expected {
            return Err(SheetError::RecordMismatch {
                row: row.get(),
                record_id: expected.to_string(),
            });
        }
    }
    Ok(())
}

/// Overlay the fields present in `draft` onto `current`.
fn merge_draft(current: &DonorRecord, draft: &DonorDraft) -> DonorRecord {
    let pick = |new: &Option<String>, old: &String| new.clone().unwrap_or_else(|| old.clone());
    DonorRecord {
        timestamp: current.timestamp.clone(),
        donor_name: pick(&draft.donor_name, &current.donor_name),
        phone_number: pick(&draft.phone_number, &current.phone_number),
        channel: pick(&draft.channel, &current.channel),
        donation_type: pick(&draft.donation_type, &current.donation_type),
        appointment_date: pick(&draft.appointment_date, &current.appointment_date),
        time: pick(&draft.time, &current.time),
        status: pick(&draft.status, &current.status),
        record_id: current.record_id.clone(),
    }
}

impl SheetStore {
    /// Every donor data row in sheet order.
    pub fn donor_records(&self) -> Result<Vec<DonorRecord>, SheetError> {
        self.read(|wb| {
            let sheet = self.donor_sheet(wb)?;
            Ok(sheet.data_rows().iter().map(|r| row_to_record(r)).collect())
        })
    }

    /// Append a donor row with a fresh timestamp and record id.
    pub fn append_donor(&self, draft: &DonorDraft) -> Result<AppendedDonor, SheetError> {
        let timestamp = now_iso();
        let record_id = uuid::Uuid::new_v4().to_string();
        let record = DonorRecord {
            timestamp: timestamp.clone(),
            donor_name: draft.donor_name.clone().unwrap_or_default(),
            phone_number: draft.phone_number.clone().unwrap_or_default(),
            channel: draft.channel.clone().unwrap_or_default(),
            donation_type: draft.donation_type.clone().unwrap_or_default(),
            appointment_date: draft.appointment_date.clone().unwrap_or_default(),
            time: draft.time.clone().unwrap_or_default(),
            status: draft
                .status
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DonorStatus::Queued.to_string()),
            record_id: Some(record_id.clone()),
        };
        let row_index = self.commit(|wb| {
            let sheet = self.donor_sheet_mut(wb)?;
            Ok(sheet.append_row(record_to_row(&record)))
        })?;
        info!(row = row_index.get(), record_id = %record_id, "donor appended");
        Ok(AppendedDonor {
            row_index,
            record_id,
            timestamp,
        })
    }

    /// Overwrite the status cell of `row`.
    pub fn set_donor_status(
        &self,
        row: RowIndex,
        new_status: &str,
        expected_id: Option<&str>,
    ) -> Result<(), SheetError> {
        self.commit(|wb| {
            let sheet = self.donor_sheet_mut(wb)?;
            check_record_id(sheet, row, expected_id)?;
            sheet.set_cell(row.get(), COL_STATUS as u32 + 1, new_status);
            Ok(())
        })?;
        info!(row = row.get(), status = new_status, "donor status updated");
        Ok(())
    }

    /// Overwrite every non-timestamp field of `row` present in `draft`, as one write.
    pub fn update_donor_details(
        &self,
        row: RowIndex,
        draft: &DonorDraft,
        expected_id: Option<&str>,
    ) -> Result<DonorRecord, SheetError> {
        let updated = self.commit(|wb| {
            let sheet = self.donor_sheet_mut(wb)?;
            check_record_id(sheet, row, expected_id)?;
            let idx = row.get() as usize - 1;
            let updated = merge_draft(&row_to_record(&sheet.rows[idx]), draft);
            sheet.rows[idx] = record_to_row(&updated);
            Ok(updated)
        })?;
        info!(row = row.get(), "donor details updated");
        Ok(updated)
    }

    /// Remove `row`; every donor below it shifts up one row.
    pub fn delete_donor(
        &self,
        row: RowIndex,
        expected_id: Option<&str>,
    ) -> Result<DonorRecord, SheetError> {
        let removed = self.commit(|wb| {
            let sheet = self.donor_sheet_mut(wb)?;
            check_record_id(sheet, row, expected_id)?;
            sheet.delete_row(row).map(|cells| row_to_record(&cells))
        })?;
        info!(row = row.get(), donor = %removed.donor_name, "donor deleted");
        Ok(removed)
    }
}
