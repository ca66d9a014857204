//! # Reconcile — Mapping Client Records Back to Sheet Rows
//!
//! The dashboard edits records out of a filtered, paginated view, but the
//! write endpoint addresses rows by their position in the sheet. Before every
//! write the client locates the target in its full, unfiltered list and
//! derives the row as `position + 2` (1-based rows, header on row 1).
//!
//! A target that carries a `recordId` is located by id. Legacy targets are
//! located by the FIRST entry with the same `(donorName, phoneNumber)`, which
//! assumes that pair is unique among live records.
//!
//! The computed row is only as fresh as the list it came from. After a delete,
//! every row below the deleted one shifts up; a second write computed from the
//! pre-delete list targets the wrong row unless the endpoint is given the
//! record id to check against.

use crate::records::{DonorRecord, RowIndex};

/// Position of `target` in `records`, by record id when known, else by name and phone.
pub fn position_of(records: &[DonorRecord], target: &DonorRecord) -> Option<usize> {
    match target.record_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => records
            .iter()
            .position(|r| r.record_id.as_deref() == Some(id)),
        None => records.iter().position(|r| r.same_identity(target)),
    }
}

/// Sheet row of `target`, or `None` when the client's list no longer contains it.
pub fn locate(records: &[DonorRecord], target: &DonorRecord) -> Option<RowIndex> {
    position_of(records, target).map(RowIndex::from_position)
}

/// Row a donor appended now will occupy, assuming `records` matches the sheet.
pub fn appended_row_index(records: &[DonorRecord]) -> RowIndex {
    RowIndex::from_position(records.len())
}
