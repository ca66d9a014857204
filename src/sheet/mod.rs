//! # Sheet — Spreadsheet-Style Grid Store
//!
//! Holds the workbook the dashboard reads and writes: named sheets of string
//! cells, row 1 of each being a header. Addressing is 1-based throughout,
//! matching the row indices clients compute.
//!
//! ## Sheets
//!
//! - Donor sheet (default name `Sheet1`): Timestamp, Donor Name, Phone Number,
//!   Channel, Donation Type, Appointment Date, Time, Status, Record Id.
//! - Inventory sheet (default name `Inventory`): Blood Units, Plasma Units,
//!   Platelet Units, Last Updated. Exactly one data row.
//!
//! ## Commit Model
//!
//! [`SheetStore::commit`] applies a mutation to a copy of the workbook,
//! persists the copy, and only then swaps it in. A failed action therefore
//! leaves neither memory nor disk partially written.
//!
//! ## Persistence
//!
//! The workbook file is JSON wrapped in a SHA-256 checksum envelope and is
//! written atomically (write `.tmp`, then rename). A checksum mismatch on load
//! is reported as [`SheetError::Corrupt`] rather than silently repaired.
//!
//! ## Module Structure
//!
//! - `donors`: donor row reads and the four donor write actions
//! - `inventory`: the single-row inventory table

mod donors;
mod inventory;

pub use donors::AppendedDonor;
pub use inventory::InventoryTable;

use crate::lock_or_recover;
use crate::records::{RowIndex, FIRST_DATA_ROW};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

pub const DONOR_HEADERS: [&str; 9] = [
    "Timestamp",
    "Donor Name",
    "Phone Number",
    "Channel",
    "Donation Type",
    "Appointment Date",
    "Time",
    "Status",
    "Record Id",
];

pub const INVENTORY_HEADERS: [&str; 4] =
    ["Blood Units", "Plasma Units", "Platelet Units", "Last Updated"];

/// Which logical sheet an operation needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Donor,
    Inventory,
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetKind::Donor => f.write_str("Donor"),
            SheetKind::Inventory => f.write_str("Inventory"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("{0} sheet not found")]
    SheetNotFound(SheetKind),
    #[error("Row index {0} is out of range")]
    RowOutOfRange(u32),
    #[error("Row {row} no longer holds record {record_id}")]
    RecordMismatch { row: u32, record_id: String },
    #[error("workbook I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook file is corrupt: {0}")]
    Corrupt(String),
}

/// Sheet names the store resolves the two logical grids by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub donor_sheet: String,
    pub inventory_sheet: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout {
            donor_sheet: "Sheet1".to_string(),
            inventory_sheet: "Inventory".to_string(),
        }
    }
}

// ── Grid ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn with_headers(name: &str, headers: &[&str]) -> Self {
        Sheet {
            name: name.to_string(),
            rows: vec![headers.iter().map(|h| h.to_string()).collect()],
        }
    }

    /// 1-based index of the last populated row (0 for an empty grid).
    pub fn last_row(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Rows below the header.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&str> {
        let r = self.rows.get(row.checked_sub(1)? as usize)?;
        r.get(col.checked_sub(1)? as usize).map(String::as_str)
    }

    /// Write one cell, growing the grid with empty cells as a spreadsheet does.
    pub fn set_cell(&mut self, row: u32, col: u32, value: impl Into<String>) {
        let (r, c) = (row.max(1) as usize - 1, col.max(1) as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, String::new());
        }
        cells[c] = value.into();
    }

    pub fn append_row(&mut self, values: Vec<String>) -> RowIndex {
        self.rows.push(values);
        RowIndex(self.last_row())
    }

    /// Remove a data row; every row below it moves up by one.
    pub fn delete_row(&mut self, row: RowIndex) -> Result<Vec<String>, SheetError> {
        self.check_data_row(row)?;
        Ok(self.rows.remove(row.get() as usize - 1))
    }

    pub fn check_data_row(&self, row: RowIndex) -> Result<(), SheetError> {
        if row.get() < FIRST_DATA_ROW || row.get() > self.last_row() {
            return Err(SheetError::RowOutOfRange(row.get()));
        }
        Ok(())
    }
}

// ── Workbook ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// A workbook with both sheets present and only their header rows.
    pub fn blank(layout: &SheetLayout) -> Self {
        Workbook {
            sheets: vec![
                Sheet::with_headers(&layout.donor_sheet, &DONOR_HEADERS),
                Sheet::with_headers(&layout.inventory_sheet, &INVENTORY_HEADERS),
            ],
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }
}

#[derive(Serialize, Deserialize)]
struct WorkbookEnvelope {
    checksum: String,
    data: serde_json::Value,
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Write the workbook atomically with an integrity checksum.
pub fn save(path: &Path, workbook: &Workbook) -> Result<(), SheetError> {
    let data = serde_json::to_value(workbook).map_err(|e| SheetError::Corrupt(e.to_string()))?;
    let data_str =
        serde_json::to_string_pretty(&data).map_err(|e| SheetError::Corrupt(e.to_string()))?;
    let envelope = WorkbookEnvelope {
        checksum: sha256_hex(&data_str),
        data,
    };
    let json =
        serde_json::to_string_pretty(&envelope).map_err(|e| SheetError::Corrupt(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and verify a workbook file.
pub fn load(path: &Path) -> Result<Workbook, SheetError> {
    let raw = fs::read_to_string(path)?;
    let envelope: WorkbookEnvelope =
        serde_json::from_str(&raw).map_err(|e| SheetError::Corrupt(e.to_string()))?;
    let data_str = serde_json::to_string_pretty(&envelope.data)
        .map_err(|e| SheetError::Corrupt(e.to_string()))?;
    let expected = sha256_hex(&data_str);
    if expected != envelope.checksum {
        return Err(SheetError::Corrupt(format!(
            "checksum mismatch in {} (expected {}, got {})",
            path.display(),
            &expected[..12],
            &envelope.checksum[..12.min(envelope.checksum.len())]
        )));
    }
    serde_json::from_value(envelope.data).map_err(|e| SheetError::Corrupt(e.to_string()))
}

// ── Store ───────────────────────────────────────────────────────

/// Shared, persisted workbook. All grid mutations go through [`SheetStore::commit`].
pub struct SheetStore {
    path: Option<PathBuf>,
    layout: SheetLayout,
    workbook: Mutex<Workbook>,
}

impl SheetStore {
    /// Open the workbook at `path`, creating a blank one if the file does not exist.
    pub fn open(path: &Path, layout: SheetLayout) -> Result<Self, SheetError> {
        let workbook = if path.exists() {
            let wb = load(path)?;
            info!(path = %path.display(), sheets = wb.sheets.len(), "workbook loaded");
            wb
        } else {
            let wb = Workbook::blank(&layout);
            save(path, &wb)?;
            info!(path = %path.display(), "created blank workbook");
            wb
        };
        Ok(SheetStore {
            path: Some(path.to_path_buf()),
            layout,
            workbook: Mutex::new(workbook),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(workbook: Workbook, layout: SheetLayout) -> Self {
        SheetStore {
            path: None,
            layout,
            workbook: Mutex::new(workbook),
        }
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn read<T>(&self, f: impl FnOnce(&Workbook) -> T) -> T {
        f(&lock_or_recover(&self.workbook))
    }

    /// Apply `f` to a copy of the workbook; persist and publish it only if `f` succeeds.
    pub fn commit<T>(
        &self,
        f: impl FnOnce(&mut Workbook) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let mut guard = lock_or_recover(&self.workbook);
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        if let Some(path) = &self.path {
            save(path, &draft)?;
            debug!(path = %path.display(), "workbook persisted");
        }
        *guard = draft;
        Ok(out)
    }

    /// Readiness check: the backing file (if any) is still present and parseable.
    pub fn health_check(&self) -> Result<(), SheetError> {
        match &self.path {
            Some(path) => load(path).map(|_| ()),
            None => Ok(()),
        }
    }

    fn donor_sheet<'a>(&self, wb: &'a Workbook) -> Result<&'a Sheet, SheetError> {
        wb.sheet(&self.layout.donor_sheet)
            .ok_or(SheetError::SheetNotFound(SheetKind::Donor))
    }

    fn donor_sheet_mut<'a>(&self, wb: &'a mut Workbook) -> Result<&'a mut Sheet, SheetError> {
        wb.sheet_mut(&self.layout.donor_sheet)
            .ok_or(SheetError::SheetNotFound(SheetKind::Donor))
    }

    fn inventory_sheet<'a>(&self, wb: &'a Workbook) -> Result<&'a Sheet, SheetError> {
        wb.sheet(&self.layout.inventory_sheet)
            .ok_or(SheetError::SheetNotFound(SheetKind::Inventory))
    }

    fn inventory_sheet_mut<'a>(&self, wb: &'a mut Workbook) -> Result<&'a mut Sheet, SheetError> {
        wb.sheet_mut(&self.layout.inventory_sheet)
            .ok_or(SheetError::SheetNotFound(SheetKind::Inventory))
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
