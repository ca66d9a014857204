//! The inventory sheet as a single-row table.
//!
//! Invariant: the sheet holds at most one data row, always at row 2. Reading
//! an empty table yields zero units; writing overwrites row 2 in place (or
//! creates it) and never appends.

use super::{now_iso, Sheet, SheetError, SheetStore, INVENTORY_HEADERS};
use crate::records::{InventoryLevels, InventoryRecord, FIRST_DATA_ROW};
use tracing::info;

pub struct InventoryTable<'a> {
    sheet: &'a mut Sheet,
}

fn parse_units(raw: Option<&str>) -> u32 {
    let raw = raw.unwrap_or("").trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u32)
        })
        .unwrap_or(0)
}

/// Read the inventory row of `sheet`; absent or non-numeric cells count as zero.
pub(crate) fn read_row(sheet: &Sheet) -> InventoryRecord {
    let row = FIRST_DATA_ROW;
    InventoryRecord {
        blood_units_available: parse_units(sheet.cell(row, 1)),
        plasma_units_available: parse_units(sheet.cell(row, 2)),
        platelet_units_available: parse_units(sheet.cell(row, 3)),
        last_updated: sheet.cell(row, 4).unwrap_or("").to_string(),
    }
}

impl<'a> InventoryTable<'a> {
    pub fn new(sheet: &'a mut Sheet) -> Self {
        if sheet.rows.is_empty() {
            sheet.rows.push(INVENTORY_HEADERS.iter().map(|h| h.to_string()).collect());
        }
        InventoryTable { sheet }
    }

    pub fn current(&self) -> InventoryRecord {
        read_row(self.sheet)
    }

    /// Overwrite row 2 with `levels` (omitted counts keep their value) and stamp it.
    pub fn write(&mut self, levels: &InventoryLevels, stamp: String) -> InventoryRecord {
        let current = self.current();
        let next = InventoryRecord {
            blood_units_available: levels.blood_units.unwrap_or(current.blood_units_available),
            plasma_units_available: levels.plasma_units.unwrap_or(current.plasma_units_available),
            platelet_units_available: levels
                .platelet_units
                .unwrap_or(current.platelet_units_available),
            last_updated: stamp,
        };
        let row = FIRST_DATA_ROW;
        self.sheet.set_cell(row, 1, next.blood_units_available.to_string());
        self.sheet.set_cell(row, 2, next.plasma_units_available.to_string());
        self.sheet.set_cell(row, 3, next.platelet_units_available.to_string());
        self.sheet.set_cell(row, 4, next.last_updated.clone());
        self.sheet.rows.truncate(FIRST_DATA_ROW as usize);
        next
    }
}

impl SheetStore {
    pub fn inventory(&self) -> Result<InventoryRecord, SheetError> {
        self.read(|wb| self.inventory_sheet(wb).map(read_row))
    }

    pub fn update_inventory(&self, levels: &InventoryLevels) -> Result<InventoryRecord, SheetError> {
        let record = self.commit(|wb| {
            let sheet = self.inventory_sheet_mut(wb)?;
            Ok(InventoryTable::new(sheet).write(levels, now_iso()))
        })?;
        info!(
            blood = record.blood_units_available,
            plasma = record.plasma_units_available,
            platelets = record.platelet_units_available,
            "inventory updated"
        );
        Ok(record)
    }
}
