//! # Records — Donor and Inventory Data Model
//!
//! Typed views over the two spreadsheet grids. A [`DonorRecord`] is one data
//! row of the donor sheet; the [`InventoryRecord`] is the single data row of
//! the inventory sheet.
//!
//! ## Identity
//!
//! Legacy rows have no stable identifier: a record is identified by its
//! `(donorName, phoneNumber)` pair and addressed by its [`RowIndex`], which is
//! recomputed from the client's list on every write. Rows appended by this
//! service also carry a generated `recordId` (column 9), which the endpoint
//! uses to refuse writes against a row that has shifted underneath the client.
//!
//! ## Wire format
//!
//! All structs serialize with camelCase field names, matching the envelope
//! the dashboard front-end sends. Deserialization is lenient: numbers and
//! booleans are accepted where strings are expected, and numeric strings are
//! accepted where numbers are expected, because the form-parameter fallback
//! delivers every value as text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First grid row that holds data (row 1 is the header).
pub const FIRST_DATA_ROW: u32 = 2;

/// 1-based spreadsheet row of a donor record, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowIndex(pub u32);

impl RowIndex {
    /// Row for the record at `position` (0-based) in the unfiltered list.
    pub fn from_position(position: usize) -> Self {
        RowIndex(position as u32 + FIRST_DATA_ROW)
    }

    /// 0-based list position, or `None` for the header row and anything above it.
    pub fn position(self) -> Option<usize> {
        self.0.checked_sub(FIRST_DATA_ROW).map(|p| p as usize)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Donor records ───────────────────────────────────────────────

/// One appointment row from the donor sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonorRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub timestamp: String,
    #[serde(deserialize_with = "lenient::string")]
    pub donor_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone_number: String,
    #[serde(deserialize_with = "lenient::string")]
    pub channel: String,
    #[serde(deserialize_with = "lenient::string")]
    pub donation_type: String,
    /// Free-form date text; see [`crate::export::parse_appointment_date`].
    #[serde(deserialize_with = "lenient::string")]
    pub appointment_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub time: String,
    /// Stored as free text; [`DonorStatus`] gives the recognised values.
    #[serde(deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub record_id: Option<String>,
}

impl DonorRecord {
    /// True when both records share the structural identity used for reconciliation.
    pub fn same_identity(&self, other: &DonorRecord) -> bool {
        self.donor_name == other.donor_name && self.phone_number == other.phone_number
    }

    pub fn status_kind(&self) -> Option<DonorStatus> {
        DonorStatus::classify(&self.status)
    }
}

/// Donor fields sent with `addDonor` / `updateDonorDetails`.
///
/// Every field is optional. On add, missing fields become empty cells and a
/// missing status becomes `Queued`; on a details update, missing fields keep
/// the value already stored in the row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonorDraft {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub donor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub donation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub appointment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
}

impl DonorDraft {
    /// Names of required form fields that are missing or blank.
    ///
    /// Mirrors the add/edit form: name, phone, appointment date and time must be filled in.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.donor_name) {
            missing.push("donorName");
        }
        if blank(&self.phone_number) {
            missing.push("phoneNumber");
        }
        if blank(&self.appointment_date) {
            missing.push("appointmentDate");
        }
        if blank(&self.time) {
            missing.push("time");
        }
        missing
    }
}

impl From<&DonorRecord> for DonorDraft {
    fn from(r: &DonorRecord) -> Self {
        DonorDraft {
            donor_name: Some(r.donor_name.clone()),
            phone_number: Some(r.phone_number.clone()),
            channel: Some(r.channel.clone()),
            donation_type: Some(r.donation_type.clone()),
            appointment_date: Some(r.appointment_date.clone()),
            time: Some(r.time.clone()),
            status: Some(r.status.clone()),
        }
    }
}

/// Appointment status values recognised by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DonorStatus {
    Queued,
    Booked,
    Completed,
    Cancelled,
}

impl DonorStatus {
    pub const ALL: [DonorStatus; 4] = [
        DonorStatus::Queued,
        DonorStatus::Booked,
        DonorStatus::Completed,
        DonorStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DonorStatus::Queued => "Queued",
            DonorStatus::Booked => "Booked",
            DonorStatus::Completed => "Completed",
            DonorStatus::Cancelled => "Cancelled",
        }
    }

    /// Loose classification used for badges and summary counts: the first
    /// status name contained (case-insensitively) in the free text wins,
    /// checked in the order completed, booked, queued, cancelled.
    pub fn classify(text: &str) -> Option<DonorStatus> {
        let lower = text.to_lowercase();
        [
            DonorStatus::Completed,
            DonorStatus::Booked,
            DonorStatus::Queued,
            DonorStatus::Cancelled,
        ]
        .into_iter()
        .find(|s| lower.contains(&s.as_str().to_lowercase()))
    }

    /// Exact, case-insensitive match of the stored text against this status.
    pub fn matches(self, text: &str) -> bool {
        text.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for DonorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DonorStatus::ALL
            .into_iter()
            .find(|st| st.matches(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown status '{}' (expected one of: queued, booked, completed, cancelled)",
                    s
                )
            })
    }
}

// ── Inventory ───────────────────────────────────────────────────

/// The one current inventory snapshot (row 2 of the inventory sheet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub blood_units_available: u32,
    pub plasma_units_available: u32,
    pub platelet_units_available: u32,
    pub last_updated: String,
}

impl InventoryRecord {
    pub fn total_units(&self) -> u64 {
        self.blood_units_available as u64
            + self.plasma_units_available as u64
            + self.platelet_units_available as u64
    }
}

/// Unit counts sent with `updateInventory`. Omitted counts keep their stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryLevels {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_u32")]
    pub blood_units: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_u32")]
    pub plasma_units: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_u32")]
    pub platelet_units: Option<u32>,
}

impl InventoryLevels {
    pub fn all(blood: u32, plasma: u32, platelets: u32) -> Self {
        InventoryLevels {
            blood_units: Some(blood),
            plasma_units: Some(plasma),
            platelet_units: Some(platelets),
        }
    }
}

/// Inventory state echoed back by a successful `updateInventory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEcho {
    pub blood_units: u32,
    pub plasma_units: u32,
    pub platelet_units: u32,
    pub last_updated: String,
}

impl From<&InventoryRecord> for InventoryEcho {
    fn from(r: &InventoryRecord) -> Self {
        InventoryEcho {
            blood_units: r.blood_units_available,
            plasma_units: r.plasma_units_available,
            platelet_units: r.platelet_units_available,
            last_updated: r.last_updated.clone(),
        }
    }
}

/// What the read path yields: every donor row plus the inventory row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub donor_records: Vec<DonorRecord>,
    pub inventory: InventoryRecord,
}

/// Deserializers that accept the loosely typed values a spreadsheet or an
/// HTML form produces.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn text(v: Value) -> Option<String> {
        match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text(Value::deserialize(d)?))
    }

    pub fn u32_value<E: Error>(v: &Value) -> Result<Option<u32>, E> {
        match v {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| E::custom(format!("expected a non-negative integer, got {}", n))),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| E::custom(format!("expected a non-negative integer, got '{}'", s))),
            other => Err(E::custom(format!("expected a non-negative integer, got {}", other))),
        }
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        u32_value(&Value::deserialize(d)?)
    }
}
