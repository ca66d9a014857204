//! # Envelope — Write Endpoint Wire Protocol
//!
//! Every write is a single JSON object `{ "action": <name>, ...fields }` posted
//! to the write endpoint, answered by `{ "success": bool, "message"?, "error"?,
//! ...echo }`.
//!
//! | action | fields |
//! |--------|--------|
//! | `addDonor` | `donor` |
//! | `updateDonorStatus` | `rowIndex`, `newStatus`, `recordId?` |
//! | `updateDonorDetails` | `rowIndex`, `donor`, `recordId?` |
//! | `deleteDonor` | `rowIndex`, `recordId?` |
//! | `updateInventory` | `bloodUnits?`, `plasmaUnits?`, `plateletUnits?` |
//!
//! ## Body decoding
//!
//! A body that does not parse as a JSON object is not rejected outright: the
//! endpoint falls back to form parameters (query string plus an urlencoded
//! body), in which every value is text. Numeric fields therefore accept
//! numeric strings, and a `donor` parameter is decoded as embedded JSON.

use crate::records::{lenient, DonorDraft, InventoryLevels, RowIndex};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const ACTIONS: [&str; 5] = [
    "addDonor",
    "updateDonorStatus",
    "updateDonorDetails",
    "deleteDonor",
    "updateInventory",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("No data received")]
    NoData,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },
}

fn row_index<'de, D: Deserializer<'de>>(d: D) -> Result<RowIndex, D::Error> {
    lenient::u32_value::<D::Error>(&Value::deserialize(d)?)?
        .map(RowIndex)
        .ok_or_else(|| serde::de::Error::custom("rowIndex is required"))
}

/// One decoded write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    AddDonor {
        donor: DonorDraft,
    },
    UpdateDonorStatus {
        #[serde(deserialize_with = "row_index")]
        row_index: RowIndex,
        #[serde(deserialize_with = "lenient::string")]
        new_status: String,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_string"
        )]
        record_id: Option<String>,
    },
    UpdateDonorDetails {
        #[serde(deserialize_with = "row_index")]
        row_index: RowIndex,
        donor: DonorDraft,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_string"
        )]
        record_id: Option<String>,
    },
    DeleteDonor {
        #[serde(deserialize_with = "row_index")]
        row_index: RowIndex,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_string"
        )]
        record_id: Option<String>,
    },
    UpdateInventory {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_u32"
        )]
        blood_units: Option<u32>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_u32"
        )]
        plasma_units: Option<u32>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient::opt_u32"
        )]
        platelet_units: Option<u32>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddDonor { .. } => "addDonor",
            Action::UpdateDonorStatus { .. } => "updateDonorStatus",
            Action::UpdateDonorDetails { .. } => "updateDonorDetails",
            Action::DeleteDonor { .. } => "deleteDonor",
            Action::UpdateInventory { .. } => "updateInventory",
        }
    }

    pub fn update_inventory(levels: InventoryLevels) -> Self {
        Action::UpdateInventory {
            blood_units: levels.blood_units,
            plasma_units: levels.plasma_units,
            platelet_units: levels.platelet_units,
        }
    }

    /// Decode an envelope object, rejecting unknown actions before looking at fields.
    pub fn from_value(value: Value) -> Result<Action, EnvelopeError> {
        let name = match value.get("action") {
            None | Some(Value::Null) => "undefined".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        if !ACTIONS.contains(&name.as_str()) {
            return Err(EnvelopeError::UnknownAction(name));
        }
        serde_json::from_value(value).map_err(|e| EnvelopeError::InvalidPayload {
            action: name,
            reason: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Turn form parameters into an envelope object; `donor` is decoded as embedded JSON.
pub fn form_to_value<I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map = Map::new();
    for (key, raw) in pairs {
        let value = if key == "donor" {
            serde_json::from_str::<Value>(&raw)
                .ok()
                .filter(Value::is_object)
                .unwrap_or(Value::String(raw))
        } else {
            Value::String(raw)
        };
        map.insert(key, value);
    }
    Value::Object(map)
}

/// Decode a request body into an envelope object.
///
/// JSON object bodies are used as-is. Anything else falls back to the form
/// parameters: the query string merged with an urlencoded body (body wins).
pub fn decode_body(body: &[u8], query: Option<&str>) -> Result<Value, EnvelopeError> {
    if !body.is_empty() {
        match serde_json::from_slice::<Value>(body) {
            Ok(v @ Value::Object(_)) => return Ok(v),
            Ok(_) => tracing::warn!("envelope body is JSON but not an object, using form parameters"),
            Err(e) => tracing::warn!(error = %e, "envelope body is not JSON, using form parameters"),
        }
    }
    let mut pairs: Vec<(String, String)> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    if !body.is_empty() {
        pairs.extend(url::form_urlencoded::parse(body).into_owned());
    }
    if pairs.is_empty() {
        return Err(EnvelopeError::NoData);
    }
    Ok(form_to_value(pairs))
}

// ── Responses ───────────────────────────────────────────────────

/// Result object returned by the write endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Action-specific echo fields (`rowIndex`, `newStatus`, `inventory`, ...).
    #[serde(flatten)]
    pub echo: Map<String, Value>,
}

impl WriteResponse {
    pub fn ok(message: &str) -> Self {
        WriteResponse {
            success: true,
            message: Some(message.to_string()),
            error: None,
            echo: Map::new(),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        WriteResponse {
            success: false,
            message: None,
            error: Some(error.to_string()),
            echo: Map::new(),
        }
    }

    /// Attach an echo field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.echo.insert(
            key.to_string(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }

    pub fn echo_field<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.echo
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
