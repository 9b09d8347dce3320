//! The JSON index (`index.json`) of a UMB archive.
//!
//! [`IndexMetadata`] mirrors the index document: format version and
//! revision, free-form model and file descriptions, and the element counts
//! of the transition system. Absent fields are never written, so a
//! read/write cycle does not introduce keys that were not there.
//!
//! ```text
//! {
//!     "format-version": 1,
//!     "format-revision": 0,
//!     "model-data": { "name": "consensus", "authors": ["..."] },
//!     "file-data": { "tool": "umb", "tool-version": "0.1.0", "creation-date": 1700000000 },
//!     "#players": 1,
//!     "#states": 272,
//!     "#choice": 400,
//!     "#branches": 492
//! }
//! ```

use crate::error::{Result, UmbError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Format version written by this crate.
pub const FORMAT_VERSION: u64 = 1;

/// Format revision written by this crate.
pub const FORMAT_REVISION: u64 = 0;

/// JSON key of the format version.
pub const KEY_FORMAT_VERSION: &str = "format-version";
/// JSON key of the format revision.
pub const KEY_FORMAT_REVISION: &str = "format-revision";
/// JSON key of the model data record.
pub const KEY_MODEL_DATA: &str = "model-data";
/// JSON key of the file data record.
pub const KEY_FILE_DATA: &str = "file-data";
/// JSON key of the player count.
pub const KEY_PLAYERS: &str = "#players";
/// JSON key of the state count.
pub const KEY_STATES: &str = "#states";
/// JSON key of the choice count.
pub const KEY_CHOICES: &str = "#choice";
/// JSON key of the branch count.
pub const KEY_BRANCHES: &str = "#branches";

const KEY_CREATION_DATE: &str = "creation-date";

/// Required unsigned fields, in document order.
const REQUIRED_UINT_KEYS: [&str; 6] = [
    KEY_FORMAT_VERSION,
    KEY_FORMAT_REVISION,
    KEY_PLAYERS,
    KEY_STATES,
    KEY_CHOICES,
    KEY_BRANCHES,
];

/// Description of the modelled system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelData {
    /// Model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Model version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Model authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// DOI of the publication describing the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// URL of the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ModelData {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Description of how the archive was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileData {
    /// Name of the producing tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Version of the producing tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    /// Creation time in seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<u64>,
    /// Parameters the model was instantiated with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

impl FileData {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Records the producing tool and stamps the current time.
    pub fn stamp(&mut self, tool: impl Into<String>, tool_version: impl Into<String>) {
        self.tool = Some(tool.into());
        self.tool_version = Some(tool_version.into());
        self.creation_date = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
    }
}

/// Parsed and validated `index.json`.
///
/// `Default` leaves every field unset, including the required ones; the
/// counts are populated from the model before the index is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Format version (required).
    #[serde(rename = "format-version", default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u64>,
    /// Format revision (required).
    #[serde(rename = "format-revision", default, skip_serializing_if = "Option::is_none")]
    pub format_revision: Option<u64>,
    /// Model description.
    #[serde(rename = "model-data", default, skip_serializing_if = "ModelData::is_empty")]
    pub model_data: ModelData,
    /// Producer description. Older indices call it `creation-info`.
    #[serde(
        rename = "file-data",
        alias = "creation-info",
        default,
        skip_serializing_if = "FileData::is_empty"
    )]
    pub file_data: FileData,
    /// Number of players (required).
    #[serde(rename = "#players", default, skip_serializing_if = "Option::is_none")]
    pub num_players: Option<u64>,
    /// Number of states (required).
    #[serde(rename = "#states", default, skip_serializing_if = "Option::is_none")]
    pub num_states: Option<u64>,
    /// Number of choices (required).
    #[serde(rename = "#choice", default, skip_serializing_if = "Option::is_none")]
    pub num_choices: Option<u64>,
    /// Number of branches (required).
    #[serde(rename = "#branches", default, skip_serializing_if = "Option::is_none")]
    pub num_branches: Option<u64>,
    /// Keys this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndexMetadata {
    /// Creates an index with the current format version and revision and
    /// every other field unset.
    pub fn new() -> Self {
        Self {
            format_version: Some(FORMAT_VERSION),
            format_revision: Some(FORMAT_REVISION),
            ..Default::default()
        }
    }

    /// Populates the mirrored element counts.
    pub fn set_counts(&mut self, players: u64, states: u64, choices: u64, branches: u64) {
        self.num_players = Some(players);
        self.num_states = Some(states);
        self.num_choices = Some(choices);
        self.num_branches = Some(branches);
    }

    /// Parses and validates an index document.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::Schema` naming the offending key if the document is
    /// not a JSON object, a required field is missing, or an unsigned field
    /// holds a negative or non-integer value.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| UmbError::Schema {
            field: "index.json".to_string(),
            reason: e.to_string(),
        })?;
        let object = value.as_object().ok_or_else(|| UmbError::Schema {
            field: "index.json".to_string(),
            reason: "document is not a JSON object".to_string(),
        })?;

        for key in REQUIRED_UINT_KEYS {
            match object.get(key) {
                None => {
                    return Err(UmbError::Schema {
                        field: key.to_string(),
                        reason: "missing required field".to_string(),
                    })
                }
                Some(value) => check_uint(key, value)?,
            }
        }

        for record_key in [KEY_FILE_DATA, "creation-info"] {
            if let Some(record) = object.get(record_key).and_then(Value::as_object) {
                check_optional_uint(record_key, record, KEY_CREATION_DATE)?;
            }
        }

        serde_json::from_value(value).map_err(|e| UmbError::Schema {
            field: "index.json".to_string(),
            reason: e.to_string(),
        })
    }

    /// Serializes the index as pretty-printed JSON, omitting absent fields.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::Schema` if a required field is unset.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let required = [
            (KEY_FORMAT_VERSION, self.format_version),
            (KEY_FORMAT_REVISION, self.format_revision),
            (KEY_PLAYERS, self.num_players),
            (KEY_STATES, self.num_states),
            (KEY_CHOICES, self.num_choices),
            (KEY_BRANCHES, self.num_branches),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.is_none()) {
            return Err(UmbError::Schema {
                field: key.to_string(),
                reason: "required field is unset".to_string(),
            });
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer).map_err(|e| UmbError::Schema {
            field: "index.json".to_string(),
            reason: e.to_string(),
        })?;
        Ok(buf)
    }
}

fn check_uint(field: &str, value: &Value) -> Result<()> {
    if value.as_u64().is_none() {
        return Err(UmbError::Schema {
            field: field.to_string(),
            reason: format!("value {value} must be an unsigned integer"),
        });
    }
    Ok(())
}

fn check_optional_uint(record: &str, object: &Map<String, Value>, key: &str) -> Result<()> {
    match object.get(key) {
        Some(value) => check_uint(&format!("{record}.{key}"), value),
        None => Ok(()),
    }
}
