// Catalog record model
// The indexed unit: a menu/help entry in either the flat legacy JSON shape or
// the extended shape with hierarchy levels, synonyms and actions. Field names
// keep the wire spelling of the catalog files via serde renames.

pub mod canonical;


use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{MenuError, Result};

/// A single catalog record. Deserialization tries the extended shape first;
/// anything that does not carry the extended required fields falls back to
/// the legacy shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogRecord {
    Extended(ExtendedRecord),
    Legacy(LegacyRecord),
}

/// Flat legacy catalog entry: one category, optional subcategory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Nivel0")]
    pub category: String,
    #[serde(rename = "Nivel1", default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(rename = "Descripcion")]
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Extended catalog entry: arbitrary hierarchy depth, synonyms, action verbs
/// and an optional precomputed canonical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedRecord {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "nivel")]
    pub levels: Vec<String>,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "sinonimos", default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<String>>,
    #[serde(rename = "acciones", default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(
        rename = "texto_indexado",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub canonical_text: Option<String>,
    #[serde(rename = "idioma", default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CatalogRecord {
    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }

    /// The record identity used as the index point id.
    #[inline]
    pub fn effective_id(&self) -> i64 {
        match self {
            Self::Legacy(record) => record.id,
            Self::Extended(record) => record.id,
        }
    }

    /// Primary category: `Nivel0` for legacy records, the first hierarchy
    /// level for extended ones. Empty only for records that fail validation.
    #[inline]
    pub fn effective_category(&self) -> &str {
        match self {
            Self::Legacy(record) => &record.category,
            Self::Extended(record) => record.levels.first().map_or("", String::as_str),
        }
    }

    #[inline]
    pub fn effective_description(&self) -> &str {
        match self {
            Self::Legacy(record) => &record.description,
            Self::Extended(record) => &record.description,
        }
    }

    #[inline]
    pub fn effective_url(&self) -> Option<&str> {
        match self {
            Self::Legacy(record) => Some(&record.url),
            Self::Extended(record) => record.url.as_deref(),
        }
    }

    /// Check the record invariants: positive id and non-empty category,
    /// description and (per shape) title/url/hierarchy. All problems for the
    /// record are reported in one `Validation` error.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        let mut problems: Vec<&str> = Vec::new();

        if self.effective_id() <= 0 {
            problems.push("id must be a positive integer");
        }
        if self.effective_description().trim().is_empty() {
            problems.push("description must not be empty");
        }

        match self {
            Self::Legacy(record) => {
                if record.category.trim().is_empty() {
                    problems.push("category must not be empty");
                }
                if record.url.trim().is_empty() {
                    problems.push("url must not be empty");
                }
            }
            Self::Extended(record) => {
                if record.title.trim().is_empty() {
                    problems.push("title must not be empty");
                }
                if record.levels.is_empty() {
                    problems.push("hierarchy levels must not be empty");
                } else if record.levels[0].trim().is_empty() {
                    problems.push("first hierarchy level must not be empty");
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MenuError::Validation(problems.join("; ")))
        }
    }
}

/// One rejected catalog element, identified by its position in the source
/// document (and id when the element parsed far enough to have one).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub index: usize,
    pub id: Option<i64>,
    pub reason: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "record #{} (id {}): {}", self.index, id, self.reason),
            None => write!(f, "record #{}: {}", self.index, self.reason),
        }
    }
}

/// Load the raw catalog document from disk. The file must contain a JSON
/// array of objects.
#[inline]
pub fn load_catalog(path: &Path) -> Result<Vec<Value>> {
    debug!("Loading catalog from {}", path.display());

    let content = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)
        .map_err(|e| MenuError::Validation(format!("catalog is not valid JSON: {e}")))?;

    match document {
        Value::Array(items) => {
            debug!("Loaded {} catalog elements", items.len());
            Ok(items)
        }
        _ => Err(MenuError::Validation(
            "catalog document must be a JSON array of records".to_string(),
        )),
    }
}

/// Convert raw catalog elements into validated records. Every bad element
/// produces one issue; parsing never stops at the first failure and nothing
/// is dropped silently.
#[inline]
pub fn parse_records(values: &[Value]) -> (Vec<CatalogRecord>, Vec<ValidationIssue>) {
    let mut records = Vec::with_capacity(values.len());
    let mut issues = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match serde_json::from_value::<CatalogRecord>(value.clone()) {
            Ok(record) => match record.validate() {
                Ok(()) => records.push(record),
                Err(error) => {
                    let issue = ValidationIssue {
                        index,
                        id: Some(record.effective_id()),
                        reason: error.to_string(),
                    };
                    warn!("Rejected catalog element: {}", issue);
                    issues.push(issue);
                }
            },
            Err(error) => {
                let issue = ValidationIssue {
                    index,
                    id: value.get("id").or_else(|| value.get("ID")).and_then(Value::as_i64),
                    reason: format!("does not match the legacy or extended record shape: {error}"),
                };
                warn!("Rejected catalog element: {}", issue);
                issues.push(issue);
            }
        }
    }

    (records, issues)
}
