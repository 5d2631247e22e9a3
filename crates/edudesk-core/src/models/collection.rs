//! Named note collections.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::note::NoteId;

/// A user-curated group of notes, referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "collection_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: Vec<NoteId>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Collection {
    #[must_use]
    pub fn contains(&self, note_id: &NoteId) -> bool {
        self.notes.iter().any(|id| id == note_id)
    }
}

/// Trim and validate a collection name before it goes to the server.
pub fn validate_collection_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "collection name is required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
