//! Note catalog models and client-side upload validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, RejectionCode, Result};

/// Maximum accepted upload size (bytes).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// File extensions the backend accepts.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

const TEMP_ID_PREFIX: &str = "tmp-";

/// A note identifier.
///
/// Real ids are opaque server-assigned strings. Placeholder entries created
/// by an optimistic add carry a `tmp-`-prefixed UUID v7 until the server
/// confirms the create and the real id replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a client-side placeholder id for an unconfirmed entry.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Whether this id is a client-side placeholder.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("note id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A note in the shared catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Server-assigned stable identifier
    pub id: NoteId,
    pub title: String,
    pub subject: String,
    /// Uploader display name
    pub uploader: String,
    /// Uploader email, used for the advisory ownership check
    #[serde(default)]
    pub uploader_email: Option<String>,
    pub department: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub download_count: Option<u64>,
    /// Creation timestamp (Unix seconds), when the server reports one
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl NoteRecord {
    /// Advisory client-side ownership check; the server is authoritative.
    #[must_use]
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.uploader_email
            .as_deref()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(email))
    }

    /// Case-insensitive substring match over title, subject, and uploader.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.subject.to_lowercase().contains(&query)
            || self.uploader.to_lowercase().contains(&query)
    }
}

/// An upload candidate, validated client-side before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub subject: String,
    pub uploader: String,
    pub department: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl NoteDraft {
    /// Validate the draft against the backend's upload constraints.
    ///
    /// Produces the same rejection codes the server would, so the view-layer
    /// message mapping has a single path for both local and remote rejection.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("title", &self.title),
            ("subject", &self.subject),
            ("uploader", &self.uploader),
            ("department", &self.department),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::remote(
                    RejectionCode::MissingFields,
                    format!("Missing required field: {field}"),
                ));
            }
        }

        if self.file_name.trim().is_empty() {
            return Err(Error::remote(
                RejectionCode::MissingFields,
                "No file selected",
            ));
        }

        if !has_allowed_extension(&self.file_name) {
            return Err(Error::remote(
                RejectionCode::InvalidFileType,
                "File type not allowed. Only PDF, DOC, DOCX, and TXT files are supported.",
            ));
        }

        if self.content.len() as u64 > MAX_FILE_SIZE_BYTES {
            return Err(Error::remote(
                RejectionCode::FileTooLarge,
                "File size exceeds 10MB limit",
            ));
        }

        Ok(())
    }

    /// Build the placeholder entry shown while the create is unconfirmed.
    #[must_use]
    pub fn placeholder(&self, uploader_email: Option<String>) -> NoteRecord {
        NoteRecord {
            id: NoteId::temporary(),
            title: self.title.trim().to_string(),
            subject: self.subject.clone(),
            uploader: self.uploader.clone(),
            uploader_email,
            department: self.department.clone(),
            file_name: self.file_name.clone(),
            file_size: Some(self.content.len() as u64),
            download_count: Some(0),
            created_at: Some(crate::util::unix_timestamp_now()),
        }
    }
}

fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, extension)| {
            !stem.is_empty()
                && ALLOWED_EXTENSIONS
                    .iter()
                    .any(|allowed| extension.eq_ignore_ascii_case(allowed))
        })
}
