//! Comment and rating models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, RejectionCode, Result};
use crate::models::note::NoteId;

/// Maximum accepted comment length, matching the backend validator.
pub const MAX_COMMENT_CHARS: usize = 1000;

const TEMP_ID_PREFIX: &str = "tmp-";

/// A comment identifier; same placeholder scheme as [`NoteId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7()))
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "comment id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for CommentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A comment on a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub note_id: NoteId,
    /// Author display name
    pub author: String,
    #[serde(default)]
    pub author_email: Option<String>,
    pub text: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Validate comment text the way the backend does, before any network call.
pub fn validate_comment_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::remote(
            RejectionCode::InvalidComment,
            "Comment must not be empty",
        ));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(Error::remote(
            RejectionCode::InvalidComment,
            format!("Comment must be at most {MAX_COMMENT_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Aggregate rating data for a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RatingSummary {
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub count: u64,
    /// The signed-in principal's own rating, when the listing is authenticated
    #[serde(default)]
    pub user_rating: Option<u8>,
}

/// Validate a rating value; ratings are integers 1..=5.
pub fn validate_rating(rating: u8) -> Result<u8> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(Error::remote(
            RejectionCode::InvalidRating,
            "Rating must be an integer between 1 and 5",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_text_is_trimmed() {
        assert_eq!(validate_comment_text("  nice notes  ").unwrap(), "nice notes");
    }

    #[test]
    fn empty_comment_is_rejected() {
        let error = validate_comment_text(" \n ").unwrap_err();
        assert!(matches!(
            error,
            Error::Remote {
                code: RejectionCode::InvalidComment,
                ..
            }
        ));
    }

    #[test]
    fn oversized_comment_is_rejected() {
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(validate_comment_text(&long).is_err());
    }

    #[test]
    fn rating_bounds_are_enforced() {
        assert!(validate_rating(0).is_err());
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(6).is_err());
    }
}
