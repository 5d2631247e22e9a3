//! Error types for edudesk-core

use std::fmt;

use thiserror::Error;

/// Result type alias using edudesk-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in edudesk-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No principal is signed in
    #[error("No active session")]
    NoActiveSession,

    /// A credential could not be obtained for an authenticated call
    #[error("Authentication required")]
    Unauthenticated,

    /// Transport-level failure (DNS, connection refused, timeout)
    #[error("Network error{}", if *.timeout { " (timed out)" } else { "" })]
    Network { timeout: bool },

    /// The server answered but the payload could not be decoded
    #[error("Invalid server response: {0}")]
    Protocol(String),

    /// The server rejected the request with a machine-readable code
    #[error("{message} [{code}]")]
    Remote { code: RejectionCode, message: String },

    /// A mutation is already in flight for this entry
    #[error("An operation is already pending for '{0}'")]
    AlreadyPending(String),

    /// The provider's sign-out call failed; the local session was cleared anyway
    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    /// Identity provider error outside the sign-out path
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Invalid configuration or caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for a server rejection.
    pub fn remote(code: RejectionCode, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Whether this error maps to a "please sign in" prompt in the view layer.
    #[must_use]
    pub const fn needs_sign_in(&self) -> bool {
        matches!(self, Self::NoActiveSession | Self::Unauthenticated)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Network { timeout: true }
        } else if error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Network { timeout: false }
        }
    }
}

/// Machine-readable rejection codes shared with the backend.
///
/// The backend emits SCREAMING_SNAKE strings in the `code` field of error
/// bodies; unknown codes round-trip through `Other` so the view layer can
/// still fall back to a generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionCode {
    UnauthorizedDelete,
    InvalidToken,
    NoToken,
    NoteNotFound,
    CommentNotFound,
    InvalidFileType,
    FileTooLarge,
    MissingFields,
    InvalidRating,
    InvalidComment,
    Other(String),
}

impl RejectionCode {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "UNAUTHORIZED_DELETE" => Self::UnauthorizedDelete,
            "INVALID_TOKEN" => Self::InvalidToken,
            "NO_TOKEN" => Self::NoToken,
            "NOTE_NOT_FOUND" | "FILE_NOT_FOUND" => Self::NoteNotFound,
            "COMMENT_NOT_FOUND" => Self::CommentNotFound,
            "INVALID_FILE_TYPE" => Self::InvalidFileType,
            "FILE_TOO_LARGE" => Self::FileTooLarge,
            "MISSING_FIELDS" => Self::MissingFields,
            "INVALID_RATING" => Self::InvalidRating,
            "INVALID_COMMENT" => Self::InvalidComment,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UnauthorizedDelete => "UNAUTHORIZED_DELETE",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NoToken => "NO_TOKEN",
            Self::NoteNotFound => "NOTE_NOT_FOUND",
            Self::CommentNotFound => "COMMENT_NOT_FOUND",
            Self::InvalidFileType => "INVALID_FILE_TYPE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::MissingFields => "MISSING_FIELDS",
            Self::InvalidRating => "INVALID_RATING",
            Self::InvalidComment => "INVALID_COMMENT",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_code_round_trips_known_values() {
        let code = RejectionCode::parse("UNAUTHORIZED_DELETE");
        assert_eq!(code, RejectionCode::UnauthorizedDelete);
        assert_eq!(code.as_str(), "UNAUTHORIZED_DELETE");
    }

    #[test]
    fn rejection_code_keeps_unknown_values() {
        let code = RejectionCode::parse("RATE_LIMITED");
        assert_eq!(code, RejectionCode::Other("RATE_LIMITED".to_string()));
        assert_eq!(code.as_str(), "RATE_LIMITED");
    }

    #[test]
    fn file_not_found_aliases_note_not_found() {
        assert_eq!(
            RejectionCode::parse("FILE_NOT_FOUND"),
            RejectionCode::NoteNotFound
        );
    }

    #[test]
    fn needs_sign_in_only_for_auth_errors() {
        assert!(Error::NoActiveSession.needs_sign_in());
        assert!(Error::Unauthenticated.needs_sign_in());
        assert!(!Error::Network { timeout: false }.needs_sign_in());
    }

    #[test]
    fn network_error_mentions_timeout() {
        let error = Error::Network { timeout: true };
        assert!(error.to_string().contains("timed out"));
    }
}
