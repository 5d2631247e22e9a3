//! Data models shared across EduDesk clients.

pub mod collection;
pub mod comment;
pub mod note;
pub mod profile;
pub mod stats;

pub use collection::{validate_collection_name, Collection};
pub use comment::{validate_comment_text, validate_rating, Comment, CommentId, RatingSummary};
pub use note::{NoteDraft, NoteId, NoteRecord};
pub use profile::{ProfileUpdate, UserProfile};
pub use stats::CatalogStats;
