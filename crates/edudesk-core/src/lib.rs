//! edudesk-core - Core library for EduDesk
//!
//! This crate contains the shared models, identity session management,
//! backend API client, and optimistic collection stores used by all EduDesk
//! client surfaces (currently the CLI).

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod util;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{Error, RejectionCode, Result};
pub use models::{NoteDraft, NoteId, NoteRecord};
pub use session::{Credential, IdentityProvider, Principal, Session, SessionManager};
pub use store::notes::{NoteFilter, NoteStore};
