//! Typed HTTP client for the EduDesk backend.
//!
//! Every call is a single attempt with no internal retries; transport,
//! protocol, and application failures all surface as [`Error`] variants so
//! callers never touch raw HTTP. Authenticated calls fetch a fresh bearer
//! credential from the session manager per call; if no session is active the
//! call fails before any network traffic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::ClientConfig;
use crate::error::{Error, RejectionCode, Result};
use crate::models::{
    validate_collection_name, validate_rating, CatalogStats, Collection, Comment, CommentId,
    NoteDraft, NoteId, NoteRecord, ProfileUpdate, RatingSummary, UserProfile,
};
use crate::session::{IdentityProvider, SessionManager};
use crate::store::comments::CommentBackend;
use crate::store::notes::{NoteBackend, NoteFilter};

/// HTTP client bound to one backend and one session manager.
pub struct ApiClient<P> {
    base_url: String,
    http: reqwest::Client,
    sessions: Arc<SessionManager<P>>,
}

impl<P: IdentityProvider> ApiClient<P> {
    pub fn new(config: &ClientConfig, sessions: Arc<SessionManager<P>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.clone(),
            http,
            sessions,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Start an authenticated request. Credential resolution happens before
    /// the request is built, so a missing session never costs a round trip;
    /// a signed-out caller sees [`Error::Unauthenticated`].
    async fn authed(
        &self,
        method: Method,
        path: &str,
        force_refresh: bool,
    ) -> Result<reqwest::RequestBuilder> {
        let credential = self
            .sessions
            .credential(force_refresh)
            .await
            .map_err(|error| match error {
                Error::NoActiveSession => Error::Unauthenticated,
                other => other,
            })?;
        Ok(self
            .http
            .request(method, self.url(path))
            .bearer_auth(credential.as_str()))
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    /// Server-side substring search over the public catalog.
    pub async fn search_notes(&self, query: &str) -> Result<Vec<NoteRecord>> {
        let response = self
            .http
            .get(self.url("/api/files/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        let body: NoteListBody = decode_json(response).await?;
        Ok(body.notes)
    }

    /// Download a note's file; returns the bytes and the server-suggested
    /// file name.
    pub async fn download_note(&self, id: &NoteId) -> Result<(Vec<u8>, String)> {
        let response = self
            .http
            .get(self.url(&format!("/api/files/download/{id}")))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(parse_api_error(status, &body));
        }
        let name = attachment_file_name(&response).unwrap_or_else(|| format!("{id}.bin"));
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), name))
    }

    /// Public catalog statistics.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let response = self.http.get(self.url("/api/files/stats")).send().await?;
        decode_json(response).await
    }

    // ------------------------------------------------------------------
    // Ratings
    // ------------------------------------------------------------------

    pub async fn rate_note(&self, id: &NoteId, rating: u8) -> Result<RatingSummary> {
        let rating = validate_rating(rating)?;
        let response = self
            .authed(Method::POST, &format!("/api/community/notes/{id}/rate"), false)
            .await?
            .json(&json!({ "rating": rating }))
            .send()
            .await?;
        decode_json(response).await
    }

    pub async fn note_ratings(&self, id: &NoteId) -> Result<RatingSummary> {
        let response = self
            .http
            .get(self.url(&format!("/api/community/notes/{id}/ratings")))
            .send()
            .await?;
        decode_json(response).await
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// The signed-in principal's collections.
    pub async fn collections(&self) -> Result<Vec<Collection>> {
        let response = self
            .authed(Method::GET, "/api/community/collections", false)
            .await?
            .send()
            .await?;
        let body: CollectionListBody = decode_json(response).await?;
        Ok(body.collections)
    }

    /// Create a collection; returns its server-assigned id.
    pub async fn create_collection(&self, name: &str, description: &str) -> Result<String> {
        let name = validate_collection_name(name)?;
        let response = self
            .authed(Method::POST, "/api/community/collections", false)
            .await?
            .json(&json!({ "name": name, "description": description.trim() }))
            .send()
            .await?;
        let body: CollectionCreatedBody = decode_json(response).await?;
        Ok(body.collection_id)
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<()> {
        let response = self
            .authed(
                Method::DELETE,
                &format!("/api/community/collections/{collection_id}"),
                false,
            )
            .await?
            .send()
            .await?;
        expect_success(response).await
    }

    pub async fn add_to_collection(&self, collection_id: &str, note_id: &NoteId) -> Result<()> {
        let response = self
            .authed(
                Method::POST,
                &format!("/api/community/collections/{collection_id}/notes"),
                false,
            )
            .await?
            .json(&json!({ "note_id": note_id.as_str() }))
            .send()
            .await?;
        expect_success(response).await
    }

    pub async fn remove_from_collection(
        &self,
        collection_id: &str,
        note_id: &NoteId,
    ) -> Result<()> {
        let response = self
            .authed(
                Method::DELETE,
                &format!("/api/community/collections/{collection_id}/notes/{note_id}"),
                false,
            )
            .await?
            .send()
            .await?;
        expect_success(response).await
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// The signed-in principal's own profile.
    pub async fn profile(&self) -> Result<UserProfile> {
        let response = self
            .authed(Method::GET, "/api/community/users/me/profile", false)
            .await?
            .send()
            .await?;
        decode_json(response).await
    }

    /// Another user's public profile.
    pub async fn public_profile(&self, user_id: &str) -> Result<UserProfile> {
        let response = self
            .http
            .get(self.url(&format!("/api/community/users/{user_id}/profile")))
            .send()
            .await?;
        decode_json(response).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        if update.is_empty() {
            return Err(Error::InvalidInput(
                "profile update must change at least one field".to_string(),
            ));
        }
        let response = self
            .authed(Method::PUT, "/api/community/users/me/profile", false)
            .await?
            .json(update)
            .send()
            .await?;
        decode_json(response).await
    }
}

#[async_trait]
impl<P: IdentityProvider> NoteBackend for ApiClient<P> {
    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteRecord>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(subject) = filter.subject.as_deref() {
            query.push(("subject", subject));
        }
        if let Some(department) = filter.department.as_deref() {
            query.push(("department", department));
        }

        let response = if filter.mine {
            self.authed(Method::GET, "/api/files/my-notes", false)
                .await?
                .query(&query)
                .send()
                .await?
        } else {
            self.http
                .get(self.url("/api/files/notes"))
                .query(&query)
                .send()
                .await?
        };
        let body: NoteListBody = decode_json(response).await?;
        Ok(body.notes)
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<NoteRecord> {
        let file = Part::bytes(draft.content.clone()).file_name(draft.file_name.clone());
        let form = Form::new()
            .part("file", file)
            .text("title", draft.title.clone())
            .text("subject", draft.subject.clone())
            .text("uploader", draft.uploader.clone())
            .text("department", draft.department.clone());

        let response = self
            .authed(Method::POST, "/api/files/upload", false)
            .await?
            .multipart(form)
            .send()
            .await?;
        let body: NoteBody = decode_json(response).await?;
        Ok(body.note)
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        // Deletes ride on a force-refreshed credential so an expired cached
        // token can't surface as a spurious rejection.
        let response = self
            .authed(Method::DELETE, &format!("/api/files/delete/{id}"), true)
            .await?
            .send()
            .await?;
        expect_success(response).await
    }

    async fn list_favorites(&self) -> Result<Vec<NoteRecord>> {
        let response = self
            .authed(Method::GET, "/api/community/favorites", false)
            .await?
            .send()
            .await?;
        let body: NoteListBody = decode_json(response).await?;
        Ok(body.notes)
    }

    async fn add_favorite(&self, id: &NoteId) -> Result<()> {
        let response = self
            .authed(Method::POST, "/api/community/favorites", false)
            .await?
            .json(&json!({ "note_id": id.as_str() }))
            .send()
            .await?;
        expect_success(response).await
    }

    async fn remove_favorite(&self, id: &NoteId) -> Result<()> {
        let response = self
            .authed(Method::DELETE, &format!("/api/community/favorites/{id}"), false)
            .await?
            .send()
            .await?;
        expect_success(response).await
    }
}

#[async_trait]
impl<P: IdentityProvider> CommentBackend for ApiClient<P> {
    async fn list_comments(&self, note_id: &NoteId) -> Result<Vec<Comment>> {
        let response = self
            .http
            .get(self.url(&format!("/api/community/notes/{note_id}/comments")))
            .send()
            .await?;
        let body: CommentListBody = decode_json(response).await?;
        Ok(body.comments)
    }

    async fn add_comment(&self, note_id: &NoteId, text: &str) -> Result<Comment> {
        let response = self
            .authed(
                Method::POST,
                &format!("/api/community/notes/{note_id}/comments"),
                false,
            )
            .await?
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let body: CommentBody = decode_json(response).await?;
        Ok(body.comment)
    }

    async fn delete_comment(&self, comment_id: &CommentId) -> Result<()> {
        let response = self
            .authed(
                Method::DELETE,
                &format!("/api/community/comments/{comment_id}"),
                true,
            )
            .await?
            .send()
            .await?;
        expect_success(response).await
    }

    async fn like_comment(&self, comment_id: &CommentId) -> Result<u64> {
        let response = self
            .authed(
                Method::POST,
                &format!("/api/community/comments/{comment_id}/like"),
                false,
            )
            .await?
            .send()
            .await?;
        let body: LikeBody = decode_json(response).await?;
        Ok(body.likes)
    }
}

#[derive(Deserialize)]
struct NoteListBody {
    #[serde(default)]
    notes: Vec<NoteRecord>,
}

#[derive(Deserialize)]
struct NoteBody {
    note: NoteRecord,
}

#[derive(Deserialize)]
struct CollectionListBody {
    #[serde(default)]
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct CollectionCreatedBody {
    collection_id: String,
}

#[derive(Deserialize)]
struct CommentListBody {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Deserialize)]
struct CommentBody {
    comment: Comment,
}

#[derive(Deserialize)]
struct LikeBody {
    likes: u64,
}

/// Decode a 2xx JSON body, normalizing everything else into [`Error`].
async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|error| Error::Protocol(format!("malformed response body: {error}")))
}

async fn expect_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(parse_api_error(status, &body))
}

/// Normalize a non-2xx response. The backend emits
/// `{"error": message, "code": "SCREAMING_SNAKE"}` bodies; anything else
/// falls back to a status-derived code so callers always see a
/// [`Error::Remote`].
fn parse_api_error(status: StatusCode, body: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    }

    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (message, code) = match parsed {
        Some(body) => (body.error.or(body.message), body.code),
        None => (None, None),
    };

    let code = match code {
        Some(raw) => RejectionCode::parse(&raw),
        None if status == StatusCode::UNAUTHORIZED => RejectionCode::InvalidToken,
        None => RejectionCode::Other(format!("HTTP_{}", status.as_u16())),
    };
    let message = message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    Error::remote(code, message)
}

/// Extract the file name from a `Content-Disposition: attachment` header.
fn attachment_file_name(response: &reqwest::Response) -> Option<String> {
    let raw = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    let marker = "filename=";
    let start = raw.find(marker)? + marker.len();
    let value = raw[start..].trim().trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::session::{Credential, Principal};

    struct CountingProvider {
        token_calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Principal> {
            Err(Error::Provider("unused".to_string()))
        }

        async fn sign_up_with_password(&self, _email: &str, _password: &str) -> Result<Principal> {
            Err(Error::Provider("unused".to_string()))
        }

        async fn sign_in_federated(&self, _provider_id: &str, _id_token: &str) -> Result<Principal> {
            Err(Error::Provider("unused".to_string()))
        }

        async fn sign_out(&self) -> Result<()> {
            Ok(())
        }

        async fn current_token(&self, _force_refresh: bool) -> Result<Credential> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential::new("token"))
        }

        async fn send_verification_email(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn authed_calls_fail_unauthenticated_without_a_session() {
        let provider = CountingProvider {
            token_calls: AtomicUsize::new(0),
        };
        let sessions = Arc::new(SessionManager::new(provider));
        let config =
            ClientConfig::new("http://127.0.0.1:1", "http://127.0.0.1:1", "key").unwrap();
        let client = ApiClient::new(&config, Arc::clone(&sessions)).unwrap();

        assert_eq!(client.profile().await.unwrap_err(), Error::Unauthenticated);
        assert_eq!(
            sessions.provider().token_calls.load(Ordering::SeqCst),
            0,
            "no provider or network traffic without a session"
        );
    }

    #[test]
    fn parse_api_error_reads_code_and_message() {
        let error = parse_api_error(
            StatusCode::FORBIDDEN,
            r#"{"error": "You can only delete your own notes", "code": "UNAUTHORIZED_DELETE"}"#,
        );
        assert_eq!(
            error,
            Error::Remote {
                code: RejectionCode::UnauthorizedDelete,
                message: "You can only delete your own notes".to_string(),
            }
        );
    }

    #[test]
    fn parse_api_error_falls_back_on_non_json_bodies() {
        let error = parse_api_error(StatusCode::BAD_GATEWAY, "<html>upstream died</html>");
        assert_eq!(
            error,
            Error::Remote {
                code: RejectionCode::Other("HTTP_502".to_string()),
                message: "Bad Gateway".to_string(),
            }
        );
    }

    #[test]
    fn bare_unauthorized_maps_to_invalid_token() {
        let error = parse_api_error(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(
            error,
            Error::Remote {
                code: RejectionCode::InvalidToken,
                ..
            }
        ));
    }

    #[test]
    fn unknown_codes_round_trip() {
        let error = parse_api_error(
            StatusCode::IM_A_TEAPOT,
            r#"{"error": "nope", "code": "BREW_FAILURE"}"#,
        );
        assert_eq!(
            error,
            Error::Remote {
                code: RejectionCode::Other("BREW_FAILURE".to_string()),
                message: "nope".to_string(),
            }
        );
    }
}
