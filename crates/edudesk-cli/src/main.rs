//! EduDesk CLI - Share and browse student notes from the terminal
//!
//! Thin view layer over `edudesk-core`: it parses intents, checks the
//! session where an intent needs one, dispatches to the stores or the API
//! client, and maps every failure to a fixed human-readable message.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use edudesk_core::api::ApiClient;
use edudesk_core::models::{Collection, Comment, NoteDraft, ProfileUpdate, UserProfile};
use edudesk_core::session::firebase::FirebaseIdentityProvider;
use edudesk_core::store::comments::CommentStore;
use edudesk_core::store::notes::NoteStore;
use edudesk_core::{
    ClientConfig, Error as CoreError, NoteFilter, NoteRecord, RejectionCode, Session,
    SessionManager,
};

mod auth;

type Provider = FirebaseIdentityProvider;
type Api = ApiClient<Provider>;

#[derive(Parser)]
#[command(name = "edudesk")]
#[command(about = "Share and browse student notes from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign up, and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// List notes in the shared catalog
    List {
        /// Filter by subject
        #[arg(long)]
        subject: Option<String>,
        /// Filter by department
        #[arg(long)]
        department: Option<String>,
        /// Only your own uploads
        #[arg(long)]
        mine: bool,
        /// Server-side search query instead of a plain listing
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload a note file
    Upload {
        /// Path to the file (pdf, doc, docx, or txt)
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Note title
        #[arg(long)]
        title: String,
        /// Subject, e.g. "Operating Systems"
        #[arg(long)]
        subject: String,
        /// Department, e.g. "Computer"
        #[arg(long)]
        department: String,
    },
    /// Delete one of your notes
    Delete {
        /// Note ID
        id: String,
    },
    /// Download a note's file
    Download {
        /// Note ID
        id: String,
        /// Output path (server-suggested name when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show public catalog statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage your favorite notes
    Favorites {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Organize notes into named collections
    Collections {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Read and write comments on a note
    Comments {
        #[command(subcommand)]
        command: CommentCommands,
    },
    /// Rate a note from 1 to 5, or show its current rating
    Rate {
        /// Note ID
        id: String,
        /// Rating value (1-5); omit to just show the current rating
        rating: Option<u8>,
    },
    /// Show or update your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Sign in with email and password
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account and send a verification email
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign in with an OAuth token from an external identity provider
    LoginWith {
        /// Provider id, e.g. "google.com"
        #[arg(long, value_name = "PROVIDER")]
        provider: String,
        /// The provider-issued OAuth id token
        #[arg(long, value_name = "ID_TOKEN")]
        token: String,
    },
    /// Show the current session
    Status,
    /// Sign out and clear the stored session
    Logout,
    /// Re-send the verification email for the signed-in account
    VerifyEmail,
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// List your favorite notes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or remove a note from your favorites
    Toggle {
        /// Note ID
        id: String,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List your collections
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a collection
    Create {
        /// Collection name
        name: String,
        /// Optional description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a collection
    Delete {
        /// Collection ID
        id: String,
    },
    /// Add a note to a collection
    Add {
        /// Collection ID
        id: String,
        /// Note ID
        note_id: String,
    },
    /// Remove a note from a collection
    Remove {
        /// Collection ID
        id: String,
        /// Note ID
        note_id: String,
    },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// List a note's comments
    List {
        /// Note ID
        note_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Post a comment on a note
    Add {
        /// Note ID
        note_id: String,
        /// Comment text
        text: String,
    },
    /// Delete one of your comments
    Delete {
        /// Note ID the comment belongs to
        note_id: String,
        /// Comment ID
        comment_id: String,
    },
    /// Like a comment
    Like {
        /// Note ID the comment belongs to
        note_id: String,
        /// Comment ID
        comment_id: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile, or another user's public profile
    Show {
        /// User ID to look up instead of your own profile
        #[arg(long, value_name = "ID")]
        user: Option<String>,
    },
    /// Update profile fields
    Update {
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long, value_name = "URL")]
        photo_url: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Not signed in")]
    NotSignedIn,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {}", render_error(&error));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("edudesk=info".parse().unwrap()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::bootstrap().await?;

    match cli.command {
        Commands::Auth { command } => run_auth(&app, command).await?,
        Commands::List {
            subject,
            department,
            mine,
            search,
            json,
        } => run_list(&app, subject, department, mine, search.as_deref(), json).await?,
        Commands::Upload {
            file,
            title,
            subject,
            department,
        } => run_upload(&app, &file, title, subject, department).await?,
        Commands::Delete { id } => run_delete(&app, &id).await?,
        Commands::Download { id, output } => run_download(&app, &id, output.as_deref()).await?,
        Commands::Stats { json } => run_stats(&app, json).await?,
        Commands::Favorites { command } => run_favorites(&app, command).await?,
        Commands::Collections { command } => run_collections(&app, command).await?,
        Commands::Comments { command } => run_comments(&app, command).await?,
        Commands::Rate { id, rating } => run_rate(&app, &id, rating).await?,
        Commands::Profile { command } => run_profile(&app, command).await?,
    }

    Ok(())
}

/// Per-invocation wiring: config, identity provider, session manager (with
/// the keychain session restored), and the API client.
struct App {
    sessions: Arc<SessionManager<Provider>>,
    api: Arc<Api>,
}

impl App {
    async fn bootstrap() -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        let provider = Provider::new(&config)?;
        let sessions = Arc::new(SessionManager::new(provider));
        auth::restore_session(&sessions).await?;
        let api = Arc::new(Api::new(&config, Arc::clone(&sessions))?);
        Ok(Self { sessions, api })
    }

    /// Session gate for intents that mutate shared state; fails before any
    /// network traffic when nobody is signed in.
    fn require_session(&self) -> Result<Session, CliError> {
        self.sessions.session().ok_or(CliError::NotSignedIn)
    }

    fn note_store(&self) -> NoteStore<Api> {
        NoteStore::new(Arc::clone(&self.api))
    }

    fn comment_store(&self, note_id: &str) -> CommentStore<Api> {
        CommentStore::new(Arc::clone(&self.api), note_id.to_string().into())
    }
}

// ----------------------------------------------------------------------
// Auth
// ----------------------------------------------------------------------

async fn run_auth(app: &App, command: AuthCommands) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let session = app.sessions.sign_in_with_password(&email, &password).await?;
            auth::persist_session(&app.sessions, &session.principal)?;
            println!("Signed in as {}", session.principal.email_address);
            if !session.principal.email_verified {
                println!("Your email is not verified yet. Run: edudesk auth verify-email");
            }
        }
        AuthCommands::Signup { email, password } => {
            let session = app.sessions.sign_up_with_password(&email, &password).await?;
            auth::persist_session(&app.sessions, &session.principal)?;
            if let Err(error) = app.sessions.send_verification_email().await {
                tracing::warn!(%error, "verification email could not be sent");
            }
            println!("Account created for {}", session.principal.email_address);
            println!("Check your inbox for a verification email.");
        }
        AuthCommands::LoginWith { provider, token } => {
            let session = app.sessions.sign_in_federated(&provider, &token).await?;
            auth::persist_session(&app.sessions, &session.principal)?;
            println!(
                "Signed in as {} via {provider}",
                session.principal.email_address
            );
        }
        AuthCommands::Status => match app.sessions.session() {
            Some(session) => {
                println!("Signed in as {}", session.principal.email_address);
                println!("Name:     {}", session.principal.display_name);
                println!(
                    "Verified: {}",
                    if session.principal.email_verified { "yes" } else { "no" }
                );
            }
            None => println!("Not signed in."),
        },
        AuthCommands::Logout => {
            // Local state and the keychain are cleared even when the
            // provider round trip fails.
            let result = app.sessions.sign_out().await;
            auth::clear_stored_session()?;
            if let Err(error) = result {
                tracing::warn!(%error, "provider sign-out failed");
            }
            println!("Signed out.");
        }
        AuthCommands::VerifyEmail => {
            app.require_session()?;
            app.sessions.send_verification_email().await?;
            println!("Verification email sent.");
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Notes
// ----------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct NoteListItem {
    id: String,
    title: String,
    subject: String,
    department: String,
    uploader: String,
    file_name: String,
    file_size: Option<u64>,
    download_count: Option<u64>,
    uploaded: Option<String>,
}

fn note_to_list_item(note: &NoteRecord) -> NoteListItem {
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        subject: note.subject.clone(),
        department: note.department.clone(),
        uploader: note.uploader.clone(),
        file_name: note.file_name.clone(),
        file_size: note.file_size,
        download_count: note.download_count,
        uploaded: note.created_at.map(format_timestamp),
    }
}

async fn run_list(
    app: &App,
    subject: Option<String>,
    department: Option<String>,
    mine: bool,
    search: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    if mine {
        app.require_session()?;
    }

    let notes = if let Some(query) = search {
        app.api.search_notes(query).await?
    } else {
        let store = app.note_store();
        store
            .load(&NoteFilter {
                subject,
                department,
                mine,
            })
            .await?;
        store.notes()
    };

    if as_json {
        let items: Vec<NoteListItem> = notes.iter().map(note_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if notes.is_empty() {
        println!("No notes found.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn run_upload(
    app: &App,
    file: &Path,
    title: String,
    subject: String,
    department: String,
) -> Result<(), CliError> {
    let session = app.require_session()?;

    let content = std::fs::read(file)
        .map_err(|_| CliError::FileNotFound(file.display().to_string()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::FileNotFound(file.display().to_string()))?;

    let draft = NoteDraft {
        title,
        subject,
        uploader: session.principal.display_name.clone(),
        department,
        file_name,
        content,
    };

    let store = app.note_store();
    let confirmed = store
        .optimistic_add(draft, Some(session.principal.email_address))
        .await?;

    println!("Uploaded \"{}\" ({})", confirmed.title, confirmed.id);
    Ok(())
}

async fn run_delete(app: &App, id: &str) -> Result<(), CliError> {
    app.require_session()?;

    let store = app.note_store();
    store.load(&NoteFilter::default()).await?;
    store.optimistic_remove(&id.to_string().into()).await?;

    println!("Deleted note {id}");
    Ok(())
}

async fn run_download(app: &App, id: &str, output: Option<&Path>) -> Result<(), CliError> {
    let (bytes, server_name) = app.api.download_note(&id.to_string().into()).await?;
    let target: PathBuf = output.map_or_else(|| PathBuf::from(&server_name), Path::to_path_buf);
    std::fs::write(&target, &bytes)?;
    println!("Saved {} ({})", target.display(), format_size(bytes.len() as u64));
    Ok(())
}

async fn run_stats(app: &App, as_json: bool) -> Result<(), CliError> {
    let stats = app.api.stats().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Notes:       {}", stats.total_notes);
    println!("Downloads:   {}", stats.total_downloads);
    println!("Stored size: {} MiB", stats.total_size_mib());
    if !stats.top_uploaders.is_empty() {
        println!("Top uploaders:");
        for (name, count) in &stats.top_uploaders {
            println!("  {name}: {count}");
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Favorites
// ----------------------------------------------------------------------

async fn run_favorites(app: &App, command: FavoriteCommands) -> Result<(), CliError> {
    match command {
        FavoriteCommands::List { json } => {
            app.require_session()?;
            let store = app.note_store();
            let favorites = store.load_favorites().await?;
            if json {
                let items: Vec<NoteListItem> = favorites.iter().map(note_to_list_item).collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if favorites.is_empty() {
                println!("No favorites yet.");
            } else {
                for line in format_note_lines(&favorites) {
                    println!("{line}");
                }
            }
        }
        FavoriteCommands::Toggle { id } => {
            app.require_session()?;
            let store = app.note_store();
            store.load(&NoteFilter::default()).await?;
            let now_favorite = store
                .optimistic_toggle_favorite(&id.to_string().into())
                .await?;
            if now_favorite {
                println!("Added to favorites.");
            } else {
                println!("Removed from favorites.");
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Collections
// ----------------------------------------------------------------------

fn format_collection_lines(collections: &[Collection]) -> Vec<String> {
    collections
        .iter()
        .map(|collection| {
            let mut line = format!(
                "{}  {} ({} notes)",
                collection.id,
                collection.name,
                collection.notes.len()
            );
            if !collection.description.is_empty() {
                line.push_str(&format!(" - {}", collection.description));
            }
            line
        })
        .collect()
}

async fn run_collections(app: &App, command: CollectionCommands) -> Result<(), CliError> {
    app.require_session()?;
    match command {
        CollectionCommands::List { json } => {
            let collections = app.api.collections().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else if collections.is_empty() {
                println!("No collections yet.");
            } else {
                for line in format_collection_lines(&collections) {
                    println!("{line}");
                }
            }
        }
        CollectionCommands::Create { name, description } => {
            let id = app.api.create_collection(&name, &description).await?;
            println!("Collection created ({id})");
        }
        CollectionCommands::Delete { id } => {
            app.api.delete_collection(&id).await?;
            println!("Collection deleted.");
        }
        CollectionCommands::Add { id, note_id } => {
            app.api.add_to_collection(&id, &note_id.into()).await?;
            println!("Note added to collection.");
        }
        CollectionCommands::Remove { id, note_id } => {
            app.api.remove_from_collection(&id, &note_id.into()).await?;
            println!("Note removed from collection.");
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Comments and ratings
// ----------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CommentListItem {
    id: String,
    author: String,
    text: String,
    likes: u64,
    posted: Option<String>,
}

fn comment_to_list_item(comment: &Comment) -> CommentListItem {
    CommentListItem {
        id: comment.id.to_string(),
        author: comment.author.clone(),
        text: comment.text.clone(),
        likes: comment.likes,
        posted: comment.created_at.map(format_timestamp),
    }
}

async fn run_comments(app: &App, command: CommentCommands) -> Result<(), CliError> {
    match command {
        CommentCommands::List { note_id, json } => {
            let store = app.comment_store(&note_id);
            store.load().await?;
            let comments = store.comments();
            if json {
                let items: Vec<CommentListItem> =
                    comments.iter().map(comment_to_list_item).collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if comments.is_empty() {
                println!("No comments yet.");
            } else {
                for comment in &comments {
                    let when = comment
                        .created_at
                        .map(format_timestamp)
                        .unwrap_or_default();
                    println!(
                        "[{}] {} {} ({} likes)",
                        when, comment.author, comment.text, comment.likes
                    );
                }
            }
        }
        CommentCommands::Add { note_id, text } => {
            let session = app.require_session()?;
            let store = app.comment_store(&note_id);
            let confirmed = store
                .optimistic_add(
                    &text,
                    session.principal.display_name.clone(),
                    Some(session.principal.email_address),
                )
                .await?;
            println!("Comment posted ({})", confirmed.id);
        }
        CommentCommands::Delete { note_id, comment_id } => {
            app.require_session()?;
            let store = app.comment_store(&note_id);
            store.load().await?;
            store
                .optimistic_delete(&comment_id.to_string().into())
                .await?;
            println!("Comment deleted.");
        }
        CommentCommands::Like { note_id, comment_id } => {
            app.require_session()?;
            let store = app.comment_store(&note_id);
            store.load().await?;
            let likes = store
                .optimistic_like(&comment_id.to_string().into())
                .await?;
            println!("Liked. ({likes} likes)");
        }
    }
    Ok(())
}

async fn run_rate(app: &App, id: &str, rating: Option<u8>) -> Result<(), CliError> {
    let note_id = id.to_string().into();
    match rating {
        Some(value) => {
            app.require_session()?;
            let summary = app.api.rate_note(&note_id, value).await?;
            println!(
                "Rated {value}/5. Average is now {:.1} from {} ratings.",
                summary.average, summary.count
            );
        }
        None => {
            let summary = app.api.note_ratings(&note_id).await?;
            if summary.count == 0 {
                println!("No ratings yet.");
            } else {
                println!("{:.1}/5 from {} ratings.", summary.average, summary.count);
            }
            if let Some(own) = summary.user_rating {
                println!("Your rating: {own}/5");
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Profile
// ----------------------------------------------------------------------

async fn run_profile(app: &App, command: ProfileCommands) -> Result<(), CliError> {
    match command {
        ProfileCommands::Show { user } => {
            let profile = match user {
                Some(user_id) => app.api.public_profile(&user_id).await?,
                None => {
                    app.require_session()?;
                    app.api.profile().await?
                }
            };
            for line in profile_lines(&profile) {
                println!("{line}");
            }
        }
        ProfileCommands::Update { name, bio, photo_url } => {
            app.require_session()?;
            let update = ProfileUpdate {
                display_name: name,
                bio,
                photo_url,
            };
            let profile = app.api.update_profile(&update).await?;
            println!("Profile updated for {}", profile.display_name);
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Presentation
// ----------------------------------------------------------------------

/// Render a profile for display. Private fields are simply omitted when
/// the backend withheld them.
fn profile_lines(profile: &UserProfile) -> Vec<String> {
    let mut lines = vec![format!("Name:    {}", profile.display_name)];
    if let Some(email) = &profile.email {
        lines.push(format!("Email:   {email}"));
    }
    if let Some(bio) = &profile.bio {
        lines.push(format!("Bio:     {bio}"));
    }
    lines.push(format!("Uploads: {}", profile.upload_count));
    lines
}

/// Map any failure to the fixed set of user-facing messages.
fn render_error(error: &CliError) -> String {
    match error {
        CliError::Core(core) => human_message(core),
        CliError::NotSignedIn => {
            "Please sign in first: edudesk auth login".to_string()
        }
        other => other.to_string(),
    }
}

/// The view layer's fixed error-message table. Unknown server codes and
/// protocol surprises collapse into one generic retry prompt rather than
/// leaking internals.
fn human_message(error: &CoreError) -> String {
    if error.needs_sign_in() {
        return "Please sign in first: edudesk auth login".to_string();
    }
    match error {
        CoreError::Network { timeout: true } => {
            "The request timed out. Please try again.".to_string()
        }
        CoreError::Network { timeout: false } => {
            "Couldn't reach the server. Check your connection.".to_string()
        }
        CoreError::AlreadyPending(_) => {
            "That item is still updating. Please wait a moment.".to_string()
        }
        CoreError::SignOutFailed(_) => {
            "Sign-out didn't fully complete, but your local session was cleared.".to_string()
        }
        CoreError::InvalidInput(message) => message.clone(),
        CoreError::Remote { code, message } => match code {
            RejectionCode::UnauthorizedDelete => "You can only delete your own notes.".to_string(),
            RejectionCode::InvalidToken | RejectionCode::NoToken => {
                "Please sign in first: edudesk auth login".to_string()
            }
            RejectionCode::NoteNotFound => "That note no longer exists.".to_string(),
            RejectionCode::CommentNotFound => "That comment no longer exists.".to_string(),
            RejectionCode::InvalidFileType => {
                "Only PDF, DOC, DOCX, and TXT files are allowed.".to_string()
            }
            RejectionCode::FileTooLarge => "Files must be 10 MB or smaller.".to_string(),
            RejectionCode::MissingFields => "Please fill in all required fields.".to_string(),
            RejectionCode::InvalidRating => {
                "Ratings must be a whole number from 1 to 5.".to_string()
            }
            RejectionCode::InvalidComment => message.clone(),
            RejectionCode::Other(_) => "That didn't work. Please try again.".to_string(),
        },
        _ => "That didn't work. Please try again.".to_string(),
    }
}

fn format_note_lines(notes: &[NoteRecord]) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let size = note.file_size.map_or_else(String::new, |bytes| {
                format!("  {}", format_size(bytes))
            });
            let downloads = note
                .download_count
                .map_or_else(String::new, |count| format!("  {count} downloads"));
            format!(
                "{}  {} [{} / {}] by {}{size}{downloads}",
                note.id, note.title, note.subject, note.department, note.uploader
            )
        })
        .collect()
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

/// Render a Unix-seconds timestamp as a short UTC date-time.
fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map_or_else(|| seconds.to_string(), |when| when.format("%Y-%m-%d %H:%M").to_string())
}
