#![cfg(not(tarpaulin_include))]

use crate::app::{AppError, AppResult, AppState, with_notice};
use crate::db::Database;
use crate::error::{PlotError, PlotResult};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

lazy_static! {
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,32}$").unwrap();
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Credential data for login and registration
///
/// Used to receive login and registration form data from the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Username for login/registration
    pub username: String,

    /// Email address (ignored on login, required for registration)
    #[serde(default)]
    pub email: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// User session data
///
/// Represents an authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// The caller of a request, as resolved by [`identify`]
///
/// `None` for anonymous callers, who see an always-empty store.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<String>);

impl Identity {
    pub fn owner(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Register a new user
///
/// Validates the username, hashes the password with Argon2 and inserts the
/// user record.
///
/// # Arguments
/// * `db` - The application database
/// * `username` - Desired username, `[A-Za-z0-9_-]{1,32}`
/// * `email` - Contact address, unique across users
/// * `password` - Plaintext password
///
/// # Errors
/// * `InvalidInput` if a field is empty or malformed, or the username or email
///   is already taken
pub fn register_user(db: &Database, username: &str, email: &str, password: &str) -> PlotResult<()> {
    let email = email.trim();
    if username.is_empty() || password.is_empty() || email.is_empty() {
        return Err(PlotError::InvalidInput(
            "Username, email and password cannot be empty".to_string(),
        ));
    }
    if !USERNAME.is_match(username) {
        return Err(PlotError::InvalidInput(
            "Usernames may only contain letters, digits, '_' and '-' (at most 32)".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(PlotError::InvalidInput(format!("'{}' is not an email address", email)));
    }

    let password_hash = hash_password(password)?;
    let conn = db.lock()?;
    let taken: Option<String> = conn
        .query_row(
            "SELECT username FROM users WHERE username = ?1 OR email = ?2",
            params![username, email],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing) = taken {
        return Err(PlotError::InvalidInput(if existing == username {
            "Username already exists".to_string()
        } else {
            "Email address is already registered".to_string()
        }));
    }

    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    )?;
    info!("registered user {}", username);
    Ok(())
}

/// Verify user credentials
///
/// # Returns
/// * `PlotResult<bool>` - True if the credentials are valid, false if the user
///   is unknown or the password does not match
pub fn verify_user(db: &Database, username: &str, password: &str) -> PlotResult<bool> {
    let hash: Option<String> = db
        .lock()?
        .query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?;
    match hash {
        Some(hash) => verify_password(password, &hash),
        None => Ok(false),
    }
}

fn hash_password(password: &str) -> PlotResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(PlotError::Processing(format!("password hashing failed: {}", e))),
    }
}

fn verify_password(password: &str, hash: &str) -> PlotResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PlotError::Serialization(format!("invalid password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a new user session
///
/// # Returns
/// * `PlotResult<String>` - A unique session token for the session cookie
pub fn create_session(username: &str) -> PlotResult<String> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        user_id: username.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS
        .write()
        .map_err(|_| PlotError::Poisoned("login sessions"))?;
    sessions.retain(|_, s| s.expires_at > SystemTime::now());
    sessions.insert(session_id.clone(), session);

    Ok(session_id)
}

/// Resolve a session token to its username, if the session is still alive.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().ok()?;

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .map(|session| session.user_id.clone())
}

fn end_session(session_id: &str) {
    match SESSIONS.write() {
        Ok(mut sessions) => {
            sessions.remove(session_id);
        }
        Err(_) => warn!("session table poisoned, cannot end session"),
    }
}

/// Identity middleware
///
/// Resolves the `session` cookie to a username and attaches an [`Identity`]
/// to the request. Requests without a valid session pass through as
/// anonymous; the handlers decide what an anonymous caller may do.
pub async fn identify(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let user = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(cookie.value()));
    request.extensions_mut().insert(Identity(user));
    next.run(request).await
}

#[derive(Debug, Deserialize, Default)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

/// Serve the login page
pub async fn serve_login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let page = state.pages.render(
        "login",
        &json!({ "title": "Log in", "notice": query.notice }),
    )?;
    Ok(Html(page))
}

/// Serve the signup page
pub async fn serve_signup_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let page = state.pages.render(
        "signup",
        &json!({ "title": "Sign up", "notice": query.notice }),
    )?;
    Ok(Html(page))
}

/// Handle a login form
///
/// On success sets the session cookie and sends the user to their data page;
/// otherwise redirects back to the login page with a notice.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    match verify_user(&state.db, credentials.username.trim(), &credentials.password) {
        Ok(true) => match create_session(credentials.username.trim()) {
            Ok(session_id) => {
                info!("{} logged in", credentials.username.trim());
                let cookie = Cookie::build((SESSION_COOKIE, session_id))
                    .path("/")
                    .http_only(true)
                    .build();
                (jar.add(cookie), Redirect::to("/data")).into_response()
            }
            Err(e) => AppError::from(e).into_response(),
        },
        Ok(false) => Redirect::to(&with_notice("/login", "Invalid username or password"))
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Handle a signup form
///
/// Redirects to the login page once registered, or back to the signup page
/// with the reason it was refused.
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<UserCredentials>,
) -> AppResult<Redirect> {
    match register_user(
        &state.db,
        credentials.username.trim(),
        &credentials.email,
        &credentials.password,
    ) {
        Ok(()) => Ok(Redirect::to(&with_notice(
            "/login",
            "Account created, please log in",
        ))),
        Err(e) if e.is_user_facing() => Ok(Redirect::to(&with_notice("/signup", &e.to_string()))),
        Err(e) => Err(e.into()),
    }
}

/// Handle user logout
///
/// Ends the server-side session, clears the cookie and redirects home.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }
    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(cookie), Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_verify() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "alice", "alice@example.com", "s3cret").unwrap();
        assert!(verify_user(&db, "alice", "s3cret").unwrap());
        assert!(!verify_user(&db, "alice", "wrong").unwrap());
        assert!(!verify_user(&db, "nobody", "s3cret").unwrap());
    }

    #[test]
    fn duplicate_and_malformed_users_are_refused() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "alice", "alice@example.com", "pw").unwrap();
        let err = register_user(&db, "alice", "other@example.com", "pw").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Username already exists");
        let err = register_user(&db, "bob", "alice@example.com", "pw").unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert!(register_user(&db, "../etc", "x@example.com", "pw").is_err());
        assert!(register_user(&db, "carol", "", "pw").is_err());
    }

    #[test]
    fn concurrent_signups_all_land() {
        let db = std::sync::Arc::new(Database::open_in_memory().unwrap());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let name = format!("user{}", i);
                    register_user(&db, &name, &format!("{}@example.com", name), "pw")
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap().unwrap();
        }
        for i in 0..4 {
            assert!(verify_user(&db, &format!("user{}", i), "pw").unwrap());
        }
    }

    #[test]
    fn sessions_resolve_until_ended() {
        let token = create_session("alice").unwrap();
        assert_eq!(validate_session(&token).as_deref(), Some("alice"));
        end_session(&token);
        assert_eq!(validate_session(&token), None);
        assert_eq!(validate_session("not-a-token"), None);
    }
}
