//! Login against the Shampuneum account server.
//!
//! ```txt
//! POST /login  {"username": "...", "password": "..."}
//!           -> {"success": true}
//!           -> {"success": false, "message": "..."}
//! ```

use serde::{Deserialize, Serialize};
use sl_core::{info, pt, IntoJsonError, JsonError, CLIENT};
use thiserror::Error;

/// Shown when the server doesn't say what tier the account has.
pub const DEFAULT_ACCESS: &str = "навсегда";

/// A logged-in user.
///
/// Lives in the application context for as long as
/// the launcher runs; there's no token to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    /// Access tier, displayed as-is.
    pub access: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    success: bool,
    message: Option<String>,
    username: Option<String>,
    access: Option<String>,
}

/// Logs in with `username` and `password`.
///
/// # Errors
/// - [`AuthError::Rejected`] if the server said no
/// - [`AuthError::Unreachable`] if it couldn't be asked
/// - [`AuthError::BadResponse`] if the reply wasn't understood
pub async fn login(endpoint: &str, username: &str, password: &str) -> Result<Session, AuthError> {
    info!("Logging in as {username}");
    let response = CLIENT
        .post(endpoint)
        .json(&LoginRequest { username, password })
        .send()
        .await
        .map_err(AuthError::Unreachable)?;

    let text = response.text().await.map_err(AuthError::Unreachable)?;
    let response: LoginResponse = serde_json::from_str(&text).json(text)?;

    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| "invalid username or password".to_owned());
        pt!("Login rejected: {message}");
        return Err(AuthError::Rejected(message));
    }

    Ok(Session {
        username: response.username.unwrap_or_else(|| username.to_owned()),
        access: response.access.unwrap_or_else(|| DEFAULT_ACCESS.to_owned()),
    })
}

const AUTH_ERR_PREFIX: &str = "while logging in:\n";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{AUTH_ERR_PREFIX}login rejected: {0}")]
    Rejected(String),
    #[error("{AUTH_ERR_PREFIX}could not reach the login server:\n{0}")]
    Unreachable(reqwest::Error),
    #[error("{AUTH_ERR_PREFIX}{0}")]
    BadResponse(#[from] JsonError),
}
