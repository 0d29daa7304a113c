//! Session handling for the admin console.
//!
//! The console knows exactly one authorization distinction: signed in or
//! not. A [`Session`] is created once at startup and torn down at sign-out;
//! there is no ambient global principal. The [`Authenticator`] trait is the
//! seam to the credential backend; the shipped implementation verifies the
//! identifier and secret digest configured in the `[auth]` section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

/// Minimum accepted secret length.
const MIN_SECRET_LEN: usize = 6;

/// Pattern an account identifier must match (e-mail shaped).
const IDENTIFIER_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Errors that can occur during sign-in.
///
/// The set is fixed; a console front-end maps each kind to its own
/// user-facing message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No account matches the identifier.
    #[error("user not found")]
    UserNotFound,

    /// The secret does not match the account.
    #[error("wrong secret")]
    WrongSecret,

    /// The identifier is already taken by another account.
    #[error("identifier already in use")]
    AlreadyInUse,

    /// The secret does not meet the minimum strength requirements.
    #[error("secret must have at least {MIN_SECRET_LEN} characters")]
    WeakSecret,

    /// The identifier is not syntactically valid.
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Any other failure from the credential backend.
    #[error("authentication failed: {0}")]
    Other(String),
}

/// The authenticated principal of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The account identifier that signed in.
    pub identifier: String,
    /// When the sign-in happened.
    pub signed_in_at: DateTime<Utc>,
}

/// Credential verification seam.
///
/// Implementations talk to whatever holds the accounts; the console only
/// ever sees [`Principal`] or [`AuthError`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify the credentials and produce the principal.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] kind describing why sign-in failed.
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError>;
}

/// Authenticator backed by the single admin credential in the config file.
///
/// The configured secret is a blake3 digest, so the plaintext never rests
/// on disk.
#[derive(Debug, Clone)]
pub struct ConfigAuthenticator {
    identifier: String,
    secret_digest: String,
}

impl ConfigAuthenticator {
    /// Create an authenticator for the given identifier and secret digest
    /// (64 hex characters).
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret_digest: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret_digest: secret_digest.into(),
        }
    }

    /// Compute the digest of a secret, as stored in the config file.
    #[must_use]
    pub fn digest(secret: &str) -> String {
        blake3::hash(secret.as_bytes()).to_hex().to_string()
    }
}

#[async_trait]
impl Authenticator for ConfigAuthenticator {
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError> {
        if !is_valid_identifier(identifier) {
            return Err(AuthError::MalformedIdentifier(identifier.to_string()));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret);
        }
        if !identifier.eq_ignore_ascii_case(&self.identifier) {
            return Err(AuthError::UserNotFound);
        }
        if Self::digest(secret) != self.secret_digest {
            return Err(AuthError::WrongSecret);
        }

        debug!(identifier, "credentials verified");
        Ok(Principal {
            identifier: self.identifier.clone(),
            signed_in_at: Utc::now(),
        })
    }
}

/// Check an account identifier's syntax.
#[must_use]
pub fn is_valid_identifier(identifier: &str) -> bool {
    regex::Regex::new(IDENTIFIER_PATTERN).map_or(false, |pattern| pattern.is_match(identifier))
}

/// The console's session context.
///
/// Created once at startup (authenticated via [`Session::establish`] when
/// credentials are configured, open via [`Session::open`] in bootstrap
/// mode) and torn down with [`Session::sign_out`].
#[derive(Debug)]
pub struct Session {
    principal: Option<Principal>,
}

impl Session {
    /// Establish an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] from the authenticator when the
    /// credentials are rejected; no session exists in that case.
    pub async fn establish(
        authenticator: &dyn Authenticator,
        identifier: &str,
        secret: &str,
    ) -> Result<Self, AuthError> {
        let principal = authenticator.sign_in(identifier, secret).await?;
        info!(identifier = %principal.identifier, "session established");
        Ok(Self {
            principal: Some(principal),
        })
    }

    /// Create an unauthenticated session for bootstrap mode, before any
    /// credentials are configured.
    #[must_use]
    pub fn open() -> Self {
        Self { principal: None }
    }

    /// The current principal, absent in bootstrap mode or after sign-out.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Whether the session carries an authenticated principal.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Tear the session down. Idempotent.
    pub fn sign_out(&mut self) {
        if let Some(principal) = self.principal.take() {
            info!(identifier = %principal.identifier, "session torn down");
        }
    }
}
