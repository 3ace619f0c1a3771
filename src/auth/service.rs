//! Credential validation, registration and login (C3).

use crate::auth::password;
use crate::models::{MAX_PASSWORD_LEN, MAX_USERNAME_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::repo::users::UserRepository;
use crate::repo::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    ValidationError,
    UserExists,
    UserNotFound,
    InvalidPassword,
    DatabaseError,
}

impl AuthErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorCode::ValidationError => "VALIDATION_ERROR",
            AuthErrorCode::UserExists => "USER_EXISTS",
            AuthErrorCode::UserNotFound => "USER_NOT_FOUND",
            AuthErrorCode::InvalidPassword => "INVALID_PASSWORD",
            AuthErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug)]
pub struct AuthSuccess {
    pub username: String,
}

#[derive(Debug)]
pub struct AuthFailure {
    pub code: AuthErrorCode,
    pub message: String,
}

pub type AuthOutcome = Result<AuthSuccess, AuthFailure>;

fn fail(code: AuthErrorCode, message: impl Into<String>) -> AuthFailure {
    AuthFailure {
        code,
        message: message.into(),
    }
}

/// Trims both fields, lowercases the username, and enforces length bounds.
/// Returns the normalized `(username, password)` pair.
fn normalize_and_validate(username: &str, password: &str) -> Result<(String, String), AuthFailure> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(fail(AuthErrorCode::ValidationError, "username and password are required"));
    }
    let username = username.to_lowercase();
    if username.chars().count() < MIN_USERNAME_LEN || username.chars().count() > MAX_USERNAME_LEN {
        return Err(fail(
            AuthErrorCode::ValidationError,
            format!("username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN || password.chars().count() > MAX_PASSWORD_LEN {
        return Err(fail(
            AuthErrorCode::ValidationError,
            format!("password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"),
        ));
    }
    Ok((username, password.to_string()))
}

fn map_storage_err(e: StorageError) -> AuthFailure {
    fail(AuthErrorCode::DatabaseError, e.to_string())
}

pub struct AuthService<'a> {
    pub users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    pub fn new(users: UserRepository<'a>) -> Self {
        AuthService { users }
    }

    pub fn register(&self, username: &str, password: &str) -> AuthOutcome {
        let (username, password) = normalize_and_validate(username, password)?;

        if self.users.exists_by_username(&username).map_err(map_storage_err)? {
            return Err(fail(AuthErrorCode::UserExists, "username already registered"));
        }

        let hashed = password::hash(&password).map_err(|_| {
            fail(AuthErrorCode::ValidationError, "password cannot be blank")
        })?;

        self.users
            .insert(&username, &hashed)
            .map_err(map_storage_err)?;

        Ok(AuthSuccess { username })
    }

    pub fn login(&self, username: &str, password: &str) -> AuthOutcome {
        let (username, password) = normalize_and_validate(username, password)?;

        let user = self
            .users
            .find_by_username(&username)
            .map_err(map_storage_err)?
            .ok_or_else(|| fail(AuthErrorCode::UserNotFound, "no such user"))?;

        if !password::verify(&password, &user.password_hash) {
            return Err(fail(AuthErrorCode::InvalidPassword, "incorrect password"));
        }

        Ok(AuthSuccess {
            username: user.username,
        })
    }
}
