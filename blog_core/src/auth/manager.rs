//! Account manager: registration, login/logout and profile management.

use std::sync::Arc;

use super::{
    errors::{AuthError, AuthResult},
    gate::AuthGate,
    models::{
        Identity, LoginRequest, LoginResponse, PasswordChange, ProfileUpdate, RegisterRequest,
        User, UserId, UserPage,
    },
    password::CredentialHasher,
    session::SessionStore,
    token::TokenService,
};
use crate::db::UserRepository;

/// Default page size for user listings
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp pagination input: page starts at 1, page size falls back to the
/// default when outside `1..=MAX_PAGE_SIZE`.
pub fn normalize_page(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    (page, page_size)
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    tokens: TokenService,
    sessions: SessionStore,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `users` - Account persistence
    /// * `hasher` - Password hasher (carries the server-side pepper)
    /// * `tokens` - Session token signer
    /// * `sessions` - Active-session binding in the key-value store
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: CredentialHasher,
        tokens: TokenService,
        sessions: SessionStore,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            sessions,
        }
    }

    /// Gate sharing this manager's token service and session store
    pub fn gate(&self) -> AuthGate {
        AuthGate::new(self.tokens.clone(), self.sessions.clone())
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// * `AuthError::UsernameTaken` - Username already exists
    /// * `AuthError::EmailTaken` - Email already exists
    /// * `AuthError::InvalidUsername` - Username format invalid
    /// * `AuthError::WeakPassword` - Password too weak
    /// * `AuthError::InvalidEmail` - Email format invalid
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        validate_username(&request.username)?;
        validate_password(&request.password)?;

        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        if let Some(email) = email {
            validate_email(email)?;
        }

        if self.users.find_by_username(&request.username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if let Some(email) = email
            && self.users.find_by_email(email).await?.is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let id = self
            .users
            .create_user(&request.username, &password_hash, email)
            .await?;

        log::info!("Registered user {} ({})", request.username, id);
        self.users.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Verify credentials, issue a token and make it the active session.
    ///
    /// Unknown usernames and wrong passwords both fail with
    /// `InvalidCredentials`. If the session cannot be bound the login fails.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<LoginResponse> {
        let credentials = self
            .users
            .find_credentials(&request.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.hasher
            .verify(&request.password, &credentials.password_hash)?;

        let issued = self.tokens.issue(credentials.id, &credentials.username)?;
        let ttl = self
            .tokens
            .validity()
            .to_std()
            .map_err(|_| AuthError::InvalidToken)?;
        self.sessions.bind(credentials.id, &issued.token, ttl).await?;

        let user = self
            .users
            .find_by_id(credentials.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }

    /// Revoke the active session of `user_id`
    pub async fn logout(&self, user_id: UserId) -> AuthResult<()> {
        self.sessions.unbind(user_id).await
    }

    /// Change a password after checking the old one; ends the session.
    pub async fn change_password(&self, user_id: UserId, change: PasswordChange) -> AuthResult<()> {
        let credentials = self
            .users
            .find_credentials_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // The caller is signed in; a wrong old password is bad input
        self.hasher
            .verify(&change.old_password, &credentials.password_hash)
            .map_err(|err| match err {
                AuthError::InvalidCredentials => AuthError::IncorrectPassword,
                other => other,
            })?;
        validate_password(&change.new_password)?;

        let password_hash = self.hasher.hash(&change.new_password)?;
        self.users.update_password(user_id, &password_hash).await?;
        self.sessions.unbind(user_id).await?;

        log::info!("Password changed for user {}", user_id);
        Ok(())
    }

    pub async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Whether `user_id` exists and is an administrator
    pub async fn is_admin(&self, user_id: UserId) -> AuthResult<bool> {
        Ok(self
            .users
            .find_by_id(user_id)
            .await?
            .is_some_and(|u| u.is_admin))
    }

    /// Page through all users (admin only)
    pub async fn list_users(
        &self,
        requester: &Identity,
        page: u32,
        page_size: u32,
    ) -> AuthResult<UserPage> {
        if !self.is_admin(requester.user_id).await? {
            return Err(AuthError::Forbidden);
        }

        let (page, page_size) = normalize_page(page, page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let (users, total) = self.users.list_users(i64::from(page_size), offset).await?;

        Ok(UserPage {
            users,
            total,
            page,
            page_size,
        })
    }

    /// Update email/avatar (self or admin); `is_admin` only from an admin
    pub async fn update_profile(
        &self,
        requester: &Identity,
        target: UserId,
        mut update: ProfileUpdate,
    ) -> AuthResult<User> {
        let requester_is_admin = self.is_admin(requester.user_id).await?;
        if requester.user_id != target && !requester_is_admin {
            return Err(AuthError::Forbidden);
        }
        if !requester_is_admin {
            update.is_admin = None;
        }

        if let Some(email) = update.email.as_deref() {
            validate_email(email)?;
            let owner = self.users.find_by_email(email).await?;
            if owner.is_some_and(|u| u.id != target) {
                return Err(AuthError::EmailTaken);
            }
        }

        self.users.update_profile(target, &update).await
    }

    /// Delete an account with its contents and comments (self or admin)
    pub async fn delete_user(&self, requester: &Identity, target: UserId) -> AuthResult<()> {
        if requester.user_id != target && !self.is_admin(requester.user_id).await? {
            return Err(AuthError::Forbidden);
        }

        self.users.delete_user(target).await?;
        self.sessions.unbind(target).await?;

        log::info!("User {} deleted by {}", target, requester.user_id);
        Ok(())
    }
}

/// Validate username format
fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(AuthError::InvalidUsername(
            "Username must be 3-20 characters".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AuthError::InvalidUsername(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validate password strength
fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if !(6..=20).contains(&len) {
        return Err(AuthError::WeakPassword(
            "Password must be 6-20 characters".to_string(),
        ));
    }

    // Check for at least one number, one uppercase, one lowercase
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

    if !has_digit || !has_uppercase || !has_lowercase {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number, one uppercase and one lowercase letter"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate `local@domain.tld`
pub(crate) fn validate_email(email: &str) -> AuthResult<()> {
    let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
    let (host, tld) = domain.rsplit_once('.').ok_or(AuthError::InvalidEmail)?;

    let well_formed = !local.is_empty()
        && !host.is_empty()
        && tld.len() >= 2
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace);

    if well_formed {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}
