//! Repository trait definitions for testability and dependency injection.
//!
//! Account persistence sits behind [`UserRepository`] so the account
//! manager can run against SQLite in production and an in-memory mock in
//! unit tests.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::auth::{AuthError, AuthResult, ProfileUpdate, User, UserCredentials, UserId};

/// Trait for user/account repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> AuthResult<UserId>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find user by username
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Login material by username
    async fn find_credentials(&self, username: &str) -> AuthResult<Option<UserCredentials>>;

    /// Login material by ID
    async fn find_credentials_by_id(&self, user_id: UserId) -> AuthResult<Option<UserCredentials>>;

    /// Replace the stored password hash
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()>;

    /// Apply the set fields of `update`; unset fields keep their value
    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> AuthResult<User>;

    /// Page through users ordered by ID, together with the total count
    async fn list_users(&self, limit: i64, offset: i64) -> AuthResult<(Vec<User>, i64)>;

    /// Remove the user and everything that depends on it, atomically
    async fn delete_user(&self, user_id: UserId) -> AuthResult<()>;
}

const USER_COLUMNS: &str = "id, username, email, avatar, is_admin, created_at, updated_at";

fn user_from_row(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        avatar: r.get("avatar"),
        is_admin: r.get("is_admin"),
        created_at: r.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn credentials_from_row(r: &SqliteRow) -> UserCredentials {
    UserCredentials {
        id: r.get("id"),
        username: r.get("username"),
        password_hash: r.get("password_hash"),
        is_admin: r.get("is_admin"),
    }
}

/// Translate unique-constraint violations on `users` into domain errors
fn map_unique_violation(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        if db_err.message().contains("users.email") {
            return AuthError::EmailTaken;
        }
        if db_err.message().contains("users.username") {
            return AuthError::UsernameTaken;
        }
    }
    AuthError::Database(err)
}

/// Default SQLite implementation of `UserRepository`
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> AuthResult<UserId> {
        let result = sqlx::query("INSERT INTO users (username, password_hash, email) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_unique_violation)?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_credentials(&self, username: &str) -> AuthResult<Option<UserCredentials>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, is_admin FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(credentials_from_row))
    }

    async fn find_credentials_by_id(&self, user_id: UserId) -> AuthResult<Option<UserCredentials>> {
        let row = sqlx::query("SELECT id, username, password_hash, is_admin FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(credentials_from_row))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn update_profile(&self, user_id: UserId, update: &ProfileUpdate) -> AuthResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email      = COALESCE(?, email),
                avatar     = COALESCE(?, avatar),
                is_admin   = COALESCE(?, is_admin),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(update.email.as_deref())
        .bind(update.avatar.as_deref())
        .bind(update.is_admin)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }

        self.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> AuthResult<(Vec<User>, i64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM users")
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(user_from_row).collect(), total))
    }

    async fn delete_user(&self, user_id: UserId) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        // Dependents of the user's own contents first
        for statement in [
            "DELETE FROM content_tags WHERE content_id IN (SELECT id FROM contents WHERE user_id = ?)",
            "DELETE FROM content_files WHERE content_id IN (SELECT id FROM contents WHERE user_id = ?)",
            "DELETE FROM comments WHERE content_id IN (SELECT id FROM contents WHERE user_id = ?)",
            "DELETE FROM comments WHERE user_id = ?",
            "DELETE FROM contents WHERE user_id = ?",
            "UPDATE file_records SET uploaded_by = NULL WHERE uploaded_by = ?",
        ] {
            sqlx::query(statement).bind(user_id).execute(&mut *tx).await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(AuthError::UserNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Mock implementation for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Record {
        user: User,
        password_hash: String,
    }

    pub struct MockUserRepository {
        users: Arc<Mutex<HashMap<UserId, Record>>>,
        next_id: Arc<Mutex<UserId>>,
    }

    impl Default for MockUserRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockUserRepository {
        pub fn new() -> Self {
            Self {
                users: Arc::new(Mutex::new(HashMap::new())),
                next_id: Arc::new(Mutex::new(1)),
            }
        }

        fn credentials(record: &Record) -> UserCredentials {
            UserCredentials {
                id: record.user.id,
                username: record.user.username.clone(),
                password_hash: record.password_hash.clone(),
                is_admin: record.user.is_admin,
            }
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn create_user(
            &self,
            username: &str,
            password_hash: &str,
            email: Option<&str>,
        ) -> AuthResult<UserId> {
            let mut users = self.users.lock().unwrap();
            if users.values().any(|r| r.user.username == username) {
                return Err(AuthError::UsernameTaken);
            }
            if email.is_some() && users.values().any(|r| r.user.email.as_deref() == email) {
                return Err(AuthError::EmailTaken);
            }

            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;

            let now = chrono::Utc::now();
            let user = User {
                id,
                username: username.to_string(),
                email: email.map(str::to_string),
                avatar: String::new(),
                is_admin: false,
                created_at: now,
                updated_at: now,
            };
            users.insert(
                id,
                Record {
                    user,
                    password_hash: password_hash.to_string(),
                },
            );
            Ok(id)
        }

        async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
            Ok(self.users.lock().unwrap().get(&user_id).map(|r| r.user.clone()))
        }

        async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .find(|r| r.user.username == username)
                .map(|r| r.user.clone()))
        }

        async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .find(|r| r.user.email.as_deref() == Some(email))
                .map(|r| r.user.clone()))
        }

        async fn find_credentials(&self, username: &str) -> AuthResult<Option<UserCredentials>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .find(|r| r.user.username == username)
                .map(Self::credentials))
        }

        async fn find_credentials_by_id(
            &self,
            user_id: UserId,
        ) -> AuthResult<Option<UserCredentials>> {
            Ok(self.users.lock().unwrap().get(&user_id).map(Self::credentials))
        }

        async fn update_password(&self, user_id: UserId, password_hash: &str) -> AuthResult<()> {
            let mut users = self.users.lock().unwrap();
            let record = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
            record.password_hash = password_hash.to_string();
            Ok(())
        }

        async fn update_profile(
            &self,
            user_id: UserId,
            update: &ProfileUpdate,
        ) -> AuthResult<User> {
            let mut users = self.users.lock().unwrap();
            let record = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
            if let Some(ref email) = update.email {
                record.user.email = Some(email.clone());
            }
            if let Some(ref avatar) = update.avatar {
                record.user.avatar = avatar.clone();
            }
            if let Some(is_admin) = update.is_admin {
                record.user.is_admin = is_admin;
            }
            Ok(record.user.clone())
        }

        async fn list_users(&self, limit: i64, offset: i64) -> AuthResult<(Vec<User>, i64)> {
            let users = self.users.lock().unwrap();
            let mut all: Vec<User> = users.values().map(|r| r.user.clone()).collect();
            all.sort_by_key(|u| u.id);
            let total = all.len() as i64;
            let page = all
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Ok((page, total))
        }

        async fn delete_user(&self, user_id: UserId) -> AuthResult<()> {
            self.users
                .lock()
                .unwrap()
                .remove(&user_id)
                .map(|_| ())
                .ok_or(AuthError::UserNotFound)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_create_user() {
            let repo = MockUserRepository::new();

            let user_id = repo
                .create_user("testuser", "hash123", None)
                .await
                .expect("Failed to create user");
            assert_eq!(user_id, 1, "First user should have ID 1");

            let result = repo.create_user("testuser", "hash456", None).await;
            assert!(matches!(result, Err(AuthError::UsernameTaken)));
        }

        #[tokio::test]
        async fn test_mock_update_profile() {
            let repo = MockUserRepository::new();
            let id = repo.create_user("testuser", "hash", None).await.unwrap();

            let update = ProfileUpdate {
                avatar: Some("/img/a.png".to_string()),
                ..Default::default()
            };
            let user = repo.update_profile(id, &update).await.unwrap();
            assert_eq!(user.avatar, "/img/a.png");
            assert!(user.email.is_none());
        }
    }
}
