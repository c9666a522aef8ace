//! # User Repository
//!
//! Accounts and their permission grants.
//!
//! ## Token Revocation
//! ```text
//! login ──► JWT { sub, ver: token_version }
//!                           │
//! logout / password change ─┴──► token_version + 1 ──► every older JWT fails
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use comandas_core::{Permission, PermissionSet, User};

/// Fields of a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Already hashed by the caller.
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Editable profile fields.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a user and their initial grants in one transaction.
    ///
    /// ## Returns
    /// * `Ok(User)` - The stored user
    /// * `Err(DbError::UniqueViolation)` - Username taken
    pub async fn create(&self, new: NewUser, permissions: &BTreeSet<Permission>) -> DbResult<User> {
        debug!(username = %new.username, "Creating user");

        if self.get_by_username(&new.username).await?.is_some() {
            return Err(DbError::duplicate("username", &new.username));
        }

        let id = generate_id();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name, password_hash,
                is_active, is_staff, is_superuser, date_joined, last_login, token_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, NULL, 0)
            "#,
        )
        .bind(&id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.password_hash)
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for permission in permissions {
            sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES (?1, ?2)")
                .bind(&id)
                .bind(permission.codename())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(user_id = %id, username = %new.username, "User created");
        self.require(&id).await
    }

    /// Gets a user by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Gets a user by id or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Gets a user by username (exact match).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Lists every user by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Number of accounts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Updates profile and flags.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> DbResult<User> {
        debug!(user_id = %id, "Updating user");

        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = ?2,
                first_name = ?3,
                last_name = ?4,
                is_active = ?5,
                is_staff = ?6,
                is_superuser = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.is_active)
        .bind(update.is_staff)
        .bind(update.is_superuser)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.require(id).await
    }

    /// Replaces the password hash and revokes outstanding tokens.
    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?2, token_version = token_version + 1 WHERE id = ?1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Stamps a successful login.
    pub async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revokes every token issued so far.
    pub async fn bump_token_version(&self, id: &str) -> DbResult<i64> {
        debug!(user_id = %id, "Revoking tokens");

        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET token_version = token_version + 1 WHERE id = ?1 RETURNING token_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        version.ok_or_else(|| DbError::not_found("User", id))
    }

    /// Hard-deletes a user. Grants cascade.
    ///
    /// ## Errors
    /// `ForeignKeyViolation` while sangrias still reference the user.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        info!(user_id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Stored codenames for a user.
    pub async fn granted_codenames(&self, user_id: &str) -> DbResult<Vec<String>> {
        let codenames: Vec<String> = sqlx::query_scalar(
            "SELECT codename FROM user_permissions WHERE user_id = ?1 ORDER BY codename",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codenames)
    }

    /// Effective permissions of a user.
    pub async fn permission_set(&self, user: &User) -> DbResult<PermissionSet> {
        let codenames = self.granted_codenames(&user.id).await?;
        Ok(PermissionSet::from_codenames(user.is_superuser, codenames))
    }

    /// Replaces every grant of a user in one transaction.
    pub async fn set_permissions(&self, user_id: &str, permissions: &BTreeSet<Permission>) -> DbResult<()> {
        debug!(user_id = %user_id, count = permissions.len(), "Replacing permissions");

        self.require(user_id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for permission in permissions {
            sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES (?1, ?2)")
                .bind(user_id)
                .bind(permission.codename())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "ana").await;

        assert!(user.is_active);
        assert!(!user.is_superuser);
        assert_eq!(user.token_version, 0);

        let found = db.users().get_by_username("ana").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = test_support::db().await;
        test_support::user(&db, "ana").await;

        let err = db
            .users()
            .create(
                NewUser {
                    username: "ana".to_string(),
                    email: String::new(),
                    first_name: String::new(),
                    last_name: String::new(),
                    password_hash: "x".to_string(),
                    is_staff: false,
                    is_superuser: false,
                },
                &BTreeSet::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_permissions_are_replaced() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "ana").await;
        let repo = db.users();

        let first: BTreeSet<Permission> = [Permission::ViewOrder, Permission::AddOrder].into();
        repo.set_permissions(&user.id, &first).await.unwrap();

        let second: BTreeSet<Permission> = [Permission::AddSangria].into();
        repo.set_permissions(&user.id, &second).await.unwrap();

        let set = repo.permission_set(&user).await.unwrap();
        assert!(set.has(Permission::AddSangria));
        assert!(!set.has(Permission::ViewOrder));
        assert_eq!(set.granted.len(), 1);
    }

    #[tokio::test]
    async fn test_token_version_bumps() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "ana").await;

        assert_eq!(db.users().bump_token_version(&user.id).await.unwrap(), 1);
        db.users().set_password(&user.id, "new-hash").await.unwrap();

        let reloaded = db.users().require(&user.id).await.unwrap();
        assert_eq!(reloaded.token_version, 2);
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "ana").await;

        let updated = db
            .users()
            .update(
                &user.id,
                &UserUpdate {
                    email: "ana@cafe.com".to_string(),
                    first_name: "Ana".to_string(),
                    last_name: "Souza".to_string(),
                    is_active: false,
                    is_staff: true,
                    is_superuser: false,
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.full_name_or_username(), "Ana Souza");

        db.users().delete(&user.id).await.unwrap();
        assert!(db.users().get_by_id(&user.id).await.unwrap().is_none());
        assert!(matches!(
            db.users().delete(&user.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
