use crate::{
    auth::PasswordService,
    database::{queries::UserQueries, Database},
    errors::{AppError, AuthError, Result},
    models::{AuthResponse, User, UserUsageResponse},
    services::{
        quota_ledger::{effective_limit, QuotaLedger},
        session_store::SessionStore,
    },
};

#[derive(Clone)]
pub struct AccountService {
    database: Database,
    sessions: SessionStore,
    quota: QuotaLedger,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(database: Database, sessions: SessionStore, quota: QuotaLedger, bcrypt_cost: u32) -> Self {
        Self {
            database,
            sessions,
            quota,
            bcrypt_cost,
        }
    }

    /// The first account ever created becomes the administrator.
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim();
        PasswordService::validate_credentials(username, password)?;

        let pool = self.database.pool();
        if UserQueries::find_by_username(pool, username).await?.is_some() {
            return Err(AppError::Validation("Username already exists".to_string()));
        }

        let password_hash = hash_blocking(password.to_string(), self.bcrypt_cost).await?;

        let user = UserQueries::create_user_with_bootstrap_role(pool, username, &password_hash)
            .await
            .map_err(|e| match e {
                AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    AppError::Validation("Username already exists".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id = user.id, role = ?user.role, "User registered");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        let user = UserQueries::find_by_username(self.database.pool(), username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            tracing::info!(user_id = user.id, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let (token, expires_at) = self.sessions.create_session(user.id).await?;
        Ok(AuthResponse { token, expires_at })
    }

    pub async fn find_user(&self, user_id: i64) -> Result<User> {
        UserQueries::find_by_id(self.database.pool(), user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Newest accounts first, each with today's usage.
    pub async fn list_users_with_usage(&self) -> Result<Vec<UserUsageResponse>> {
        let users = UserQueries::list(self.database.pool()).await?;

        let mut listing = Vec::with_capacity(users.len());
        for user in users {
            let used_today = self.quota.usage_today(user.id).await?;
            listing.push(UserUsageResponse {
                id: user.id,
                daily_limit: effective_limit(user.daily_limit, self.quota.default_limit()),
                username: user.username,
                role: user.role,
                used_today,
                created_at: user.created_at,
            });
        }

        Ok(listing)
    }
}

async fn hash_blocking(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || PasswordService::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || PasswordService::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{auth::JwtService, models::Role};

    async fn service() -> AccountService {
        let database = Database::in_memory().await.unwrap();
        let jwt = Arc::new(JwtService::new("accounts-test", Duration::days(7)));
        let sessions = SessionStore::new(database.clone(), jwt);
        let quota = QuotaLedger::new(database.clone(), 3);
        AccountService::new(database, sessions, quota, 4)
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let accounts = service().await;

        let first = accounts.register("root", "secret1").await.unwrap();
        let second = accounts.register("guest", "secret2").await.unwrap();

        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::User);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_registrations_yield_one_admin() {
        for _ in 0..20 {
            let accounts = service().await;

            let (first, second) = tokio::join!(
                accounts.register("alice", "secret1"),
                accounts.register("bob", "secret2")
            );
            let roles = [first.unwrap().role, second.unwrap().role];

            let admins = roles.iter().filter(|role| **role == Role::Admin).count();
            assert_eq!(admins, 1, "roles: {:?}", roles);
        }
    }

    #[tokio::test]
    async fn test_register_validation() {
        let accounts = service().await;

        assert!(matches!(accounts.register("  ", "secret1").await, Err(AppError::Validation(_))));
        assert!(matches!(accounts.register("bob", "12345").await, Err(AppError::Validation(_))));

        accounts.register("bob", "123456").await.unwrap();
        assert!(matches!(accounts.register("bob", "654321").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_and_wrong_password_alike() {
        let accounts = service().await;
        accounts.register("alice", "wonderland").await.unwrap();

        let unknown = accounts.login("nobody", "wonderland").await.unwrap_err();
        let wrong = accounts.login("alice", "looking-glass").await.unwrap_err();

        assert_eq!(unknown.kind(), "auth_invalid_credentials");
        assert_eq!(wrong.kind(), unknown.kind());
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_login_issues_valid_session() {
        let accounts = service().await;
        let user = accounts.register("alice", "wonderland").await.unwrap();

        let auth = accounts.login("alice", "wonderland").await.unwrap();
        let session = accounts.sessions.validate(&auth.token).await.unwrap();

        assert_eq!(session.user_id, user.id);
        assert_eq!(session.expires_at, auth.expires_at);
    }

    #[tokio::test]
    async fn test_listing_reports_effective_limit_and_usage() {
        let accounts = service().await;
        let admin = accounts.register("root", "secret1").await.unwrap();
        let user = accounts.register("guest", "secret2").await.unwrap();

        accounts.quota.update_daily_limit(user.id, 10).await.unwrap();
        accounts.quota.record(user.id, "127.0.0.1").await.unwrap();

        let listing = accounts.list_users_with_usage().await.unwrap();
        assert_eq!(listing.len(), 2);

        let guest = listing.iter().find(|u| u.id == user.id).unwrap();
        assert_eq!(guest.daily_limit, 10);
        assert_eq!(guest.used_today, 1);

        let root = listing.iter().find(|u| u.id == admin.id).unwrap();
        assert_eq!(root.daily_limit, 3);
        assert_eq!(root.used_today, 0);
    }
}
