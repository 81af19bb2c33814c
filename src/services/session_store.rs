use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    auth::JwtService,
    database::{queries::SessionQueries, Database},
    errors::{AuthError, Result},
    models::Session,
};

/// Opaque token to `(user, expiry)` state. Sessions are only ever invalidated
/// by expiry.
#[derive(Clone)]
pub struct SessionStore {
    database: Database,
    jwt: Arc<JwtService>,
}

impl SessionStore {
    pub fn new(database: Database, jwt: Arc<JwtService>) -> Self {
        Self { database, jwt }
    }

    pub async fn create_session(&self, user_id: i64) -> Result<(String, DateTime<Utc>)> {
        self.create_session_at(user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let (token, expires_at) = self.jwt.issue(user_id, now)?;
        SessionQueries::insert(self.database.pool(), user_id, &token, expires_at).await?;

        tracing::debug!(user_id, %expires_at, "Session created");
        Ok((token, expires_at))
    }

    pub async fn validate(&self, token: &str) -> Result<Session> {
        self.validate_at(token, Utc::now()).await
    }

    /// Checks signature, stored row, owner and expiry, in that order.
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let claims = self.jwt.verify(token)?;

        let session = SessionQueries::find_by_token(self.database.pool(), token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.user_id != claims.uid {
            tracing::warn!(
                session_user = session.user_id,
                token_user = claims.uid,
                "Token user does not match stored session"
            );
            return Err(AuthError::UserMismatch.into());
        }

        if session.is_expired_at(now) {
            return Err(AuthError::SessionExpired.into());
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::queries::UserQueries, errors::AppError, models::Role};
    use chrono::Duration;

    async fn setup() -> (SessionStore, i64, i64) {
        let database = Database::in_memory().await.unwrap();
        let alice = UserQueries::create_user(database.pool(), "alice", "x", Role::Admin)
            .await
            .unwrap();
        let bob = UserQueries::create_user(database.pool(), "bob", "x", Role::User)
            .await
            .unwrap();
        let jwt = Arc::new(JwtService::new("session-test", Duration::days(7)));
        (SessionStore::new(database, jwt), alice.id, bob.id)
    }

    fn auth_kind(result: Result<Session>) -> AuthError {
        match result {
            Err(AppError::Auth(kind)) => kind,
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_created_session_validates() {
        let (store, alice, _) = setup().await;

        let (token, expires_at) = store.create_session(alice).await.unwrap();
        let session = store.validate(&token).await.unwrap();

        assert_eq!(session.user_id, alice);
        assert_eq!(session.token, token);
        assert_eq!(session.expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_multiple_sessions_per_user() {
        let (store, alice, _) = setup().await;

        let (first, _) = store.create_session(alice).await.unwrap();
        let (second, _) = store.create_session(alice).await.unwrap();

        assert!(store.validate(&first).await.is_ok());
        assert!(store.validate(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let (store, _, _) = setup().await;
        assert_eq!(auth_kind(store.validate("abc.def.ghi").await), AuthError::Malformed);
    }

    #[tokio::test]
    async fn test_unstored_token_is_not_found() {
        let (store, alice, _) = setup().await;
        let (token, _) = store.jwt.issue(alice, Utc::now()).unwrap();

        assert_eq!(auth_kind(store.validate(&token).await), AuthError::SessionNotFound);
    }

    #[tokio::test]
    async fn test_user_mismatch() {
        let (store, alice, bob) = setup().await;
        let (token, expires_at) = store.jwt.issue(alice, Utc::now()).unwrap();
        SessionQueries::insert(store.database.pool(), bob, &token, expires_at)
            .await
            .unwrap();

        assert_eq!(auth_kind(store.validate(&token).await), AuthError::UserMismatch);
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (store, alice, _) = setup().await;
        let now = Utc::now();
        let (token, expires_at) = store.create_session_at(alice, now).await.unwrap();

        let just_before = expires_at - Duration::seconds(1);
        assert!(store.validate_at(&token, just_before).await.is_ok());
        assert_eq!(
            auth_kind(store.validate_at(&token, expires_at).await),
            AuthError::SessionExpired
        );
    }

    #[tokio::test]
    async fn test_session_expired_one_second_ago() {
        let (store, alice, _) = setup().await;
        let issued = Utc::now() - Duration::days(7) - Duration::seconds(1);
        let (token, _) = store.create_session_at(alice, issued).await.unwrap();

        assert_eq!(auth_kind(store.validate(&token).await), AuthError::SessionExpired);
    }
}
