use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::errors::Result;
use crate::models::*;

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub struct UserQueries;

impl UserQueries {
    pub async fn create_user(
        pool: &SqlitePool,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, password_hash, daily_limit, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Inserts a user whose role is decided by the same statement: `admin`
    /// when the table is empty, `user` otherwise.
    pub async fn create_user_with_bootstrap_role(
        pool: &SqlitePool,
        username: &str,
        password_hash: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role, created_at)
            VALUES (
                ?,
                ?,
                CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user' ELSE 'admin' END,
                ?
            )
            RETURNING id, username, password_hash, daily_limit, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, daily_limit, role, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, daily_limit, role, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, daily_limit, role, created_at FROM users ORDER BY id DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// `None` when the user does not exist, `Some(None)` when the limit is unset.
    pub async fn daily_limit(pool: &SqlitePool, id: i64) -> Result<Option<Option<i64>>> {
        let row: Option<(Option<i64>,)> = sqlx::query_as("SELECT daily_limit FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(|(limit,)| limit))
    }

    pub async fn update_daily_limit(pool: &SqlitePool, id: i64, limit: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET daily_limit = ? WHERE id = ?")
            .bind(limit)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SessionQueries;

impl SessionQueries {
    pub async fn insert(
        pool: &SqlitePool,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token, expires_at)
            VALUES (?, ?, ?)
            RETURNING id, user_id, token, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }
}

pub struct QuotaQueries;

impl QuotaQueries {
    pub async fn count_for_day(pool: &SqlitePool, user_id: i64, day: NaiveDate) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quota_records WHERE user_id = ? AND date = ?")
                .bind(user_id)
                .bind(day_key(day))
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    pub async fn insert(pool: &SqlitePool, user_id: i64, ip: &str, day: NaiveDate) -> Result<()> {
        sqlx::query("INSERT INTO quota_records (user_id, ip, date, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(ip)
            .bind(day_key(day))
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn list_for_day(pool: &SqlitePool, user_id: i64, day: NaiveDate) -> Result<Vec<QuotaRecord>> {
        let records = sqlx::query_as::<_, QuotaRecord>(
            "SELECT id, user_id, ip, date, created_at FROM quota_records WHERE user_id = ? AND date = ? ORDER BY id",
        )
        .bind(user_id)
        .bind(day_key(day))
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}

pub struct HistoryQueries;

impl HistoryQueries {
    pub async fn insert(pool: &SqlitePool, user_id: i64, text: &str) -> Result<()> {
        sqlx::query("INSERT INTO ocr_records (user_id, text, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(text)
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes everything but the `keep` newest rows of the user.
    pub async fn prune(pool: &SqlitePool, user_id: i64, keep: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM ocr_records
            WHERE user_id = ?
              AND id NOT IN (
                SELECT id FROM ocr_records
                WHERE user_id = ?
                ORDER BY id DESC
                LIMIT ?
              )
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(keep)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn recent(pool: &SqlitePool, user_id: i64, limit: i64) -> Result<Vec<OcrRecord>> {
        let records = sqlx::query_as::<_, OcrRecord>(
            r#"
            SELECT id, user_id, text, created_at
            FROM ocr_records
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    pub async fn clear(pool: &SqlitePool, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ocr_records WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub struct SettingQueries;

impl SettingQueries {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

        Ok(value)
    }

    pub async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }
}
