//! SQLite-backed credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use researchhub_common::{Error, Provider, Result, SecretToken, UserId};

use crate::store::{Credential, CredentialStore};

fn db_error(err: rusqlite::Error) -> Error {
    Error::Database(err.to_string())
}

/// Credential store persisted in a SQLite database.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Create or open the credential table in the database at `db_path`.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(db_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(db_error)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, provider)
            );
            "#,
        )
        .map_err(db_error)?;

        info!("Credential store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user: &UserId, provider: Provider) -> Result<Option<Credential>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                r#"
                SELECT access_token, refresh_token, updated_at
                FROM credentials WHERE user_id = ?1 AND provider = ?2
                "#,
                params![user.as_str(), provider.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;

        Ok(row.map(|(access, refresh, updated_at)| Credential {
            access_token: SecretToken::new(access),
            refresh_token: refresh.map(SecretToken::new),
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        }))
    }

    async fn set(&self, user: &UserId, provider: Provider, credential: Credential) -> Result<()> {
        self.conn()
            .execute(
                r#"
                INSERT INTO credentials (user_id, provider, access_token, refresh_token, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (user_id, provider) DO UPDATE SET
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user.as_str(),
                    provider.as_str(),
                    credential.access_token.expose(),
                    credential.refresh_token.as_ref().map(|t| t.expose()),
                    credential.updated_at.timestamp_millis(),
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    async fn update_access_token(
        &self,
        user: &UserId,
        provider: Provider,
        access_token: SecretToken,
        refresh_token: Option<SecretToken>,
    ) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                r#"
                UPDATE credentials
                SET access_token = ?3,
                    refresh_token = COALESCE(?4, refresh_token),
                    updated_at = ?5
                WHERE user_id = ?1 AND provider = ?2
                "#,
                params![
                    user.as_str(),
                    provider.as_str(),
                    access_token.expose(),
                    refresh_token.as_ref().map(|t| t.expose()),
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(db_error)?;

        if changed == 0 {
            return Err(Error::NotFound(format!(
                "No {} credential for user {}",
                provider, user
            )));
        }
        Ok(())
    }

    async fn remove(&self, user: &UserId, provider: Provider) -> Result<()> {
        self.conn()
            .execute(
                "DELETE FROM credentials WHERE user_id = ?1 AND provider = ?2",
                params![user.as_str(), provider.as_str()],
            )
            .map_err(db_error)?;
        Ok(())
    }
}
