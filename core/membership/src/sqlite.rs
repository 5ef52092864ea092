//! SQLite-backed membership store and user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use researchhub_common::{Email, Error, ProjectId, Provider, Result, UserId};

use crate::collaborators::UserDirectory;
use crate::model::{
    ExternalFolderLink, GlobalRole, Membership, MembershipRole, MembershipStatus, Project, User,
};
use crate::store::{plan_transition, MembershipStore, TransitionOutcome};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    visibility TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    project_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, user_id)
);

CREATE TABLE IF NOT EXISTS folder_links (
    project_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    folder_id TEXT NOT NULL,
    folder_url TEXT NOT NULL,
    linked_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, provider)
);
"#;

const MEMBERSHIP_COLUMNS: &str =
    "project_id, user_id, status, role, created_at, updated_at";

fn db_error(err: rusqlite::Error) -> Error {
    Error::Database(err.to_string())
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

type RawMembership = (String, String, String, String, i64, i64);

fn raw_membership(row: &Row<'_>) -> rusqlite::Result<RawMembership> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_membership(raw: RawMembership) -> Result<Membership> {
    let (project_id, user_id, status, role, created_at, updated_at) = raw;
    Ok(Membership {
        project_id: ProjectId::new(project_id)?,
        user_id: UserId::new(user_id)?,
        status: status.parse()?,
        role: role.parse()?,
        created_at: timestamp(created_at),
        updated_at: timestamp(updated_at),
    })
}

fn decode_user(raw: (String, String, String)) -> Result<User> {
    let (id, email, role) = raw;
    Ok(User {
        id: UserId::new(id)?,
        email: Email::parse(&email)?,
        role: role.parse()?,
    })
}

/// Membership store persisted in a SQLite database.
///
/// The same database also serves as the user directory for the CLI.
pub struct SqliteMembershipStore {
    conn: Mutex<Connection>,
}

impl SqliteMembershipStore {
    /// Create or open the membership tables in the database at `db_path`.
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
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        info!("Membership store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register or update a user.
    ///
    /// # Errors
    /// - `Conflict` if another user already has the email
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn();
        let taken: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1 AND id != ?2",
                params![user.email.as_str(), user.id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if let Some(other) = taken {
            return Err(Error::Conflict(format!(
                "Email {} is already registered to {}",
                user.email, other
            )));
        }

        conn.execute(
            r#"
            INSERT INTO users (id, email, role) VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET email = excluded.email, role = excluded.role
            "#,
            params![user.id.as_str(), user.email.as_str(), user.role.as_str()],
        )
        .map_err(db_error)?;
        Ok(())
    }

    fn query_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let raw = self
            .conn()
            .query_row(
                &format!("SELECT id, email, role FROM users WHERE {} = ?1", column),
                params![value],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;
        raw.map(decode_user).transpose()
    }

    fn load_membership(
        conn: &Connection,
        project: &ProjectId,
        user: &UserId,
    ) -> Result<Option<Membership>> {
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM memberships WHERE project_id = ?1 AND user_id = ?2",
                    MEMBERSHIP_COLUMNS
                ),
                params![project.as_str(), user.as_str()],
                raw_membership,
            )
            .optional()
            .map_err(db_error)?;
        raw.map(decode_membership).transpose()
    }
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        let inserted = self
            .conn()
            .execute(
                r#"
                INSERT OR IGNORE INTO projects (id, owner_id, title, visibility, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    project.id.as_str(),
                    project.owner_id.as_str(),
                    project.title,
                    project.visibility.as_str(),
                    project.created_at.timestamp_millis(),
                ],
            )
            .map_err(db_error)?;

        if inserted == 0 {
            return Err(Error::Conflict(format!(
                "Project {} already exists",
                project.id
            )));
        }
        Ok(())
    }

    async fn project(&self, id: &ProjectId) -> Result<Option<Project>> {
        let raw = self
            .conn()
            .query_row(
                "SELECT id, owner_id, title, visibility, created_at FROM projects WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;

        raw.map(|(id, owner, title, visibility, created_at)| {
            Ok(Project {
                id: ProjectId::new(id)?,
                owner_id: UserId::new(owner)?,
                title,
                visibility: visibility.parse()?,
                created_at: timestamp(created_at),
            })
        })
        .transpose()
    }

    async fn membership(&self, project: &ProjectId, user: &UserId) -> Result<Option<Membership>> {
        Self::load_membership(&self.conn(), project, user)
    }

    async fn memberships(&self, project: &ProjectId) -> Result<Vec<Membership>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM memberships WHERE project_id = ?1 ORDER BY created_at, user_id",
                MEMBERSHIP_COLUMNS
            ))
            .map_err(db_error)?;

        let rows = stmt
            .query_map(params![project.as_str()], raw_membership)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;

        rows.into_iter().map(decode_membership).collect()
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<bool> {
        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO memberships ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    MEMBERSHIP_COLUMNS
                ),
                params![
                    membership.project_id.as_str(),
                    membership.user_id.as_str(),
                    membership.status.as_str(),
                    membership.role.as_str(),
                    membership.created_at.timestamp_millis(),
                    membership.updated_at.timestamp_millis(),
                ],
            )
            .map_err(db_error)?;
        Ok(inserted == 1)
    }

    async fn transition(
        &self,
        project: &ProjectId,
        user: &UserId,
        from: &[MembershipStatus],
        to: MembershipStatus,
        role: Option<MembershipRole>,
    ) -> Result<TransitionOutcome> {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock up front so other processes sharing
        // the file cannot interleave between the read and the update.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;

        let Some(current) = Self::load_membership(&tx, project, user)? else {
            return Ok(TransitionOutcome::Missing);
        };

        if let Some(outcome) = plan_transition(&current, from, to) {
            return Ok(outcome);
        }

        tx.execute(
            r#"
            UPDATE memberships
            SET status = ?3, role = COALESCE(?4, role), updated_at = ?5
            WHERE project_id = ?1 AND user_id = ?2 AND status = ?6
            "#,
            params![
                project.as_str(),
                user.as_str(),
                to.as_str(),
                role.map(|r| r.as_str()),
                Utc::now().timestamp_millis(),
                current.status.as_str(),
            ],
        )
        .map_err(db_error)?;

        let updated = Self::load_membership(&tx, project, user)?
            .ok_or_else(|| Error::Database("Membership vanished during update".to_string()))?;
        tx.commit().map_err(db_error)?;

        Ok(TransitionOutcome::Applied(updated))
    }

    async fn folder_links(&self, project: &ProjectId) -> Result<Vec<ExternalFolderLink>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT provider, folder_id, folder_url, linked_at
                FROM folder_links WHERE project_id = ?1 ORDER BY provider
                "#,
            )
            .map_err(db_error)?;

        let rows = stmt
            .query_map(params![project.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;

        rows.into_iter()
            .map(|(provider, folder_id, folder_url, linked_at)| {
                Ok(ExternalFolderLink {
                    project_id: project.clone(),
                    provider: provider.parse::<Provider>()?,
                    folder_id,
                    folder_url,
                    linked_at: timestamp(linked_at),
                })
            })
            .collect()
    }

    async fn attach_folder_link(&self, link: &ExternalFolderLink) -> Result<()> {
        let inserted = self
            .conn()
            .execute(
                r#"
                INSERT OR IGNORE INTO folder_links (project_id, provider, folder_id, folder_url, linked_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    link.project_id.as_str(),
                    link.provider.as_str(),
                    link.folder_id,
                    link.folder_url,
                    link.linked_at.timestamp_millis(),
                ],
            )
            .map_err(db_error)?;

        if inserted == 0 {
            return Err(Error::Conflict(format!(
                "Project {} already has a {} folder",
                link.project_id, link.provider
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteMembershipStore {
    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        self.query_user("id", id.as_str())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>> {
        self.query_user("email", email.as_str())
    }
}
