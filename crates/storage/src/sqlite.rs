use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::SessionId;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tracing::warn;

use crate::{SessionStore, Slot, SlotWrite};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredSessionSummary {
    pub session_id: SessionId,
    pub slots: Vec<Slot>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open session database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Slot store scoped to one session.
    pub fn session(&self, session_id: SessionId) -> SqliteSessionStore {
        SqliteSessionStore {
            storage: self.clone(),
            session_id,
        }
    }

    /// Every session with at least one populated slot, most recently touched first.
    pub async fn list_sessions(&self) -> Result<Vec<StoredSessionSummary>> {
        let rows = sqlx::query("SELECT session_id, slot_key, updated_at FROM session_slots")
            .fetch_all(&self.pool)
            .await
            .context("failed to list sessions")?;

        let mut sessions: BTreeMap<String, (Vec<Slot>, DateTime<Utc>)> = BTreeMap::new();
        for row in rows {
            let session_id: String = row.try_get("session_id")?;
            let slot_key: String = row.try_get("slot_key")?;
            let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

            let entry = sessions
                .entry(session_id)
                .or_insert_with(|| (Vec::new(), updated_at));
            match Slot::from_key(&slot_key) {
                Some(slot) => entry.0.push(slot),
                None => warn!(slot_key = %slot_key, "ignoring unknown session slot key"),
            }
            if updated_at > entry.1 {
                entry.1 = updated_at;
            }
        }

        let mut summaries = Vec::with_capacity(sessions.len());
        for (session_id, (mut slots, updated_at)) in sessions {
            slots.sort();
            summaries.push(StoredSessionSummary {
                session_id: SessionId::parse(&session_id)?,
                slots,
                updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Removes every slot of a session. Returns how many rows were deleted.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_slots WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete session {session_id}"))?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    storage: Storage,
    session_id: SessionId,
}

impl SqliteSessionStore {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, slot: Slot) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT payload FROM session_slots WHERE session_id = ? AND slot_key = ?",
        )
        .bind(self.session_id.as_str())
        .bind(slot.key())
        .fetch_optional(&self.storage.pool)
        .await
        .with_context(|| format!("failed to read {slot} for session {}", self.session_id))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn apply(&self, writes: &[SlotWrite]) -> Result<()> {
        let mut tx = self.storage.pool.begin().await?;
        let now = Utc::now();
        for write in writes {
            match write {
                SlotWrite::Set { slot, payload } => {
                    sqlx::query(
                        "INSERT INTO session_slots (session_id, slot_key, payload, updated_at)
                         VALUES (?, ?, ?, ?)
                         ON CONFLICT(session_id, slot_key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                    )
                    .bind(self.session_id.as_str())
                    .bind(slot.key())
                    .bind(payload)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("failed to write {slot}"))?;
                }
                SlotWrite::Clear(slot) => {
                    sqlx::query("DELETE FROM session_slots WHERE session_id = ? AND slot_key = ?")
                        .bind(self.session_id.as_str())
                        .bind(slot.key())
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("failed to clear {slot}"))?;
                }
            }
        }
        tx.commit()
            .await
            .with_context(|| format!("failed to commit writes for session {}", self.session_id))?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.storage.delete_session(&self.session_id).await?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
