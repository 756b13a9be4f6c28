use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};
use uuid::Uuid;

use shared::{domain::WatchId, protocol::DraftSnapshot};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Listing row for a saved draft; the full snapshot is only decoded on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSummary {
    pub draft_id: Uuid,
    pub record_id: Option<WatchId>,
    pub current_step: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts or replaces the draft keyed by `snapshot.draft_id`. The
    /// original `created_at` survives updates.
    pub async fn save_draft(&self, snapshot: &DraftSnapshot) -> Result<()> {
        let snapshot_json =
            serde_json::to_string(snapshot).context("failed to encode draft snapshot")?;
        let current_step = i64::try_from(snapshot.current_step)
            .context("draft step index out of range")?;

        sqlx::query(
            "INSERT INTO drafts (draft_id, record_id, current_step, snapshot_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(draft_id) DO UPDATE SET
                record_id = excluded.record_id,
                current_step = excluded.current_step,
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at",
        )
        .bind(snapshot.draft_id.to_string())
        .bind(snapshot.record_id.map(|id| id.0))
        .bind(current_step)
        .bind(snapshot_json)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save draft {}", snapshot.draft_id))?;

        info!(
            draft_id = %snapshot.draft_id,
            step = snapshot.current_step,
            fields = snapshot.values.len(),
            "saved draft"
        );
        Ok(())
    }

    pub async fn load_draft(&self, draft_id: Uuid) -> Result<Option<DraftSnapshot>> {
        let row = sqlx::query("SELECT snapshot_json FROM drafts WHERE draft_id = ?")
            .bind(draft_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load draft {draft_id}"))?;

        let Some(row) = row else {
            debug!(%draft_id, "draft not found");
            return Ok(None);
        };
        let snapshot_json: String = row.try_get("snapshot_json")?;
        let snapshot = serde_json::from_str(&snapshot_json)
            .with_context(|| format!("draft {draft_id} holds an unreadable snapshot"))?;
        Ok(Some(snapshot))
    }

    /// Saved drafts, most recently updated first.
    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>> {
        let rows = sqlx::query(
            "SELECT draft_id, record_id, current_step, created_at, updated_at
             FROM drafts
             ORDER BY updated_at DESC, draft_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list drafts")?;

        rows.into_iter()
            .map(|row| -> Result<DraftSummary> {
                let draft_id: String = row.try_get("draft_id")?;
                let current_step: i64 = row.try_get("current_step")?;
                Ok(DraftSummary {
                    draft_id: Uuid::parse_str(&draft_id)
                        .with_context(|| format!("invalid draft id '{draft_id}'"))?,
                    record_id: row.try_get::<Option<i64>, _>("record_id")?.map(WatchId),
                    current_step: usize::try_from(current_step)
                        .context("negative draft step index")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    /// Returns whether a draft was removed.
    pub async fn discard_draft(&self, draft_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE draft_id = ?")
            .bind(draft_id.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to discard draft {draft_id}"))?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(%draft_id, "discarded draft");
        }
        Ok(removed)
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

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
