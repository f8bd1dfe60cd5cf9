//! # Memo Repository
//!
//! Storage for reading memos. Mirrors the outbox-adjacent repository
//! pattern used throughout this crate: a thin wrapper over `SqlitePool`
//! with one method per operation the facade and sync engine need.

use chrono::{DateTime, NaiveDate, Utc};
use inkwell_core::{EntityRef, EntitySyncStatus, Memo};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct MemoRow {
    id: String,
    server_id: Option<i64>,
    user_book_local_id: Option<String>,
    user_book_server_id: Option<i64>,
    content: String,
    page_number: Option<i32>,
    tags: String,
    memo_start_time: DateTime<Utc>,
    sync_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sync_queue_id: Option<String>,
}

impl MemoRow {
    fn into_memo(self) -> DbResult<Memo> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DbError::Internal(format!("corrupt memo id {}: {e}", self.id)))?;

        let user_book_id = match self.user_book_server_id {
            Some(server_id) => EntityRef::Server(server_id),
            None => {
                let local = self.user_book_local_id.ok_or_else(|| {
                    DbError::Internal(format!("memo {} has no user_book reference", self.id))
                })?;
                let local = Uuid::parse_str(&local).map_err(|e| {
                    DbError::Internal(format!("corrupt user_book_local_id on memo {}: {e}", self.id))
                })?;
                EntityRef::Local(local)
            }
        };

        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| DbError::Internal(format!("corrupt tags on memo {}: {e}", self.id)))?;

        Ok(Memo {
            id,
            server_id: self.server_id,
            user_book_id,
            content: self.content,
            page_number: self.page_number,
            tags,
            memo_start_time: self.memo_start_time,
            sync_status: parse_sync_status(&self.sync_status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sync_queue_id: self.sync_queue_id,
        })
    }
}

fn tags_json(tags: &[String]) -> DbResult<String> {
    serde_json::to_string(tags).map_err(|e| DbError::Internal(format!("cannot serialize tags: {e}")))
}

fn sync_status_str(status: EntitySyncStatus) -> &'static str {
    match status {
        EntitySyncStatus::Pending => "pending",
        EntitySyncStatus::SyncingCreate => "syncing_create",
        EntitySyncStatus::Synced => "synced",
        EntitySyncStatus::SyncingUpdate => "syncing_update",
        EntitySyncStatus::Waiting => "waiting",
        EntitySyncStatus::SyncingDelete => "syncing_delete",
        EntitySyncStatus::Failed => "failed",
    }
}

fn parse_sync_status(value: &str) -> DbResult<EntitySyncStatus> {
    Ok(match value {
        "pending" => EntitySyncStatus::Pending,
        "syncing_create" => EntitySyncStatus::SyncingCreate,
        "synced" => EntitySyncStatus::Synced,
        "syncing_update" => EntitySyncStatus::SyncingUpdate,
        "waiting" => EntitySyncStatus::Waiting,
        "syncing_delete" => EntitySyncStatus::SyncingDelete,
        "failed" => EntitySyncStatus::Failed,
        other => return Err(DbError::Internal(format!("unknown sync_status {other}"))),
    })
}

const SELECT_COLUMNS: &str = "id, server_id, user_book_local_id, user_book_server_id, content, \
     page_number, tags, memo_start_time, sync_status, created_at, updated_at, sync_queue_id";

/// Repository for memo operations.
#[derive(Debug, Clone)]
pub struct MemoRepository {
    pool: SqlitePool,
}

impl MemoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MemoRepository { pool }
    }

    pub async fn create(&self, memo: &Memo) -> DbResult<()> {
        let (user_book_local_id, user_book_server_id) = match memo.user_book_id {
            EntityRef::Local(id) => (Some(id.to_string()), None),
            EntityRef::Server(id) => (None, Some(id)),
        };

        sqlx::query(&format!(
            "INSERT INTO offline_memos ({SELECT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ))
        .bind(memo.id.to_string())
        .bind(memo.server_id)
        .bind(user_book_local_id)
        .bind(user_book_server_id)
        .bind(&memo.content)
        .bind(memo.page_number)
        .bind(tags_json(&memo.tags)?)
        .bind(memo.memo_start_time)
        .bind(sync_status_str(memo.sync_status))
        .bind(memo.created_at)
        .bind(memo.updated_at)
        .bind(&memo.sync_queue_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_local_id(&self, id: Uuid) -> DbResult<Option<Memo>> {
        let row = sqlx::query_as::<_, MemoRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_memos WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(MemoRow::into_memo).transpose()
    }

    pub async fn get_by_server_id(&self, server_id: i64) -> DbResult<Option<Memo>> {
        let row = sqlx::query_as::<_, MemoRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_memos WHERE server_id = ?1"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MemoRow::into_memo).transpose()
    }

    pub async fn list_by_user_book(&self, user_book_server_id: i64) -> DbResult<Vec<Memo>> {
        let rows = sqlx::query_as::<_, MemoRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_memos WHERE user_book_server_id = ?1 ORDER BY memo_start_time DESC"
        ))
        .bind(user_book_server_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MemoRow::into_memo).collect()
    }

    /// Lists memos against a shelf entry that hasn't synced yet, so the
    /// facade can serve `memos_by_book` for a book still referenced by
    /// local id.
    pub async fn list_by_user_book_local(&self, user_book_local_id: Uuid) -> DbResult<Vec<Memo>> {
        let rows = sqlx::query_as::<_, MemoRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_memos WHERE user_book_local_id = ?1 ORDER BY memo_start_time DESC"
        ))
        .bind(user_book_local_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MemoRow::into_memo).collect()
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> DbResult<Vec<Memo>> {
        let rows = sqlx::query_as::<_, MemoRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_memos WHERE date(memo_start_time) = ?1 ORDER BY created_at ASC"
        ))
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MemoRow::into_memo).collect()
    }

    pub async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        page_number: Option<i32>,
    ) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE offline_memos SET content = ?2, page_number = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(content)
        .bind(page_number)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_sync_status(&self, id: Uuid, status: EntitySyncStatus) -> DbResult<()> {
        sqlx::query("UPDATE offline_memos SET sync_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(sync_status_str(status))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_server_id(&self, id: Uuid, server_id: i64) -> DbResult<()> {
        sqlx::query("UPDATE offline_memos SET server_id = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(server_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_sync_queue_id(&self, id: Uuid, sync_queue_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE offline_memos SET sync_queue_id = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(sync_queue_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Cascade assignment: once a shelf entry's CREATE syncs and it
    /// receives a server id, every memo still referencing it by local id
    /// is repointed at the server id so its own CREATE/UPDATE can be sent.
    pub async fn reassign_user_book_server_id(
        &self,
        shelf_local_id: Uuid,
        server_id: i64,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE offline_memos SET user_book_server_id = ?2, user_book_local_id = NULL \
             WHERE user_book_local_id = ?1",
        )
        .bind(shelf_local_id.to_string())
        .bind(server_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_by_local_id(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("DELETE FROM offline_memos WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Distinct dates with at least one memo, most recent first.
    pub async fn list_distinct_dates(&self) -> DbResult<Vec<NaiveDate>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT date(memo_start_time) FROM offline_memos ORDER BY date(memo_start_time) DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| DbError::Internal(format!("corrupt memo_start_time date {raw}: {e}")))
            })
            .collect()
    }

    /// Deletes a successfully-synced memo whose `memo_start_time` is older
    /// than `retention_days`. Applied right after a CREATE/UPDATE settles
    /// (hybrid retention, post-mutation half); returns whether a row was
    /// actually dropped.
    pub async fn drop_if_aged_past_retention(&self, id: Uuid, retention_days: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM offline_memos WHERE id = ?1 AND sync_status = 'synced' \
             AND memo_start_time < datetime('now', '-' || ?2 || ' days')",
        )
        .bind(id.to_string())
        .bind(retention_days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Periodic sweep (hybrid retention, idle half): drops every `Synced`
    /// memo whose `memo_start_time` is older than `sweep_days`, independent
    /// of any specific CREATE/UPDATE event. Returns the number dropped.
    pub async fn sweep_synced_idle(&self, sweep_days: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM offline_memos WHERE sync_status = 'synced' \
             AND memo_start_time < datetime('now', '-' || ?1 || ' days')",
        )
        .bind(sweep_days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Writes a server-sourced memo into the cache: updates the existing
    /// local row if one is already keyed to `server_id`, else inserts a
    /// fresh one with a new local id.
    pub async fn upsert_from_remote(
        &self,
        server_id: i64,
        user_book_server_id: i64,
        content: &str,
        page_number: Option<i32>,
        tags: &[String],
        memo_start_time: DateTime<Utc>,
    ) -> DbResult<Uuid> {
        if let Some(existing) = self.get_by_server_id(server_id).await? {
            sqlx::query(
                "UPDATE offline_memos SET user_book_server_id = ?2, user_book_local_id = NULL, \
                 content = ?3, page_number = ?4, tags = ?5, memo_start_time = ?6, sync_status = ?7, \
                 updated_at = ?8 WHERE id = ?1",
            )
            .bind(existing.id.to_string())
            .bind(user_book_server_id)
            .bind(content)
            .bind(page_number)
            .bind(tags_json(tags)?)
            .bind(memo_start_time)
            .bind(sync_status_str(EntitySyncStatus::Synced))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            return Ok(existing.id);
        }

        let now = Utc::now();
        let memo = Memo {
            id: Uuid::new_v4(),
            server_id: Some(server_id),
            user_book_id: EntityRef::Server(user_book_server_id),
            content: content.to_string(),
            page_number,
            tags: tags.to_vec(),
            memo_start_time,
            sync_status: EntitySyncStatus::Synced,
            created_at: now,
            updated_at: now,
            sync_queue_id: None,
        };
        self.create(&memo).await?;
        Ok(memo.id)
    }
}
