//! # Outbox Repository
//!
//! Storage for the sync outbox queue. The compare-and-swap primitive
//! (`try_update_status`) is this repository's load-bearing method: it is
//! how the sync engine claims an item without a lock, by turning the claim
//! into a single conditional `UPDATE` and inspecting `rows_affected()`.

use chrono::{DateTime, Utc};
use inkwell_core::{EntityKind, OutboxItem, OutboxKind, OutboxStatus};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: String,
    kind: String,
    entity_kind: String,
    local_ref: String,
    server_id: Option<i64>,
    payload: String,
    status: String,
    retry_count: i64,
    idempotency_key: String,
    original_queue_id: Option<String>,
    created_at: DateTime<Utc>,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

fn kind_str(kind: OutboxKind) -> &'static str {
    match kind {
        OutboxKind::Create => "create",
        OutboxKind::Update => "update",
        OutboxKind::Delete => "delete",
    }
}

fn parse_kind(value: &str) -> DbResult<OutboxKind> {
    Ok(match value {
        "create" => OutboxKind::Create,
        "update" => OutboxKind::Update,
        "delete" => OutboxKind::Delete,
        other => return Err(DbError::Internal(format!("unknown outbox kind {other}"))),
    })
}

fn entity_kind_str(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Memo => "memo",
        EntityKind::Shelf => "shelf",
    }
}

fn parse_entity_kind(value: &str) -> DbResult<EntityKind> {
    Ok(match value {
        "memo" => EntityKind::Memo,
        "shelf" => EntityKind::Shelf,
        other => return Err(DbError::Internal(format!("unknown entity kind {other}"))),
    })
}

fn status_str(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Waiting => "waiting",
        OutboxStatus::Syncing => "syncing",
        OutboxStatus::Success => "success",
        OutboxStatus::Failed => "failed",
    }
}

fn parse_status(value: &str) -> DbResult<OutboxStatus> {
    Ok(match value {
        "pending" => OutboxStatus::Pending,
        "waiting" => OutboxStatus::Waiting,
        "syncing" => OutboxStatus::Syncing,
        "success" => OutboxStatus::Success,
        "failed" => OutboxStatus::Failed,
        other => return Err(DbError::Internal(format!("unknown outbox status {other}"))),
    })
}

impl OutboxRow {
    fn into_item(self) -> DbResult<OutboxItem> {
        let local_ref = Uuid::parse_str(&self.local_ref)
            .map_err(|e| DbError::Internal(format!("corrupt local_ref on outbox {}: {e}", self.id)))?;
        let idempotency_key = Uuid::parse_str(&self.idempotency_key).map_err(|e| {
            DbError::Internal(format!("corrupt idempotency_key on outbox {}: {e}", self.id))
        })?;

        Ok(OutboxItem {
            id: self.id,
            kind: parse_kind(&self.kind)?,
            entity_kind: parse_entity_kind(&self.entity_kind)?,
            local_ref,
            server_id: self.server_id,
            payload: self.payload,
            status: parse_status(&self.status)?,
            retry_count: self.retry_count.max(0) as u32,
            idempotency_key,
            original_queue_id: self.original_queue_id,
            created_at: self.created_at,
            next_attempt_at: self.next_attempt_at,
            last_error: self.last_error,
        })
    }
}

const SELECT_COLUMNS: &str = "id, kind, entity_kind, local_ref, server_id, payload, status, \
     retry_count, idempotency_key, original_queue_id, created_at, next_attempt_at, last_error";

/// Repository for outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    pub async fn enqueue(&self, item: &OutboxItem) -> DbResult<()> {
        debug!(id = %item.id, kind = ?item.kind, "enqueuing outbox item");

        sqlx::query(&format!(
            "INSERT INTO sync_queue ({SELECT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ))
        .bind(&item.id)
        .bind(kind_str(item.kind))
        .bind(entity_kind_str(item.entity_kind))
        .bind(item.local_ref.to_string())
        .bind(item.server_id)
        .bind(&item.payload)
        .bind(status_str(item.status))
        .bind(item.retry_count as i64)
        .bind(item.idempotency_key.to_string())
        .bind(&item.original_queue_id)
        .bind(item.created_at)
        .bind(item.next_attempt_at)
        .bind(&item.last_error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns PENDING items whose `next_attempt_at` has elapsed (or is
    /// unset), oldest first, up to `limit`.
    pub async fn get_claimable(&self, limit: u32) -> DbResult<Vec<OutboxItem>> {
        let rows = sqlx::query_as::<_, OutboxRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue \
             WHERE status = 'pending' AND (next_attempt_at IS NULL OR next_attempt_at <= ?1) \
             ORDER BY created_at ASC LIMIT ?2"
        ))
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxRow::into_item).collect()
    }

    /// Returns WAITING items whose `original_queue_id` has settled (the
    /// item it was queued behind reached SUCCESS, or no longer exists),
    /// so they can be promoted back to PENDING. A row that merely reached
    /// SUCCESS is never deleted until the retention sweep runs, so the
    /// check must look at its status rather than its mere presence.
    pub async fn get_promotable_waiting(&self) -> DbResult<Vec<OutboxItem>> {
        let rows = sqlx::query_as::<_, OutboxRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue w \
             WHERE w.status = 'waiting' \
             AND (w.original_queue_id IS NULL OR NOT EXISTS ( \
                 SELECT 1 FROM sync_queue o WHERE o.id = w.original_queue_id AND o.status != 'success'))"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxRow::into_item).collect()
    }

    /// Compare-and-swap status transition: succeeds only if the row's
    /// current status matches `expected`. Returns whether the swap
    /// happened, so a caller racing another worker can tell it lost.
    pub async fn try_update_status(
        &self,
        id: &str,
        expected: OutboxStatus,
        new_status: OutboxStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sync_queue SET status = ?3 WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(status_str(expected))
            .bind(status_str(new_status))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_success(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sync_queue SET status = 'success' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Records a failed attempt: increments `retry_count`, stores the
    /// error, and re-arms `next_attempt_at` for a later retry, unless the
    /// caller has exhausted retries (in which case pass `Failed` for
    /// `next_status`).
    pub async fn mark_attempt_failed(
        &self,
        id: &str,
        error: &str,
        next_status: OutboxStatus,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE sync_queue SET retry_count = retry_count + 1, last_error = ?2, \
             status = ?3, next_attempt_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(status_str(next_status))
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites a queued item's payload in place, used to merge a later
    /// UPDATE into a still-unsynced CREATE rather than queuing a second
    /// item for the same entity.
    pub async fn update_payload(&self, id: &str, payload: &str) -> DbResult<()> {
        sqlx::query("UPDATE sync_queue SET payload = ?2 WHERE id = ?1")
            .bind(id)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Manually resets a permanently FAILED item back to PENDING with its
    /// retry counter cleared, so an operator-triggered retry starts the
    /// backoff schedule over from the first interval.
    pub async fn rearm(&self, id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0, \
             next_attempt_at = NULL, last_error = NULL WHERE id = ?1 AND status = 'failed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_server_id(&self, id: &str, server_id: i64) -> DbResult<()> {
        sqlx::query("UPDATE sync_queue SET server_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(server_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Finds the single in-flight or queued item for a local entity, used
    /// by the coalescing rule (at most one PENDING/WAITING/SYNCING item per
    /// entity).
    pub async fn find_unsettled_for_entity(&self, local_ref: Uuid) -> DbResult<Option<OutboxItem>> {
        let row = sqlx::query_as::<_, OutboxRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue \
             WHERE local_ref = ?1 AND status != 'success' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(local_ref.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OutboxRow::into_item).transpose()
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'waiting', 'syncing')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes SUCCESS entries older than `days_old` (hybrid retention
    /// sweep).
    pub async fn sweep_succeeded(&self, days_old: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM sync_queue WHERE status = 'success' \
             AND created_at < datetime('now', '-' || ?1 || ' days')",
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
