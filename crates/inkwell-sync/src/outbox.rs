//! # Outbox Queue
//!
//! Business-logic layer over [`inkwell_db::OutboxRepository`]: enforces the
//! coalescing rule (at most one unsettled outbox item per entity), arms the
//! exponential backoff timer on failure, and promotes WAITING items once
//! the item they're queued behind has left the queue.
//!
//! The repository layer only knows how to store rows and run the CAS
//! primitive; this module is where the outbox's actual invariants live.

use inkwell_core::{EntityKind, OutboxItem, OutboxKind, OutboxStatus};
use inkwell_db::repository::outbox::OutboxRepository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SyncResult;

/// Outbox queue with coalescing and backoff built in.
#[derive(Clone)]
pub struct OutboxQueue {
    repo: OutboxRepository,
    backoff_base: std::time::Duration,
    max_retries: u32,
}

impl OutboxQueue {
    pub fn new(repo: OutboxRepository, backoff_base: std::time::Duration, max_retries: u32) -> Self {
        OutboxQueue {
            repo,
            backoff_base,
            max_retries,
        }
    }

    /// Enqueues a mutation, coalescing it into the entity's existing
    /// unsettled item where the rule allows:
    ///
    /// - For a **memo**, an UPDATE arriving while its CREATE is still
    ///   unsettled is merged into the CREATE's payload rather than queued
    ///   separately (the server has never seen the memo, so there is
    ///   nothing to PUT yet). This is memo-specific: a shelf entry's
    ///   CREATE and UPDATE hit distinct endpoints with distinct bodies
    ///   (`POST /user/books` vs `PUT /user/books/{id}`), so a shelf
    ///   UPDATE-after-CREATE instead queues as WAITING behind the CREATE
    ///   and is promoted once the CREATE assigns a `serverId`.
    /// - An UPDATE arriving while a PENDING UPDATE for the same entity is
    ///   already queued replaces that item's payload in place, so only
    ///   the latest body ever replays.
    /// - A DELETE arriving while anything is unsettled for the entity
    ///   always queues as WAITING behind it, since a delete must not race
    ///   ahead of a create/update still in flight.
    /// - Otherwise the new item becomes the latest unsettled item, queued
    ///   as WAITING behind whatever was there before, or PENDING if
    ///   nothing was.
    pub async fn enqueue(
        &self,
        kind: OutboxKind,
        entity_kind: EntityKind,
        local_ref: Uuid,
        payload: String,
    ) -> SyncResult<OutboxItem> {
        let existing = self.repo.find_unsettled_for_entity(local_ref).await?;

        if let (OutboxKind::Update, Some(existing)) = (kind, &existing) {
            let coalesces_into_create = entity_kind == EntityKind::Memo
                && existing.kind == OutboxKind::Create
                && matches!(
                    existing.status,
                    OutboxStatus::Pending | OutboxStatus::Waiting | OutboxStatus::Syncing
                );
            let coalesces_into_update = existing.kind == OutboxKind::Update && existing.status == OutboxStatus::Pending;

            if coalesces_into_create {
                debug!(id = %existing.id, "coalescing update into in-flight create");
                return self.merge_payload(existing, payload).await;
            }
            if coalesces_into_update {
                debug!(id = %existing.id, "coalescing update into pending update");
                return self.merge_payload(existing, payload).await;
            }
        }

        let (status, original_queue_id) = match &existing {
            Some(existing) => (OutboxStatus::Waiting, Some(existing.id.clone())),
            None => (OutboxStatus::Pending, None),
        };

        let item = OutboxItem {
            id: Uuid::new_v4().to_string(),
            kind,
            entity_kind,
            local_ref,
            server_id: None,
            payload,
            status,
            retry_count: 0,
            idempotency_key: Uuid::new_v4(),
            original_queue_id,
            created_at: chrono::Utc::now(),
            next_attempt_at: None,
            last_error: None,
        };

        self.repo.enqueue(&item).await?;
        Ok(item)
    }

    async fn merge_payload(&self, existing: &OutboxItem, payload: String) -> SyncResult<OutboxItem> {
        let mut merged = existing.clone();
        merged.payload = payload;
        self.repo.update_payload(&existing.id, &merged.payload).await?;
        Ok(merged)
    }

    /// Re-checks WAITING items whose blocking item has since left the
    /// queue and promotes them to PENDING so the next engine pass can
    /// claim them.
    pub async fn promote_waiting(&self) -> SyncResult<usize> {
        let promotable = self.repo.get_promotable_waiting().await?;
        let mut promoted = 0;

        for item in promotable {
            if self
                .repo
                .try_update_status(&item.id, OutboxStatus::Waiting, OutboxStatus::Pending)
                .await?
            {
                promoted += 1;
            }
        }

        Ok(promoted)
    }

    /// Items ready to claim this pass, oldest first.
    pub async fn claimable(&self, limit: u32) -> SyncResult<Vec<OutboxItem>> {
        Ok(self.repo.get_claimable(limit).await?)
    }

    pub async fn try_claim(&self, id: &str) -> SyncResult<bool> {
        Ok(self
            .repo
            .try_update_status(id, OutboxStatus::Pending, OutboxStatus::Syncing)
            .await?)
    }

    pub async fn mark_success(&self, id: &str) -> SyncResult<()> {
        self.repo.mark_success(id).await?;
        Ok(())
    }

    pub async fn set_server_id(&self, id: &str, server_id: i64) -> SyncResult<()> {
        self.repo.set_server_id(id, server_id).await?;
        Ok(())
    }

    /// Records a failed replay attempt. Re-arms the item for another
    /// attempt with exponential backoff (`base * 2^retry_count`) unless it
    /// has already used up `max_retries` attempts, in which case it is
    /// marked permanently `Failed` and the fire-and-forget retry timer
    /// below is never armed for it again.
    ///
    /// `retry_count` counts attempts that have already failed, not the
    /// attempt currently failing, so a fresh item (`retry_count == 0`)
    /// gets its initial attempt plus `max_retries` retries — `max_retries`
    /// failures in a row exhaust it, not `max_retries - 1`.
    pub async fn mark_attempt_failed(&self, id: &str, item: &OutboxItem, error: &str) -> SyncResult<bool> {
        let exhausted = item.retry_count >= self.max_retries;

        if exhausted {
            warn!(id, error, "outbox item exhausted retries, marking failed");
            self.repo
                .mark_attempt_failed(id, error, OutboxStatus::Failed, None)
                .await?;
            return Ok(true);
        }

        let delay = self.backoff_base * 2u32.pow(item.retry_count);
        let next_attempt_at = chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        debug!(id, retry = item.retry_count + 1, delay_ms = delay.as_millis() as u64, "re-arming outbox item");

        self.repo
            .mark_attempt_failed(id, error, OutboxStatus::Pending, Some(next_attempt_at))
            .await?;

        Ok(false)
    }

    /// Resets a permanently FAILED item back to PENDING with `retry_count`
    /// cleared, for an operator-triggered manual retry.
    pub async fn rearm(&self, id: &str) -> SyncResult<()> {
        self.repo.rearm(id).await?;
        Ok(())
    }

    pub async fn count_pending(&self) -> SyncResult<i64> {
        Ok(self.repo.count_pending().await?)
    }

    pub async fn sweep_succeeded(&self, days_old: i64) -> SyncResult<u64> {
        Ok(self.repo.sweep_succeeded(days_old).await?)
    }
}
