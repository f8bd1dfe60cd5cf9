//! # Remote Client
//!
//! Thin REST client for the reading journal API. `RemoteClient` is a trait
//! so the sync engine can be driven by a fake in tests; `HttpRemoteClient`
//! is the `reqwest`-backed production implementation.
//!
//! CREATE calls carry an `Idempotency-Key` header so a retried request
//! after a dropped response is a safe no-op on the server rather than a
//! duplicate.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use inkwell_core::{Category, Memo, PurchaseType, ShelfEntry};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{classify_status, RemoteErrorKind, SyncError, SyncResult};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A memo as the remote API represents it: a server id and no local
/// identity, since it has never necessarily touched this device's store.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoSummary {
    pub id: i64,
    pub user_book_id: i64,
    pub content: String,
    pub page_number: Option<i32>,
    pub tags: Vec<String>,
    pub memo_start_time: DateTime<Utc>,
}

/// A shelf entry as the remote API represents it.
#[derive(Debug, Clone, Deserialize)]
pub struct ShelfEntrySummary {
    pub id: i64,
    pub book_id: Option<i64>,
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
    pub main_genre: Option<String>,
    pub category: Category,
    pub expectation: Option<String>,
    pub last_read_page: Option<i32>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub reading_finished_date: Option<NaiveDate>,
    pub purchase_type: PurchaseType,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub started_reading_at: Option<DateTime<Utc>>,
}

/// Everything the sync engine and facade need from the remote API,
/// independent of transport. Implementations must treat 404 on DELETE and
/// 409 on CREATE (with a matching idempotency key) as success-equivalent;
/// callers rely on `classify_status` to tell those apart from real
/// failures.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn create_memo(&self, memo: &Memo, idempotency_key: Uuid) -> SyncResult<i64>;
    async fn update_memo(&self, server_id: i64, memo: &Memo) -> SyncResult<()>;
    async fn delete_memo(&self, server_id: i64) -> SyncResult<()>;

    async fn create_shelf_entry(&self, entry: &ShelfEntry, idempotency_key: Uuid) -> SyncResult<i64>;
    async fn update_shelf_entry(&self, server_id: i64, entry: &ShelfEntry) -> SyncResult<()>;
    async fn delete_shelf_entry(&self, server_id: i64) -> SyncResult<()>;
    async fn start_reading(
        &self,
        server_id: i64,
        reading_start_date: DateTime<Utc>,
        reading_progress: Option<i32>,
        purchase_type: Option<PurchaseType>,
    ) -> SyncResult<()>;

    /// Today's memos across every book (`/memos/today-flow`).
    async fn today_flow(&self) -> SyncResult<Vec<MemoSummary>>;
    /// Every memo written against a given book, newest first.
    async fn memos_by_book(&self, user_book_server_id: i64) -> SyncResult<Vec<MemoSummary>>;
    /// Distinct dates that have at least one memo (`/memos/dates`).
    async fn memo_dates(&self) -> SyncResult<Vec<NaiveDate>>;
    /// The reader's full shelf.
    async fn list_shelf_entries(&self) -> SyncResult<Vec<ShelfEntrySummary>>;
    async fn get_shelf_entry(&self, server_id: i64) -> SyncResult<ShelfEntrySummary>;
}

fn require_server_id(entity: &str, server_id: Option<i64>) -> SyncResult<i64> {
    server_id.ok_or_else(|| SyncError::Remote {
        kind: RemoteErrorKind::InvariantViolation,
        message: format!("{entity} has no server id; cannot be updated remotely yet"),
    })
}

#[derive(Serialize)]
struct CreateMemoRequest<'a> {
    user_book_id: i64,
    content: &'a str,
    page_number: Option<i32>,
    tags: &'a [String],
    memo_start_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MemoResponse {
    id: i64,
}

#[derive(Serialize)]
struct CreateShelfEntryRequest<'a> {
    book_id: Option<i64>,
    isbn: Option<&'a str>,
    title: &'a str,
    author: &'a str,
    publisher: Option<&'a str>,
    pub_date: Option<NaiveDate>,
    description: Option<&'a str>,
    cover_url: Option<&'a str>,
    total_pages: Option<i32>,
    main_genre: Option<&'a str>,
    category: Category,
    expectation: Option<&'a str>,
    last_read_page: Option<i32>,
    reading_finished_date: Option<NaiveDate>,
    purchase_type: PurchaseType,
    rating: Option<i32>,
    review: Option<&'a str>,
}

#[derive(Deserialize)]
struct ShelfEntryResponse {
    id: i64,
}

#[derive(Serialize)]
struct StartReadingRequest {
    reading_start_date: DateTime<Utc>,
    reading_progress: Option<i32>,
    purchase_type: Option<PurchaseType>,
}

/// `reqwest`-backed `RemoteClient`.
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        HttpRemoteClient {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Maps a non-2xx response into a `SyncError`, reading the body for a
    /// diagnostic message where possible.
    async fn error_for_status(resp: reqwest::Response) -> SyncError {
        let status = resp.status();
        let kind = classify_status(status.as_u16());
        let message = resp
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        SyncError::Remote { kind, message }
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn create_memo(&self, memo: &Memo, idempotency_key: Uuid) -> SyncResult<i64> {
        let user_book_id = require_server_id("memo's shelf entry", memo.user_book_id.as_server())?;

        let resp = self
            .client
            .post(self.url("/api/v1/memos"))
            .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
            .json(&CreateMemoRequest {
                user_book_id,
                content: &memo.content,
                page_number: memo.page_number,
                tags: &memo.tags,
                memo_start_time: memo.memo_start_time,
            })
            .send()
            .await?;

        if resp.status().is_success() {
            let body: MemoResponse = resp.json().await?;
            Ok(body.id)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn update_memo(&self, server_id: i64, memo: &Memo) -> SyncResult<()> {
        let resp = self
            .client
            .put(self.url(&format!("/api/v1/memos/{server_id}")))
            .json(&CreateMemoRequest {
                user_book_id: memo.user_book_id.as_server().unwrap_or_default(),
                content: &memo.content,
                page_number: memo.page_number,
                tags: &memo.tags,
                memo_start_time: memo.memo_start_time,
            })
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn delete_memo(&self, server_id: i64) -> SyncResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/v1/memos/{server_id}")))
            .send()
            .await?;

        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn create_shelf_entry(&self, entry: &ShelfEntry, idempotency_key: Uuid) -> SyncResult<i64> {
        let resp = self
            .client
            .post(self.url("/api/v1/user/books"))
            .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
            .json(&CreateShelfEntryRequest {
                book_id: entry.book_id,
                isbn: entry.isbn.as_deref(),
                title: &entry.title,
                author: &entry.author,
                publisher: entry.publisher.as_deref(),
                pub_date: entry.pub_date,
                description: entry.description.as_deref(),
                cover_url: entry.cover_url.as_deref(),
                total_pages: entry.total_pages,
                main_genre: entry.main_genre.as_deref(),
                category: entry.category,
                expectation: entry.expectation.as_deref(),
                last_read_page: entry.last_read_page,
                reading_finished_date: entry.reading_finished_date,
                purchase_type: entry.purchase_type,
                rating: entry.rating,
                review: entry.review.as_deref(),
            })
            .send()
            .await?;

        if resp.status().is_success() {
            let body: ShelfEntryResponse = resp.json().await?;
            Ok(body.id)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn update_shelf_entry(&self, server_id: i64, entry: &ShelfEntry) -> SyncResult<()> {
        let resp = self
            .client
            .put(self.url(&format!("/api/v1/user/books/{server_id}")))
            .json(&CreateShelfEntryRequest {
                book_id: entry.book_id,
                isbn: entry.isbn.as_deref(),
                title: &entry.title,
                author: &entry.author,
                publisher: entry.publisher.as_deref(),
                pub_date: entry.pub_date,
                description: entry.description.as_deref(),
                cover_url: entry.cover_url.as_deref(),
                total_pages: entry.total_pages,
                main_genre: entry.main_genre.as_deref(),
                category: entry.category,
                expectation: entry.expectation.as_deref(),
                last_read_page: entry.last_read_page,
                reading_finished_date: entry.reading_finished_date,
                purchase_type: entry.purchase_type,
                rating: entry.rating,
                review: entry.review.as_deref(),
            })
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn delete_shelf_entry(&self, server_id: i64) -> SyncResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/v1/user/books/{server_id}")))
            .send()
            .await?;

        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn start_reading(
        &self,
        server_id: i64,
        reading_start_date: DateTime<Utc>,
        reading_progress: Option<i32>,
        purchase_type: Option<PurchaseType>,
    ) -> SyncResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/api/v1/user/books/{server_id}/start-reading")))
            .json(&StartReadingRequest {
                reading_start_date,
                reading_progress,
                purchase_type,
            })
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn today_flow(&self) -> SyncResult<Vec<MemoSummary>> {
        let resp = self.client.get(self.url("/api/v1/memos/today-flow")).send().await?;
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn memos_by_book(&self, user_book_server_id: i64) -> SyncResult<Vec<MemoSummary>> {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/memos/books/{user_book_server_id}")))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn memo_dates(&self) -> SyncResult<Vec<NaiveDate>> {
        let resp = self.client.get(self.url("/api/v1/memos/dates")).send().await?;
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn list_shelf_entries(&self) -> SyncResult<Vec<ShelfEntrySummary>> {
        let resp = self.client.get(self.url("/api/v1/user/books")).send().await?;
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }

    async fn get_shelf_entry(&self, server_id: i64) -> SyncResult<ShelfEntrySummary> {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/user/books/{server_id}")))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::error_for_status(resp).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_server_id_rejects_unsynced_entity() {
        let err = require_server_id("shelf entry", None).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Remote {
                kind: RemoteErrorKind::InvariantViolation,
                ..
            }
        ));
    }

    #[test]
    fn require_server_id_passes_through_known_id() {
        assert_eq!(require_server_id("shelf entry", Some(7)).unwrap(), 7);
    }
}
