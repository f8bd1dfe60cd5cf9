//! # Shelf Repository
//!
//! Storage for shelf entries (books and their reading progress).

use chrono::{DateTime, NaiveDate, Utc};
use inkwell_core::{Category, EntitySyncStatus, PurchaseType, ShelfEntry};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct ShelfRow {
    id: String,
    server_id: Option<i64>,
    book_id: Option<i64>,
    isbn: Option<String>,
    title: String,
    author: String,
    publisher: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
    cover_url: Option<String>,
    total_pages: Option<i32>,
    main_genre: Option<String>,
    category: String,
    expectation: Option<String>,
    last_read_page: Option<i32>,
    last_read_at: Option<DateTime<Utc>>,
    reading_finished_date: Option<String>,
    purchase_type: String,
    rating: Option<i32>,
    review: Option<String>,
    started_reading_at: Option<DateTime<Utc>>,
    sync_status: String,
    sync_queue_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn category_str(category: Category) -> &'static str {
    match category {
        Category::ToRead => "to_read",
        Category::Reading => "reading",
        Category::AlmostFinished => "almost_finished",
        Category::Finished => "finished",
    }
}

fn parse_category(value: &str) -> DbResult<Category> {
    Ok(match value {
        "to_read" => Category::ToRead,
        "reading" => Category::Reading,
        "almost_finished" => Category::AlmostFinished,
        "finished" => Category::Finished,
        other => return Err(DbError::Internal(format!("unknown category {other}"))),
    })
}

fn purchase_type_str(kind: PurchaseType) -> &'static str {
    match kind {
        PurchaseType::Owned => "owned",
        PurchaseType::Borrowed => "borrowed",
        PurchaseType::Library => "library",
        PurchaseType::Digital => "digital",
    }
}

fn parse_purchase_type(value: &str) -> DbResult<PurchaseType> {
    Ok(match value {
        "owned" => PurchaseType::Owned,
        "borrowed" => PurchaseType::Borrowed,
        "library" => PurchaseType::Library,
        "digital" => PurchaseType::Digital,
        other => return Err(DbError::Internal(format!("unknown purchase_type {other}"))),
    })
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

fn parse_opt_date(value: &Option<String>, field: &str, id: &str) -> DbResult<Option<NaiveDate>> {
    value
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| DbError::Internal(format!("corrupt {field} on shelf entry {id}: {e}")))
        })
        .transpose()
}

impl ShelfRow {
    fn into_entry(self) -> DbResult<ShelfEntry> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DbError::Internal(format!("corrupt shelf id {}: {e}", self.id)))?;

        let pub_date = parse_opt_date(&self.pub_date, "pub_date", &self.id)?;
        let reading_finished_date = parse_opt_date(&self.reading_finished_date, "reading_finished_date", &self.id)?;

        Ok(ShelfEntry {
            id,
            server_id: self.server_id,
            book_id: self.book_id,
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            publisher: self.publisher,
            pub_date,
            description: self.description,
            cover_url: self.cover_url,
            total_pages: self.total_pages,
            main_genre: self.main_genre,
            category: parse_category(&self.category)?,
            expectation: self.expectation,
            last_read_page: self.last_read_page,
            last_read_at: self.last_read_at,
            reading_finished_date,
            purchase_type: parse_purchase_type(&self.purchase_type)?,
            rating: self.rating,
            review: self.review,
            started_reading_at: self.started_reading_at,
            sync_status: parse_sync_status(&self.sync_status)?,
            sync_queue_id: self.sync_queue_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, server_id, book_id, isbn, title, author, publisher, pub_date, \
     description, cover_url, total_pages, main_genre, category, expectation, last_read_page, \
     last_read_at, reading_finished_date, purchase_type, rating, review, started_reading_at, \
     sync_status, sync_queue_id, created_at, updated_at";

/// Repository for shelf entry operations.
#[derive(Debug, Clone)]
pub struct ShelfRepository {
    pool: SqlitePool,
}

impl ShelfRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShelfRepository { pool }
    }

    pub async fn create(&self, entry: &ShelfEntry) -> DbResult<()> {
        sqlx::query(&format!(
            "INSERT INTO offline_books ({SELECT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
              ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
        ))
        .bind(entry.id.to_string())
        .bind(entry.server_id)
        .bind(entry.book_id)
        .bind(&entry.isbn)
        .bind(&entry.title)
        .bind(&entry.author)
        .bind(&entry.publisher)
        .bind(entry.pub_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&entry.description)
        .bind(&entry.cover_url)
        .bind(entry.total_pages)
        .bind(&entry.main_genre)
        .bind(category_str(entry.category))
        .bind(&entry.expectation)
        .bind(entry.last_read_page)
        .bind(entry.last_read_at)
        .bind(entry.reading_finished_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(purchase_type_str(entry.purchase_type))
        .bind(entry.rating)
        .bind(&entry.review)
        .bind(entry.started_reading_at)
        .bind(sync_status_str(entry.sync_status))
        .bind(&entry.sync_queue_id)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_local_id(&self, id: Uuid) -> DbResult<Option<ShelfEntry>> {
        let row = sqlx::query_as::<_, ShelfRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_books WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShelfRow::into_entry).transpose()
    }

    pub async fn get_by_server_id(&self, server_id: i64) -> DbResult<Option<ShelfEntry>> {
        let row = sqlx::query_as::<_, ShelfRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_books WHERE server_id = ?1"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ShelfRow::into_entry).transpose()
    }

    pub async fn list_by_category(&self, category: Category) -> DbResult<Vec<ShelfEntry>> {
        let rows = sqlx::query_as::<_, ShelfRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_books WHERE category = ?1 ORDER BY updated_at DESC"
        ))
        .bind(category_str(category))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ShelfRow::into_entry).collect()
    }

    pub async fn set_category(&self, id: Uuid, category: Category) -> DbResult<()> {
        sqlx::query("UPDATE offline_books SET category = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(category_str(category))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Updates reading progress in one shot: category and the last page
    /// read (the local mirror of `updateBookDetail`'s `readingProgress`).
    pub async fn update_reading_progress(
        &self,
        id: Uuid,
        category: Category,
        last_read_page: Option<i32>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE offline_books SET category = ?2, last_read_page = ?3, last_read_at = ?4, \
             updated_at = ?4 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(category_str(category))
        .bind(last_read_page)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn start_reading(&self, id: Uuid, started_at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "UPDATE offline_books SET category = ?2, started_reading_at = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(category_str(Category::Reading))
        .bind(started_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_sync_status(&self, id: Uuid, status: EntitySyncStatus) -> DbResult<()> {
        sqlx::query("UPDATE offline_books SET sync_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(sync_status_str(status))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_server_id(&self, id: Uuid, server_id: i64) -> DbResult<()> {
        sqlx::query("UPDATE offline_books SET server_id = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(server_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_sync_queue_id(&self, id: Uuid, sync_queue_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE offline_books SET sync_queue_id = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(sync_queue_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_by_local_id(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("DELETE FROM offline_books WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn list_all(&self) -> DbResult<Vec<ShelfEntry>> {
        let rows = sqlx::query_as::<_, ShelfRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_books ORDER BY updated_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ShelfRow::into_entry).collect()
    }

    /// Writes a server-sourced shelf entry into the cache: updates the
    /// existing local row if one is already keyed to `server_id`, else
    /// inserts a fresh one with a new local id. Used by the facade's
    /// server-first read path to keep the offline cache warm.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_from_remote(
        &self,
        server_id: i64,
        title: &str,
        author: &str,
        category: Category,
        purchase_type: PurchaseType,
        last_read_page: Option<i32>,
        started_reading_at: Option<DateTime<Utc>>,
    ) -> DbResult<Uuid> {
        if let Some(existing) = self.get_by_server_id(server_id).await? {
            sqlx::query(
                "UPDATE offline_books SET title = ?2, author = ?3, category = ?4, \
                 purchase_type = ?5, last_read_page = ?6, started_reading_at = ?7, \
                 sync_status = ?8, updated_at = ?9 WHERE id = ?1",
            )
            .bind(existing.id.to_string())
            .bind(title)
            .bind(author)
            .bind(category_str(category))
            .bind(purchase_type_str(purchase_type))
            .bind(last_read_page)
            .bind(started_reading_at)
            .bind(sync_status_str(EntitySyncStatus::Synced))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            return Ok(existing.id);
        }

        let now = Utc::now();
        let entry = ShelfEntry {
            id: Uuid::new_v4(),
            server_id: Some(server_id),
            book_id: None,
            isbn: None,
            title: title.to_string(),
            author: author.to_string(),
            publisher: None,
            pub_date: None,
            description: None,
            cover_url: None,
            total_pages: None,
            main_genre: None,
            category,
            expectation: None,
            last_read_page,
            last_read_at: None,
            reading_finished_date: None,
            purchase_type,
            rating: None,
            review: None,
            started_reading_at,
            sync_status: EntitySyncStatus::Synced,
            sync_queue_id: None,
            created_at: now,
            updated_at: now,
        };
        self.create(&entry).await?;
        Ok(entry.id)
    }
}
