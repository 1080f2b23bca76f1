//! Row access for documents, chunks, action items and tasks.
//!
//! Action items and tasks share one column layout; [`ItemTable`] picks the
//! table. Listing supports a whitelisted sort column so request input never
//! reaches SQL text.

use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    format_ts_iso, parse_due_date, Chunk, Document, ItemRecord, NewItem, Priority, Status,
    StoredChunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTable {
    ActionItems,
    Tasks,
}

impl ItemTable {
    fn name(&self) -> &'static str {
        match self {
            ItemTable::ActionItems => "action_items",
            ItemTable::Tasks => "tasks",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemTable::ActionItems => "action item",
            ItemTable::Tasks => "task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    ActionItem,
    Category,
    Priority,
    Status,
    DueDate,
    AssignedTo,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    fn order_expr(&self) -> &'static str {
        match self {
            SortKey::ActionItem => "action_item",
            SortKey::Category => "category",
            SortKey::Priority => {
                "CASE priority WHEN 'Critical' THEN 4 WHEN 'High' THEN 3 WHEN 'Medium' THEN 2 WHEN 'Low' THEN 1 ELSE 2 END"
            }
            SortKey::Status => {
                "CASE status WHEN 'Not Started' THEN 1 WHEN 'In Progress' THEN 2 WHEN 'On Hold' THEN 3 WHEN 'Completed' THEN 4 ELSE 1 END"
            }
            SortKey::DueDate => "due_date",
            SortKey::AssignedTo => "assigned_to",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "action_item" | "actionItem" => Ok(SortKey::ActionItem),
            "category" => Ok(SortKey::Category),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            "due_date" | "dueDate" => Ok(SortKey::DueDate),
            "assigned_to" | "assignedTo" => Ok(SortKey::AssignedTo),
            "created_at" | "createdAt" => Ok(SortKey::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortKey::UpdatedAt),
            other => Err(Error::InvalidRequest(format!("unknown sort column: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidRequest(format!(
                "sort direction must be asc or desc, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub direction: Direction,
}

impl Sort {
    pub fn parse(key: Option<&str>, direction: Option<&str>) -> Result<Self> {
        Ok(Self {
            key: key.map(str::parse).transpose()?.unwrap_or_default(),
            direction: direction.map(str::parse).transpose()?.unwrap_or_default(),
        })
    }

    fn clause(&self) -> String {
        let dir = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        // rowid keeps insertion order among equal keys
        format!("{} {}, rowid {}", self.key.order_expr(), dir, dir)
    }
}

const ITEM_COLUMNS: &str = "id, meeting_id, user_id, action_item, category, priority, status, due_date, remarks, additional_info, assigned_to, created_at, updated_at";

pub async fn list_items(
    pool: &SqlitePool,
    table: ItemTable,
    meeting_id: &str,
    sort: Sort,
) -> Result<Vec<ItemRecord>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE meeting_id = ? ORDER BY {}",
        ITEM_COLUMNS,
        table.name(),
        sort.clause()
    );
    let rows = sqlx::query(&sql).bind(meeting_id).fetch_all(pool).await?;
    Ok(rows.iter().map(item_from_row).collect())
}

pub async fn get_item(pool: &SqlitePool, table: ItemTable, id: &str) -> Result<ItemRecord> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", ITEM_COLUMNS, table.name());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", table.label(), id)))?;
    Ok(item_from_row(&row))
}

/// Insert rows on an open connection or transaction. Rows keep the order of
/// `items`.
pub async fn insert_items(
    conn: &mut SqliteConnection,
    table: ItemTable,
    meeting_id: &str,
    user_id: &str,
    items: &[NewItem],
) -> Result<Vec<ItemRecord>> {
    let sql = format!(
        "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table.name(),
        ITEM_COLUMNS
    );
    let now = chrono::Utc::now().timestamp();
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        let id = Uuid::new_v4().to_string();
        sqlx::query(&sql)
            .bind(&id)
            .bind(meeting_id)
            .bind(user_id)
            .bind(&item.action_item)
            .bind(&item.category)
            .bind(item.priority.as_str())
            .bind(item.status.as_str())
            .bind(item.due_date.map(|d| d.to_string()))
            .bind(&item.remarks)
            .bind(&item.additional_info)
            .bind(&item.assigned_to)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        out.push(ItemRecord {
            id,
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
            action_item: item.action_item.clone(),
            category: item.category.clone(),
            priority: item.priority,
            status: item.status,
            due_date: item.due_date,
            remarks: item.remarks.clone(),
            additional_info: item.additional_info.clone(),
            assigned_to: item.assigned_to.clone(),
            created_at: format_ts_iso(now),
            updated_at: format_ts_iso(now),
        });
    }

    Ok(out)
}

/// Manually add one action item to an existing meeting.
pub async fn create_item(
    pool: &SqlitePool,
    table: ItemTable,
    meeting_id: &str,
    user_id: &str,
    item: &NewItem,
) -> Result<ItemRecord> {
    if item.action_item.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "action item description must not be empty".into(),
        ));
    }
    crate::meetings::get_meeting(pool, meeting_id).await?;

    let mut conn = pool.acquire().await?;
    let mut rows = insert_items(&mut *conn, table, meeting_id, user_id, std::slice::from_ref(item)).await?;
    rows.pop()
        .ok_or_else(|| Error::InvalidState("insert returned no row".into()))
}

/// Write every editable field of `record` back to its row and bump `updated_at`.
pub async fn update_item(pool: &SqlitePool, table: ItemTable, record: &ItemRecord) -> Result<ItemRecord> {
    let sql = format!(
        r#"
        UPDATE {} SET action_item = ?, category = ?, priority = ?, status = ?, due_date = ?,
            remarks = ?, additional_info = ?, assigned_to = ?, updated_at = ?
        WHERE id = ?
        "#,
        table.name()
    );
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(&sql)
        .bind(&record.action_item)
        .bind(&record.category)
        .bind(record.priority.as_str())
        .bind(record.status.as_str())
        .bind(record.due_date.map(|d| d.to_string()))
        .bind(&record.remarks)
        .bind(&record.additional_info)
        .bind(&record.assigned_to)
        .bind(now)
        .bind(&record.id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", table.label(), record.id)));
    }
    get_item(pool, table, &record.id).await
}

fn item_from_row(row: &SqliteRow) -> ItemRecord {
    let priority: Option<String> = row.get("priority");
    let status: Option<String> = row.get("status");
    let due_date: Option<String> = row.get("due_date");
    ItemRecord {
        id: row.get("id"),
        meeting_id: row.get("meeting_id"),
        user_id: row.get("user_id"),
        action_item: row.get("action_item"),
        category: row.get("category"),
        priority: Priority::parse_or_default(priority.as_deref()),
        status: Status::parse_or_default(status.as_deref()),
        due_date: parse_due_date(due_date.as_deref()),
        remarks: row.get("remarks"),
        additional_info: row.get("additional_info"),
        assigned_to: row.get("assigned_to"),
        created_at: format_ts_iso(row.get("created_at")),
        updated_at: format_ts_iso(row.get("updated_at")),
    }
}

/// Partial update for an item. Absent fields are left alone; an empty string
/// clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, alias = "action_item")]
    pub action_item: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default, alias = "additional_info")]
    pub additional_info: Option<String>,
    #[serde(default, alias = "assigned_to")]
    pub assigned_to: Option<String>,
}

impl ItemPatch {
    /// Apply the patch. Invalid input fails before any field is changed.
    pub fn apply(&self, record: &mut ItemRecord) -> Result<()> {
        if let Some(text) = &self.action_item {
            if text.trim().is_empty() {
                return Err(Error::InvalidRequest(
                    "action item description must not be empty".into(),
                ));
            }
        }
        let due_date = match self.due_date.as_deref().map(str::trim) {
            None => record.due_date,
            Some("") => None,
            Some(raw) => Some(parse_due_date(Some(raw)).ok_or_else(|| {
                Error::InvalidRequest(format!("dueDate must be YYYY-MM-DD, got {}", raw))
            })?),
        };

        if let Some(text) = &self.action_item {
            record.action_item = text.trim().to_string();
        }
        if let Some(p) = self.priority {
            record.priority = p;
        }
        if let Some(s) = self.status {
            record.status = s;
        }
        record.due_date = due_date;
        set_optional(&mut record.category, &self.category);
        set_optional(&mut record.remarks, &self.remarks);
        set_optional(&mut record.additional_info, &self.additional_info);
        set_optional(&mut record.assigned_to, &self.assigned_to);
        Ok(())
    }
}

/// Input for a manually entered item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    #[serde(alias = "action_item")]
    pub action_item: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default, alias = "additional_info")]
    pub additional_info: Option<String>,
    #[serde(default, alias = "assigned_to")]
    pub assigned_to: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
}

impl ItemDraft {
    pub fn to_new_item(&self) -> Result<NewItem> {
        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_due_date(Some(raw)).ok_or_else(|| {
                Error::InvalidRequest(format!("dueDate must be YYYY-MM-DD, got {}", raw))
            })?),
        };
        Ok(NewItem {
            action_item: self.action_item.trim().to_string(),
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            due_date,
            remarks: self.remarks.clone().filter(|c| !c.trim().is_empty()),
            additional_info: self.additional_info.clone().filter(|c| !c.trim().is_empty()),
            assigned_to: self.assigned_to.clone().filter(|c| !c.trim().is_empty()),
        })
    }
}

fn set_optional(field: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *field = if v.trim().is_empty() { None } else { Some(v.clone()) };
    }
}

// ============ Documents ============

pub struct NewDocument<'a> {
    pub meeting_id: &'a str,
    pub user_id: &'a str,
    pub name: &'a str,
    pub media_type: &'a str,
    pub size_bytes: i64,
    pub storage_path: &'a str,
    pub sha256: &'a str,
}

pub async fn insert_document(pool: &SqlitePool, new: &NewDocument<'_>) -> Result<Document> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO documents (id, meeting_id, user_id, name, media_type, size_bytes, storage_path, sha256, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.meeting_id)
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.media_type)
    .bind(new.size_bytes)
    .bind(new.storage_path)
    .bind(new.sha256)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Document {
        id,
        meeting_id: new.meeting_id.to_string(),
        user_id: new.user_id.to_string(),
        name: new.name.to_string(),
        media_type: new.media_type.to_string(),
        size_bytes: new.size_bytes,
        storage_path: new.storage_path.to_string(),
        sha256: new.sha256.to_string(),
        created_at: format_ts_iso(now),
    })
}

pub async fn list_documents(pool: &SqlitePool, meeting_id: &str) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        r#"
        SELECT id, meeting_id, user_id, name, media_type, size_bytes, storage_path, sha256, created_at
        FROM documents WHERE meeting_id = ? ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Document {
            id: row.get("id"),
            meeting_id: row.get("meeting_id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            media_type: row.get("media_type"),
            size_bytes: row.get("size_bytes"),
            storage_path: row.get("storage_path"),
            sha256: row.get("sha256"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}

// ============ Chunks ============

/// Store one chunk. `document_id` links it to an uploaded document; a second
/// chunk with the same position in the same document is rejected.
pub async fn insert_chunk(
    pool: &SqlitePool,
    meeting_id: &str,
    user_id: &str,
    chunk: &Chunk,
    document_id: Option<&str>,
    file_path: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO data_chunks (id, meeting_id, user_id, document_id, source_document, chunk_index, text, file_path, hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&chunk.id)
    .bind(meeting_id)
    .bind(user_id)
    .bind(document_id)
    .bind(&chunk.source_document)
    .bind(chunk.chunk_index)
    .bind(&chunk.text)
    .bind(file_path)
    .bind(&chunk.hash)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Chunks of a meeting, grouped by source document (uploads of the same name
/// oldest first) in index order.
pub async fn list_chunks(pool: &SqlitePool, meeting_id: &str) -> Result<Vec<StoredChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.meeting_id, c.document_id, c.source_document, c.chunk_index, c.text, c.file_path, c.created_at
        FROM data_chunks c
        LEFT JOIN documents d ON d.id = c.document_id
        WHERE c.meeting_id = ?
        ORDER BY c.source_document ASC, d.created_at ASC, d.rowid ASC, c.chunk_index ASC
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| StoredChunk {
            id: row.get("id"),
            meeting_id: row.get("meeting_id"),
            document_id: row.get("document_id"),
            source_document: row.get("source_document"),
            chunk_index: row.get("chunk_index"),
            text: row.get("text"),
            file_path: row.get("file_path"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}
