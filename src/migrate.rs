//! Idempotent schema setup. Every statement is `IF NOT EXISTS`, so running
//! `mact init` (or starting the server) against an existing database is safe.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meetings (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        meeting_date TEXT,
        status TEXT NOT NULL DEFAULT 'upcoming',
        participant_count INTEGER,
        project_id TEXT REFERENCES projects(id),
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        meeting_id TEXT NOT NULL REFERENCES meetings(id),
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        media_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        storage_path TEXT NOT NULL,
        sha256 TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS data_chunks (
        id TEXT PRIMARY KEY,
        meeting_id TEXT NOT NULL REFERENCES meetings(id),
        user_id TEXT NOT NULL,
        document_id TEXT REFERENCES documents(id),
        source_document TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        file_path TEXT,
        hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS action_items (
        id TEXT PRIMARY KEY,
        meeting_id TEXT NOT NULL REFERENCES meetings(id),
        user_id TEXT NOT NULL,
        action_item TEXT NOT NULL,
        category TEXT,
        priority TEXT,
        status TEXT,
        due_date TEXT,
        remarks TEXT,
        additional_info TEXT,
        assigned_to TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        meeting_id TEXT NOT NULL REFERENCES meetings(id),
        user_id TEXT NOT NULL,
        action_item TEXT NOT NULL,
        category TEXT,
        priority TEXT,
        status TEXT,
        due_date TEXT,
        remarks TEXT,
        additional_info TEXT,
        assigned_to TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS business_requirements (
        id TEXT PRIMARY KEY,
        meeting_id TEXT NOT NULL REFERENCES meetings(id),
        content TEXT NOT NULL,
        version INTEGER NOT NULL CHECK (version >= 1),
        created_at INTEGER NOT NULL,
        UNIQUE(meeting_id, version)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_meetings_date ON meetings(meeting_date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_data_chunks_meeting ON data_chunks(meeting_id, source_document, chunk_index)",
    // One index per document: uploads are keyed by their document row, bare
    // ingestion requests by source name.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_data_chunks_position ON data_chunks(meeting_id, COALESCE(document_id, ''), source_document, chunk_index)",
    "CREATE INDEX IF NOT EXISTS idx_documents_meeting ON documents(meeting_id)",
    "CREATE INDEX IF NOT EXISTS idx_action_items_meeting ON action_items(meeting_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_meeting ON tasks(meeting_id)",
];

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
