//! Core data models: projects, meetings, documents, chunks, action items,
//! tasks and business-requirement versions.
//!
//! Records serialize with camelCase keys for the HTTP API. Timestamps are
//! stored as unix seconds and rendered as ISO-8601 strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Owner recorded when a request does not name a user.
pub const DEFAULT_USER: &str = "demo-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }

    /// Lenient parse for model output and stored rows; unknown values fall back to `Medium`.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    #[serde(rename = "Not Started", alias = "To Do")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::OnHold => "On Hold",
        }
    }

    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not started" | "to do" | "todo" => Ok(Status::NotStarted),
            "in progress" => Ok(Status::InProgress),
            "completed" | "done" => Ok(Status::Completed),
            "on hold" => Ok(Status::OnHold),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub meeting_date: Option<String>,
    pub status: String,
    pub participant_count: Option<i64>,
    pub project_id: Option<String>,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Uploaded file. Immutable once stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub meeting_id: String,
    pub user_id: String,
    pub name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub sha256: String,
    pub created_at: String,
}

/// A contiguous span of one document's extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub source_document: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A stored chunk row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChunk {
    pub id: String,
    pub meeting_id: String,
    pub document_id: Option<String>,
    pub source_document: String,
    pub chunk_index: i64,
    pub text: String,
    pub file_path: Option<String>,
    pub created_at: String,
}

/// An action item or a consolidated task; both tables share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,
    pub meeting_id: String,
    pub user_id: String,
    pub action_item: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub additional_info: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Field values for inserting a new item row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub action_item: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub additional_info: Option<String>,
    pub assigned_to: Option<String>,
}

/// One stored version of a meeting's business-requirements document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRequirement {
    pub id: String,
    pub meeting_id: String,
    pub content: String,
    pub version: i64,
    pub created_at: String,
}

/// Version history entry without the document body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: String,
    pub version: i64,
    pub created_at: String,
    pub length: i64,
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Parse a `YYYY-MM-DD` date; anything else is treated as absent.
pub fn parse_due_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}
