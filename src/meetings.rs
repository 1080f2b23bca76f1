//! Projects and meetings.

use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{format_ts_iso, Meeting, Project, DEFAULT_USER};

pub const MEETING_STATUSES: &[&str] = &["upcoming", "in-progress", "completed"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `YYYY-MM-DD`, or any ISO-8601 date-time.
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub participant_count: Option<i64>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn create_project(pool: &SqlitePool, new: &NewProject) -> Result<Project> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidRequest("project name must not be empty".into()));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO projects (id, name, description, status, created_at, updated_at) VALUES (?, ?, ?, 'active', ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(&new.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(project_id = %id, "created project");
    get_project(pool, &id).await
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> Result<Project> {
    let row = sqlx::query(
        "SELECT id, name, description, status, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("project {}", id)))?;
    Ok(project_from_row(&row))
}

pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query(
        "SELECT id, name, description, status, created_at, updated_at FROM projects ORDER BY created_at DESC, name ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(project_from_row).collect())
}

fn project_from_row(row: &SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        status: row.get("status"),
        created_at: format_ts_iso(row.get("created_at")),
        updated_at: format_ts_iso(row.get("updated_at")),
    }
}

pub async fn create_meeting(pool: &SqlitePool, new: &NewMeeting) -> Result<Meeting> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidRequest("meeting title must not be empty".into()));
    }

    let status = match new.status.as_deref().map(str::trim) {
        None | Some("") => "upcoming",
        Some(s) if MEETING_STATUSES.contains(&s) => s,
        Some(other) => {
            return Err(Error::InvalidRequest(format!(
                "unknown meeting status '{}', expected one of: {}",
                other,
                MEETING_STATUSES.join(", ")
            )))
        }
    };

    if let Some(count) = new.participant_count {
        if count < 0 {
            return Err(Error::InvalidRequest(
                "participantCount must not be negative".into(),
            ));
        }
    }

    if let Some(project_id) = new.project_id.as_deref() {
        get_project(pool, project_id).await?;
    }

    let user_id = new
        .user_id
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEFAULT_USER);

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO meetings (id, title, description, meeting_date, status, participant_count, project_id, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(&new.description)
    .bind(&new.meeting_date)
    .bind(status)
    .bind(new.participant_count)
    .bind(&new.project_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(meeting_id = %id, "created meeting");
    get_meeting(pool, &id).await
}

pub async fn get_meeting(pool: &SqlitePool, id: &str) -> Result<Meeting> {
    let row = sqlx::query(
        r#"
        SELECT id, title, description, meeting_date, status, participant_count, project_id, user_id, created_at, updated_at
        FROM meetings WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("meeting {}", id)))?;
    Ok(meeting_from_row(&row))
}

/// All meetings, most recent meeting date first. Undated meetings sort last.
pub async fn list_meetings(pool: &SqlitePool, project_id: Option<&str>) -> Result<Vec<Meeting>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, description, meeting_date, status, participant_count, project_id, user_id, created_at, updated_at
        FROM meetings
        WHERE (? IS NULL OR project_id = ?)
        ORDER BY meeting_date IS NULL, meeting_date DESC, created_at DESC
        "#,
    )
    .bind(project_id)
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(meeting_from_row).collect())
}

fn meeting_from_row(row: &SqliteRow) -> Meeting {
    Meeting {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        meeting_date: row.get("meeting_date"),
        status: row.get("status"),
        participant_count: row.get("participant_count"),
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        created_at: format_ts_iso(row.get("created_at")),
        updated_at: format_ts_iso(row.get("updated_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;

    #[tokio::test]
    async fn meetings_sort_newest_date_first() {
        let pool = memory_pool().await;
        for (title, date) in [("old", Some("2024-01-05")), ("none", None), ("new", Some("2024-06-01"))] {
            create_meeting(
                &pool,
                &NewMeeting {
                    title: title.into(),
                    meeting_date: date.map(String::from),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let titles: Vec<String> = list_meetings(&pool, None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["new", "old", "none"]);
    }

    #[tokio::test]
    async fn meeting_defaults_and_validation() {
        let pool = memory_pool().await;
        let m = create_meeting(
            &pool,
            &NewMeeting {
                title: "Kickoff".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(m.status, "upcoming");
        assert_eq!(m.user_id, DEFAULT_USER);

        let err = create_meeting(
            &pool,
            &NewMeeting {
                title: "Bad".into(),
                status: Some("cancelled".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = create_meeting(
            &pool,
            &NewMeeting {
                title: "Orphan".into(),
                project_id: Some("missing".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn meetings_filter_by_project() {
        let pool = memory_pool().await;
        let project = create_project(
            &pool,
            &NewProject {
                name: "Apollo".into(),
                description: None,
            },
        )
        .await
        .unwrap();
        create_meeting(
            &pool,
            &NewMeeting {
                title: "in project".into(),
                project_id: Some(project.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        create_meeting(
            &pool,
            &NewMeeting {
                title: "loose".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let scoped = list_meetings(&pool, Some(&project.id)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].title, "in project");
        assert_eq!(list_meetings(&pool, None).await.unwrap().len(), 2);
        assert_eq!(list_projects(&pool).await.unwrap()[0].status, "active");
    }
}
