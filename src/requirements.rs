//! Versioned business-requirements documents (BRDs).
//!
//! Each meeting has an insert-only history of BRD versions numbered from 1.
//! A new version is written either by hand ([`save`]) or by asking the model
//! to rewrite the latest document in light of the meeting's action items
//! ([`regenerate`]). Both append `latest + 1` in one statement, so two writers
//! cannot claim the same number.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::events::Notification;
use crate::llm::{ChatMessage, ChatRequest};
use crate::meetings::get_meeting;
use crate::models::{format_ts_iso, BusinessRequirement, ItemRecord, VersionSummary};
use crate::records::{list_items, Direction, ItemTable, Sort, SortKey};

pub const REQUIREMENTS_SYSTEM_PROMPT: &str = r#"You are a business analyst expert. Your task is to generate comprehensive business requirements based on action items from meetings and existing business requirements.

Generate a complete Business Requirements Document that includes:
1. Updated project overview based on action items
2. Refined business objectives and success metrics
3. Enhanced functional and non-functional requirements
4. Updated scope and boundaries
5. Risk assessment updates
6. Implementation timeline adjustments
7. All other standard BRD sections

Make sure to:
- Incorporate insights from the action items into relevant sections
- Maintain professional BRD formatting
- Include specific, measurable requirements
- Update dates and version numbers appropriately
- Ensure consistency between action items and requirements"#;

/// Starting document sent to the model when a meeting has no BRD yet.
pub fn seed_template(date: NaiveDate) -> String {
    format!(
        r#"# Business Requirements Document

## 1. Project Overview
**Project Name:** [Project Name]
**Date:** {}
**Stakeholders:** [List key stakeholders]
**Document Version:** 1.0

## 2. Executive Summary
Provide a high-level overview of the project, its objectives, and expected outcomes.

## 3. Business Objectives
### Primary Objectives:
- Please define based on action items and meeting context

### Success Metrics:
- To be defined based on project requirements

## 4. Functional Requirements
### Core Features
- Requirements to be derived from action items and meeting discussions

Please update this template with relevant information based on the action items."#,
        date.format("%Y-%m-%d")
    )
}

/// Full blank BRD shown for a meeting that has no saved version.
pub fn default_template(date: NaiveDate) -> String {
    format!(
        r#"# Business Requirements Document

## 1. Project Overview
**Project Name:** [Project Name]
**Date:** {}
**Stakeholders:** [List key stakeholders]
**Document Version:** 1.0

## 2. Executive Summary
Provide a high-level overview of the project, its objectives, and expected outcomes.

## 3. Business Objectives
### Primary Objectives:
- Objective 1: [Describe primary business goal]
- Objective 2: [Describe secondary business goal]
- Objective 3: [Describe tertiary business goal]

### Success Metrics:
- KPI 1: [Define measurable success criteria]
- KPI 2: [Define measurable success criteria]
- KPI 3: [Define measurable success criteria]

## 4. Scope and Boundaries

### In Scope:
- Feature/Function 1
- Feature/Function 2
- Feature/Function 3

### Out of Scope:
- Items explicitly excluded from this project
- Future enhancements to be considered separately

## 5. Functional Requirements

### 5.1 Core Features
**FR-001:** [Feature Name]
- Description: [Detailed description]
- Priority: High/Medium/Low
- Acceptance Criteria: [Clear criteria for completion]

**FR-002:** [Feature Name]
- Description: [Detailed description]
- Priority: High/Medium/Low
- Acceptance Criteria: [Clear criteria for completion]

### 5.2 User Stories
- As a [user type], I want [goal] so that [benefit]
- As a [user type], I want [goal] so that [benefit]
- As a [user type], I want [goal] so that [benefit]

## 6. Non-Functional Requirements

### 6.1 Performance Requirements
- Response time: [Specify requirements]
- Throughput: [Specify requirements]
- Scalability: [Specify requirements]

### 6.2 Security Requirements
- Authentication: [Specify requirements]
- Authorization: [Specify requirements]
- Data Protection: [Specify requirements]

### 6.3 Usability Requirements
- User Interface: [Specify requirements]
- Accessibility: [Specify requirements]
- User Experience: [Specify requirements]

## 7. Business Rules and Constraints

### Business Rules:
1. Rule 1: [Describe business rule]
2. Rule 2: [Describe business rule]
3. Rule 3: [Describe business rule]

### Constraints:
- Budget: [Specify budget constraints]
- Timeline: [Specify timeline constraints]
- Resources: [Specify resource constraints]
- Technology: [Specify technology constraints]

## 8. Assumptions and Dependencies

### Assumptions:
- Assumption 1: [Describe assumption]
- Assumption 2: [Describe assumption]

### Dependencies:
- Dependency 1: [External dependency]
- Dependency 2: [Internal dependency]

## 9. Risk Assessment

| Risk | Impact | Probability | Mitigation Strategy |
|------|--------|-------------|-------------------|
| Risk 1 | High/Medium/Low | High/Medium/Low | [Strategy] |
| Risk 2 | High/Medium/Low | High/Medium/Low | [Strategy] |
| Risk 3 | High/Medium/Low | High/Medium/Low | [Strategy] |

## 10. Implementation Timeline

### Phase 1: Planning & Design
- Duration: [Timeframe]
- Key Activities: [List activities]
- Deliverables: [List deliverables]

### Phase 2: Development
- Duration: [Timeframe]
- Key Activities: [List activities]
- Deliverables: [List deliverables]

### Phase 3: Testing & Deployment
- Duration: [Timeframe]
- Key Activities: [List activities]
- Deliverables: [List deliverables]

## 11. Acceptance Criteria
- [ ] All functional requirements implemented
- [ ] All non-functional requirements met
- [ ] User acceptance testing completed
- [ ] Documentation completed
- [ ] Training completed

## 12. Sign-off
**Business Analyst:** _____________________ Date: _______
**Project Manager:** _____________________ Date: _______
**Stakeholder:** _____________________ Date: _______

---
*This document serves as the foundation for project planning and development activities.*"#,
        date.format("%Y-%m-%d")
    )
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn requirements_user_prompt(current: &str, items: &[ItemRecord]) -> String {
    let listed: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. {}\n   - Priority: {}\n   - Status: {}\n   - Category: {}\n   - Assigned To: {}\n   - Due Date: {}\n   - Remarks: {}\n   - Additional Info: {}",
                i + 1,
                item.action_item,
                item.priority,
                item.status,
                item.category.as_deref().unwrap_or("General"),
                item.assigned_to.as_deref().unwrap_or("Unassigned"),
                item.due_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "Not set".to_string()),
                item.remarks.as_deref().unwrap_or(""),
                item.additional_info.as_deref().unwrap_or("")
            )
        })
        .collect();

    format!(
        r#"Current Business Requirements:
{}

Action Items from Meeting:
{}

Please generate an updated Business Requirements Document that incorporates these action items into a comprehensive BRD structure. Make sure to:
1. Update the project overview based on the action items context
2. Derive functional requirements from the action items
3. Set appropriate priorities based on action item priorities
4. Include timeline considerations based on due dates
5. Incorporate assigned responsibilities into the requirements
6. Update risk assessments based on action item categories and remarks
7. Ensure all action items are properly reflected in the relevant BRD sections"#,
        current,
        listed.join("\n\n")
    )
}

const BRD_COLUMNS: &str = "id, meeting_id, content, version, created_at";

fn brd_from_row(row: &SqliteRow) -> BusinessRequirement {
    BusinessRequirement {
        id: row.get("id"),
        meeting_id: row.get("meeting_id"),
        content: row.get("content"),
        version: row.get("version"),
        created_at: format_ts_iso(row.get("created_at")),
    }
}

pub async fn latest(pool: &SqlitePool, meeting_id: &str) -> Result<Option<BusinessRequirement>> {
    let sql = format!(
        "SELECT {} FROM business_requirements WHERE meeting_id = ? ORDER BY version DESC LIMIT 1",
        BRD_COLUMNS
    );
    let row = sqlx::query(&sql).bind(meeting_id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(brd_from_row))
}

pub async fn get_version(pool: &SqlitePool, meeting_id: &str, version: i64) -> Result<BusinessRequirement> {
    let sql = format!(
        "SELECT {} FROM business_requirements WHERE meeting_id = ? AND version = ?",
        BRD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(meeting_id)
        .bind(version)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "business requirements version {} for meeting {}",
                version, meeting_id
            ))
        })?;
    Ok(brd_from_row(&row))
}

/// Version history, newest first.
pub async fn list_versions(pool: &SqlitePool, meeting_id: &str) -> Result<Vec<VersionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, version, created_at, LENGTH(content) AS length
        FROM business_requirements WHERE meeting_id = ?
        ORDER BY version DESC
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| VersionSummary {
            id: row.get("id"),
            version: row.get("version"),
            created_at: format_ts_iso(row.get("created_at")),
            length: row.get("length"),
        })
        .collect())
}

async fn append_version(pool: &SqlitePool, meeting_id: &str, content: &str) -> Result<BusinessRequirement> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;
    let version: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO business_requirements (id, meeting_id, content, version, created_at)
        SELECT ?, ?, ?, COALESCE(MAX(version), 0) + 1, ?
        FROM business_requirements WHERE meeting_id = ?
        RETURNING version
        "#,
    )
    .bind(&id)
    .bind(meeting_id)
    .bind(content)
    .bind(now)
    .bind(meeting_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(BusinessRequirement {
        id,
        meeting_id: meeting_id.to_string(),
        content: content.to_string(),
        version,
        created_at: format_ts_iso(now),
    })
}

/// Store `content` as the next version for the meeting.
pub async fn save(ctx: &AppContext, meeting_id: &str, content: &str) -> Result<BusinessRequirement> {
    let result = save_inner(&ctx.pool, meeting_id, content).await;

    match &result {
        Ok(brd) => ctx.events.notify(Notification::success(
            "Business requirements saved",
            format!("Saved as version {}", brd.version),
        )),
        Err(e) => ctx
            .events
            .notify(Notification::error("Failed to save business requirements", e.to_string())),
    }
    result
}

async fn save_inner(pool: &SqlitePool, meeting_id: &str, content: &str) -> Result<BusinessRequirement> {
    if content.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "business requirements content must not be empty".into(),
        ));
    }
    get_meeting(pool, meeting_id).await?;
    append_version(pool, meeting_id, content).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateResponse {
    pub success: bool,
    pub content: String,
    pub version: i64,
    pub id: String,
}

/// Ask the model for a full replacement BRD and store it as the next version.
///
/// Fails with [`Error::NoActionItems`] when the meeting has no action items;
/// nothing is written in that case or on any model failure.
pub async fn regenerate(ctx: &AppContext, meeting_id: &str) -> Result<RegenerateResponse> {
    let result = regenerate_inner(ctx, meeting_id).await;
    match &result {
        Ok(resp) => ctx.events.notify(Notification::success(
            "Business requirements updated",
            format!("Generated version {}", resp.version),
        )),
        Err(e) => ctx.events.notify(Notification::error(
            "Failed to update business requirements",
            e.to_string(),
        )),
    }
    result
}

async fn regenerate_inner(ctx: &AppContext, meeting_id: &str) -> Result<RegenerateResponse> {
    let meeting_id = meeting_id.trim();
    if meeting_id.is_empty() {
        return Err(Error::InvalidRequest("meetingId is required".into()));
    }
    get_meeting(&ctx.pool, meeting_id).await?;

    let newest_first = Sort {
        key: SortKey::CreatedAt,
        direction: Direction::Desc,
    };
    let items = list_items(&ctx.pool, ItemTable::ActionItems, meeting_id, newest_first).await?;
    if items.is_empty() {
        return Err(Error::NoActionItems);
    }

    let current = latest(&ctx.pool, meeting_id).await?;
    match &current {
        Some(brd) => tracing::info!(meeting_id, "using business requirements version {}", brd.version),
        None => tracing::info!(meeting_id, "no business requirements yet, starting from template"),
    }
    let current_content = current
        .map(|brd| brd.content)
        .unwrap_or_else(|| seed_template(today()));

    let chat = ChatRequest {
        messages: vec![
            ChatMessage::system(REQUIREMENTS_SYSTEM_PROMPT),
            ChatMessage::user(requirements_user_prompt(&current_content, &items)),
        ],
        max_tokens: ctx.config.llm.max_tokens,
        temperature: ctx.config.llm.requirements_temperature,
    };
    let content = ctx
        .llm
        .complete(&chat)
        .await?
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::MalformedModelOutput("empty response".into()))?;

    let saved = append_version(&ctx.pool, meeting_id, &content).await?;
    tracing::info!(meeting_id, "business requirements updated to version {}", saved.version);

    Ok(RegenerateResponse {
        success: true,
        content: saved.content,
        version: saved.version,
        id: saved.id,
    })
}

/// What a reader should see for a meeting: the latest version, or the blank
/// template with `version: 0` when none exists or the read fails.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRequirements {
    pub id: Option<String>,
    pub content: String,
    pub version: i64,
    pub is_template: bool,
}

pub async fn current_or_template(pool: &SqlitePool, meeting_id: &str) -> CurrentRequirements {
    match latest(pool, meeting_id).await {
        Ok(Some(brd)) => CurrentRequirements {
            id: Some(brd.id),
            content: brd.content,
            version: brd.version,
            is_template: false,
        },
        Ok(None) => template_view(),
        Err(e) => {
            tracing::warn!(meeting_id, "failed to load business requirements: {}", e);
            template_view()
        }
    }
}

fn template_view() -> CurrentRequirements {
    CurrentRequirements {
        id: None,
        content: default_template(today()),
        version: 0,
        is_template: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;
    use crate::meetings::{create_meeting, NewMeeting};

    #[tokio::test]
    async fn versions_count_up_from_one() {
        let pool = memory_pool().await;
        let m = create_meeting(
            &pool,
            &NewMeeting {
                title: "Planning".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(latest(&pool, &m.id).await.unwrap().is_none());
        let v1 = append_version(&pool, &m.id, "first").await.unwrap();
        let v2 = append_version(&pool, &m.id, "second draft").await.unwrap();
        assert_eq!((v1.version, v2.version), (1, 2));

        assert_eq!(get_version(&pool, &m.id, 1).await.unwrap().content, "first");
        assert_eq!(latest(&pool, &m.id).await.unwrap().unwrap().version, 2);

        let history = list_versions(&pool, &m.id).await.unwrap();
        assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(history[0].length, "second draft".len() as i64);

        assert!(matches!(get_version(&pool, &m.id, 9).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_history_shows_template() {
        let pool = memory_pool().await;
        let view = current_or_template(&pool, "no-such-meeting").await;
        assert_eq!(view.version, 0);
        assert!(view.is_template);
        assert!(view.content.contains("## 12. Sign-off"));
    }

    #[test]
    fn prompt_lists_items_with_defaults() {
        let item = ItemRecord {
            id: "1".into(),
            meeting_id: "m".into(),
            user_id: "u".into(),
            action_item: "Define KPIs".into(),
            category: None,
            priority: crate::models::Priority::High,
            status: crate::models::Status::InProgress,
            due_date: None,
            remarks: None,
            additional_info: None,
            assigned_to: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let prompt = requirements_user_prompt("# BRD", &[item]);
        assert!(prompt.starts_with("Current Business Requirements:\n# BRD"));
        assert!(prompt.contains("1. Define KPIs\n   - Priority: High\n   - Status: In Progress"));
        assert!(prompt.contains("   - Assigned To: Unassigned"));
        assert!(prompt.contains("   - Due Date: Not set"));
    }
}
