//! Merge a meeting's action items into consolidated tasks.
//!
//! One model call per request. A failed call or an unusable reply fails the
//! whole operation before anything is written; the tasks themselves are
//! inserted in a single transaction.

use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::events::Notification;
use crate::ingest::items_from_values;
use crate::llm::{ChatMessage, ChatRequest};
use crate::meetings::get_meeting;
use crate::model_output::parse_json_array;
use crate::models::{ItemRecord, Status};
use crate::records::{insert_items, list_items, ItemTable, Sort};

pub const SUMMARIZE_SYSTEM_PROMPT: &str = "You are a helpful assistant that consolidates and merges similar action items into comprehensive tasks. Always respond with valid JSON.";

pub const SUMMARIZED_MESSAGE: &str = "Action items successfully summarized and merged";
pub const NO_ITEMS_MESSAGE: &str = "No action items found for this meeting";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub message: String,
    pub tasks_created: usize,
    pub tasks: Vec<ItemRecord>,
}

fn action_item_line(item: &ItemRecord) -> String {
    format!(
        "- {} (Priority: {}, Assigned: {}, Category: {})",
        item.action_item,
        item.priority,
        item.assigned_to.as_deref().unwrap_or("Unassigned"),
        item.category.as_deref().unwrap_or("General")
    )
}

fn summarize_prompt(items: &[ItemRecord]) -> String {
    let lines: Vec<String> = items.iter().map(action_item_line).collect();
    format!(
        r#"You are an AI assistant that helps merge and consolidate duplicate or similar action items into comprehensive tasks.

Please analyze the following action items and merge similar or duplicate ones into consolidated tasks. For each consolidated task, provide:
1. A clear, comprehensive action description
2. Priority level (Critical, High, Medium, Low)
3. Category
4. Assigned person(s)
5. Any relevant remarks or additional information

Action Items to process:
{}

Please respond with a JSON array of consolidated tasks in this format:
[
  {{
    "action_item": "Consolidated task description",
    "priority": "High",
    "category": "Task",
    "assigned_to": "Person Name",
    "remarks": "Consolidated from multiple similar action items",
    "additional_info": "Any additional context"
  }}
]

Rules:
- Merge similar or duplicate action items
- Keep distinct tasks separate
- Maintain all important information
- If an action item is unique, keep it as is
- Provide clear, actionable descriptions"#,
        lines.join("\n")
    )
}

pub async fn summarize(ctx: &AppContext, request: &SummarizeRequest) -> Result<SummarizeResponse> {
    let result = summarize_inner(ctx, request).await;
    match &result {
        Ok(resp) if resp.tasks_created > 0 => ctx.events.notify(Notification::success(
            "Tasks created",
            format!("{} consolidated tasks created", resp.tasks_created),
        )),
        Ok(resp) => ctx
            .events
            .notify(Notification::info("Nothing to summarize", resp.message.clone())),
        Err(e) => ctx
            .events
            .notify(Notification::error("Summarization failed", e.to_string())),
    }
    result
}

async fn summarize_inner(ctx: &AppContext, request: &SummarizeRequest) -> Result<SummarizeResponse> {
    let meeting_id = request.meeting_id.trim();
    if meeting_id.is_empty() {
        return Err(Error::InvalidRequest("Meeting ID is required".into()));
    }
    get_meeting(&ctx.pool, meeting_id).await?;

    let items = list_items(&ctx.pool, ItemTable::ActionItems, meeting_id, Sort::default()).await?;
    if items.is_empty() {
        return Ok(SummarizeResponse {
            message: NO_ITEMS_MESSAGE.to_string(),
            tasks_created: 0,
            tasks: Vec::new(),
        });
    }
    tracing::info!(meeting_id, "found {} action items to process", items.len());

    let chat = ChatRequest {
        messages: vec![
            ChatMessage::system(SUMMARIZE_SYSTEM_PROMPT),
            ChatMessage::user(summarize_prompt(&items)),
        ],
        max_tokens: ctx.config.llm.max_tokens,
        temperature: ctx.config.llm.extraction_temperature,
    };
    let content = ctx
        .llm
        .complete(&chat)
        .await?
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::MalformedModelOutput("empty response".into()))?;

    let mut tasks = items_from_values(parse_json_array(&content)?);
    for task in &mut tasks {
        task.status = Status::NotStarted;
        if task.category.is_none() {
            task.category = Some("Task".to_string());
        }
    }

    let owner = request
        .user_id
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(items[0].user_id.as_str())
        .to_string();

    let mut tx = ctx.pool.begin().await?;
    let saved = insert_items(&mut *tx, ItemTable::Tasks, meeting_id, &owner, &tasks).await?;
    tx.commit().await?;

    tracing::info!(meeting_id, "created {} consolidated tasks", saved.len());
    Ok(SummarizeResponse {
        message: SUMMARIZED_MESSAGE.to_string(),
        tasks_created: saved.len(),
        tasks: saved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn record(text: &str, assigned: Option<&str>, category: Option<&str>) -> ItemRecord {
        ItemRecord {
            id: "i".into(),
            meeting_id: "m".into(),
            user_id: "u".into(),
            action_item: text.into(),
            category: category.map(String::from),
            priority: Priority::High,
            status: Status::NotStarted,
            due_date: None,
            remarks: None,
            additional_info: None,
            assigned_to: assigned.map(String::from),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn prompt_lines_fill_defaults() {
        assert_eq!(
            action_item_line(&record("Send deck", None, None)),
            "- Send deck (Priority: High, Assigned: Unassigned, Category: General)"
        );
        assert_eq!(
            action_item_line(&record("Call vendor", Some("Lee"), Some("Follow-up"))),
            "- Call vendor (Priority: High, Assigned: Lee, Category: Follow-up)"
        );
    }

    #[test]
    fn prompt_embeds_every_item() {
        let prompt = summarize_prompt(&[record("A", None, None), record("B", None, None)]);
        assert!(prompt.contains("- A (Priority"));
        assert!(prompt.contains("- B (Priority"));
        assert!(prompt.contains("\"action_item\": \"Consolidated task description\""));
    }
}
