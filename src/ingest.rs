//! Action-item extraction.
//!
//! [`process_document`] takes pre-chunked text for a meeting, stores each
//! chunk, asks the model for the action items in it and persists everything
//! that parsed. Chunks are handled one at a time. A chunk whose model call or
//! parse fails contributes nothing; the rest of the request continues.
//!
//! [`upload_document`] is the full path from raw file bytes: store the object,
//! record the document, extract text, chunk it and run [`process_document`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::chunk::{chunk_text, text_hash};
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::events::Notification;
use crate::extract::{extract_text, FileKind};
use crate::llm::{ChatMessage, ChatRequest};
use crate::meetings::get_meeting;
use crate::model_output::{parse_model_json, preview};
use crate::models::{parse_due_date, Chunk, Document, ItemRecord, NewItem, Priority, Status, DEFAULT_USER};
use crate::records::{self, insert_items, ItemTable, NewDocument};
use crate::storage::object_key;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an AI assistant that extracts action items from meeting transcripts.

For each action item you identify, provide a JSON object with these fields:
- actionItem: Clear, specific description of the task
- category: One of "Task", "Follow-up", "Decision", "Research", "Review"
- priority: One of "Low", "Medium", "High", "Critical"
- status: Always "Not Started"
- dueDate: If mentioned, format as YYYY-MM-DD, otherwise null
- remarks: Any additional context or notes
- additionalInfo: Supporting details if any
- assignedTo: Person responsible if mentioned, otherwise null

Return ONLY a valid JSON array of action items. If no action items are found, return an empty array [].
Do not include any text before or after the JSON array."#;

fn extraction_user_prompt(text: &str) -> String {
    format!(
        "Extract action items from this meeting transcript chunk:\n\n{}",
        text
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub chunks: Vec<ChunkInput>,
    pub meeting_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInput {
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "source_document")]
    pub source_document: Option<String>,
    #[serde(default, alias = "chunk_index")]
    pub chunk_index: Option<i64>,
    #[serde(default, alias = "file_path")]
    pub file_path: Option<String>,
    /// Uploaded document the chunk was cut from, if any.
    #[serde(default, alias = "document_id")]
    pub document_id: Option<String>,
}

impl ChunkInput {
    pub fn from_chunk(chunk: &Chunk, document_id: Option<&str>, file_path: Option<&str>) -> Self {
        Self {
            text: chunk.text.clone(),
            source_document: Some(chunk.source_document.clone()),
            chunk_index: Some(chunk.chunk_index),
            file_path: file_path.map(String::from),
            document_id: document_id.map(String::from),
        }
    }

    fn source(&self) -> &str {
        self.source_document.as_deref().unwrap_or("unknown")
    }
}

/// Reject a request that names the same chunk position twice within one
/// document. A chunk without an explicit index takes its position in the list.
fn check_chunk_positions(chunks: &[ChunkInput]) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, input) in chunks.iter().enumerate() {
        let index = input.chunk_index.unwrap_or(i as i64);
        let document = input.document_id.as_deref().unwrap_or_default();
        if !seen.insert((document, input.source(), index)) {
            return Err(Error::InvalidRequest(format!(
                "duplicate chunkIndex {} for {}",
                index,
                input.source()
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub chunks_processed: usize,
    pub action_items_generated: usize,
    pub action_items: Vec<ItemRecord>,
}

/// One element of the model's reply. Accepts camelCase and snake_case keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedActionItem {
    #[serde(default, alias = "action_item")]
    pub action_item: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default, alias = "additional_info")]
    pub additional_info: Option<String>,
    #[serde(default, alias = "assigned_to")]
    pub assigned_to: Option<String>,
}

impl ExtractedActionItem {
    /// Convert to insertable values. Items without a description yield `None`.
    pub fn into_new_item(self) -> Option<NewItem> {
        let action_item = non_blank(self.action_item)?;
        Some(NewItem {
            action_item,
            category: non_blank(self.category),
            priority: Priority::parse_or_default(self.priority.as_deref()),
            status: Status::parse_or_default(self.status.as_deref()),
            due_date: parse_due_date(self.due_date.as_deref()),
            remarks: non_blank(self.remarks),
            additional_info: non_blank(self.additional_info),
            assigned_to: non_blank(self.assigned_to),
        })
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "null")
}

/// Decode a model array into items, skipping elements that are not objects
/// or carry no description.
pub(crate) fn items_from_values(values: Vec<Value>) -> Vec<NewItem> {
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<ExtractedActionItem>(v) {
            Ok(item) => item.into_new_item(),
            Err(e) => {
                tracing::debug!("skipping malformed action item: {}", e);
                None
            }
        })
        .collect()
}

pub async fn process_document(ctx: &AppContext, request: &IngestRequest) -> Result<IngestResponse> {
    let meeting_id = request.meeting_id.trim();
    if meeting_id.is_empty() {
        return Err(Error::InvalidRequest("meetingId is required".into()));
    }
    get_meeting(&ctx.pool, meeting_id).await?;
    check_chunk_positions(&request.chunks)?;

    let user_id = request
        .user_id
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEFAULT_USER);

    tracing::info!(
        meeting_id,
        chunks = request.chunks.len(),
        "processing transcript chunks"
    );

    let mut extracted: Vec<NewItem> = Vec::new();
    let total = request.chunks.len();

    for (i, input) in request.chunks.iter().enumerate() {
        if input.text.trim().is_empty() {
            tracing::debug!(chunk = i, "skipping blank chunk");
            continue;
        }

        let source = input.source();
        let chunk = Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            source_document: source.to_string(),
            chunk_index: input.chunk_index.unwrap_or(i as i64),
            text: input.text.clone(),
            hash: text_hash(&input.text),
        };
        if let Err(e) = records::insert_chunk(
            &ctx.pool,
            meeting_id,
            user_id,
            &chunk,
            input.document_id.as_deref(),
            input.file_path.as_deref(),
        )
        .await
        {
            tracing::warn!(chunk = i, "failed to store chunk: {}", e);
        }

        match extract_from_chunk(ctx, &input.text).await {
            Ok(items) => {
                tracing::info!(
                    "extracted {} action items from chunk {}/{}",
                    items.len(),
                    i + 1,
                    total
                );
                extracted.extend(items);
            }
            Err(e) => {
                tracing::warn!("chunk {}/{} from {} skipped: {}", i + 1, total, source, e);
            }
        }
    }

    let saved = if extracted.is_empty() {
        Vec::new()
    } else {
        let mut tx = ctx.pool.begin().await?;
        let rows = insert_items(&mut *tx, ItemTable::ActionItems, meeting_id, user_id, &extracted).await?;
        tx.commit().await?;
        rows
    };

    tracing::info!(
        "processing completed: {} chunks processed, {} action items generated",
        total,
        saved.len()
    );

    Ok(IngestResponse {
        success: true,
        chunks_processed: total,
        action_items_generated: saved.len(),
        action_items: saved,
    })
}

async fn extract_from_chunk(ctx: &AppContext, text: &str) -> Result<Vec<NewItem>> {
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(extraction_user_prompt(text)),
        ],
        max_tokens: ctx.config.llm.max_tokens,
        temperature: ctx.config.llm.extraction_temperature,
    };

    let content = match ctx.llm.complete(&request).await? {
        Some(c) if !c.trim().is_empty() => c,
        _ => {
            tracing::info!("no content in model response");
            return Ok(Vec::new());
        }
    };
    tracing::debug!("model response: {}", preview(&content));

    match parse_model_json(&content)? {
        Value::Array(values) => Ok(items_from_values(values)),
        other => {
            tracing::info!("model response was not an array: {}", preview(&other.to_string()));
            Ok(Vec::new())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub document: Document,
    pub chunks_created: usize,
    #[serde(flatten)]
    pub ingest: IngestResponse,
}

/// Store, extract, chunk and process one uploaded transcript.
pub async fn upload_document(
    ctx: &AppContext,
    meeting_id: &str,
    user_id: Option<&str>,
    file_name: &str,
    media_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<UploadOutcome> {
    ctx.events
        .notify(Notification::info("Processing document", file_name));

    match upload_inner(ctx, meeting_id, user_id, file_name, media_type, bytes).await {
        Ok(outcome) => {
            ctx.events.notify(Notification::success(
                "Document processed",
                format!(
                    "{} action items extracted from {}",
                    outcome.ingest.action_items_generated, file_name
                ),
            ));
            Ok(outcome)
        }
        Err(e) => {
            ctx.events
                .notify(Notification::error("Processing failed", e.to_string()));
            Err(e)
        }
    }
}

async fn upload_inner(
    ctx: &AppContext,
    meeting_id: &str,
    user_id: Option<&str>,
    file_name: &str,
    media_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<UploadOutcome> {
    let meeting = get_meeting(&ctx.pool, meeting_id).await?;
    let kind = FileKind::detect(file_name, media_type.unwrap_or_default())?;
    let media_type = media_type
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(kind.media_type())
        .to_string();
    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string();

    let key = object_key(
        &user_id,
        &meeting.id,
        chrono::Utc::now().timestamp_millis(),
        file_name,
    );
    ctx.store.put(&key, &bytes).await?;
    tracing::info!(key = %key, bytes = bytes.len(), "stored {} upload", kind.label());

    let document = records::insert_document(
        &ctx.pool,
        &NewDocument {
            meeting_id: &meeting.id,
            user_id: &user_id,
            name: file_name,
            media_type: &media_type,
            size_bytes: bytes.len() as i64,
            storage_path: &key,
            sha256: &text_hash_bytes(&bytes),
        },
    )
    .await?;

    let name = file_name.to_string();
    let mt = media_type.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&bytes, &name, &mt))
        .await
        .map_err(|e| Error::Extraction(format!("extraction task failed: {}", e)))??;

    let chunks = chunk_text(file_name, &text, ctx.config.chunking.max_chars);
    if chunks.is_empty() {
        tracing::warn!("no text extracted from {}", file_name);
    }

    let request = IngestRequest {
        chunks: chunks
            .iter()
            .map(|c| ChunkInput::from_chunk(c, Some(&document.id), Some(&key)))
            .collect(),
        meeting_id: meeting.id.clone(),
        user_id: Some(user_id),
    };
    let ingest = process_document(ctx, &request).await?;

    Ok(UploadOutcome {
        document,
        chunks_created: chunks.len(),
        ingest,
    })
}

fn text_hash_bytes(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(bytes))
}
