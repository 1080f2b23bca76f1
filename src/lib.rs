//! # Meeting Actions
//!
//! Turns meeting transcripts into tracked work.
//!
//! Uploaded Word or PDF transcripts are stored, converted to text, split into
//! sentence-aligned chunks and sent to a hosted chat-completion model that
//! returns the action items it finds. Action items can then be merged into
//! consolidated tasks, and folded into a versioned business-requirements
//! document (BRD) for the meeting.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │  Upload  │──▶│  Extract  │──▶│   Chunk   │──▶│   LLM    │
//! │ DOCX/PDF │   │   text    │   │ sentences │   │ extract  │
//! └──────────┘   └───────────┘   └───────────┘   └────┬─────┘
//!                                                      ▼
//!                 ┌──────────┐       ┌──────────┐ ┌──────────┐
//!                 │   CLI    │◀─────▶│  SQLite  │◀│ summarize│
//!                 │  (mact)  │       │          │ │   BRD    │
//!                 └──────────┘       └────┬─────┘ └──────────┘
//!                                         ▼
//!                                    ┌──────────┐
//!                                    │   HTTP   │
//!                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mact init
//! mact meeting add "Sprint planning" --date 2024-05-02
//! mact upload <meeting-id> ./minutes.docx
//! mact items list <meeting-id> --sort priority --desc
//! mact summarize <meeting-id>
//! mact brd regenerate <meeting-id>
//! mact serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |
//! | [`extract`] | DOCX / PDF text extraction |
//! | [`chunk`] | Sentence-packing chunker |
//! | [`storage`] | Object storage for uploads |
//! | [`model_output`] | Fence stripping, truncated-array repair, parsing |
//! | [`llm`] | Chat-completion client |
//! | [`ingest`] | Action-item extraction and uploads |
//! | [`summarize`] | Merge action items into tasks |
//! | [`requirements`] | Versioned BRD store and regeneration |
//! | [`meetings`] | Projects and meetings |
//! | [`records`] | Documents, chunks, action items and tasks |
//! | [`edit`] | Row edit state machine |
//! | [`events`] | User-facing notifications |
//! | [`watch`] | Cancellable periodic refresh |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod edit;
pub mod error;
pub mod events;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod meetings;
pub mod migrate;
pub mod model_output;
pub mod models;
pub mod records;
pub mod requirements;
pub mod server;
pub mod storage;
pub mod summarize;
pub mod watch;

pub use context::AppContext;
pub use error::{Error, Result};
