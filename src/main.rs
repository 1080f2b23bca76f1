//! # Meeting Actions CLI (`mact`)
//!
//! The `mact` binary drives the whole pipeline from a terminal: create
//! meetings, upload transcripts, review and edit the extracted action items,
//! merge them into tasks, maintain the business-requirements document and
//! start the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! mact --config ./config/mact.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mact init` | Create the SQLite database and run schema migrations |
//! | `mact project add\|list` | Manage projects |
//! | `mact meeting add\|list\|show` | Manage meetings |
//! | `mact upload <meeting> <file>` | Store, extract, chunk and process a transcript |
//! | `mact chunks <meeting>` | Show stored chunks |
//! | `mact items list\|add\|edit` | Review and edit action items |
//! | `mact tasks list\|edit` | Review and edit consolidated tasks |
//! | `mact summarize <meeting>` | Merge action items into tasks |
//! | `mact brd show\|history\|save\|regenerate` | Business-requirements document |
//! | `mact watch items\|tasks <meeting>` | Print the list whenever it changes |
//! | `mact serve` | Start the HTTP API |

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use meeting_actions::config::{self, Config};
use meeting_actions::edit::edit_item;
use meeting_actions::meetings::{self, NewMeeting, NewProject};
use meeting_actions::models::{ItemRecord, Priority, Status, DEFAULT_USER};
use meeting_actions::records::{self, ItemDraft, ItemPatch, ItemTable, Sort};
use meeting_actions::summarize::SummarizeRequest;
use meeting_actions::{ingest, migrate, requirements, server, summarize, watch, AppContext};

/// Meeting Actions: transcripts in, action items, tasks and requirements out.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mact.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mact",
    about = "Meeting Actions: extract and track action items from meeting transcripts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mact.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage meetings.
    Meeting {
        #[command(subcommand)]
        action: MeetingAction,
    },

    /// Upload a `.docx` or `.pdf` transcript and extract its action items.
    Upload {
        meeting_id: String,
        path: PathBuf,
        /// Owner recorded on the document, chunks and items.
        #[arg(long)]
        user: Option<String>,
        /// Override the media type guessed from the file extension.
        #[arg(long)]
        media_type: Option<String>,
    },

    /// Show the stored chunks of a meeting.
    Chunks { meeting_id: String },

    /// Review and edit action items.
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },

    /// Review and edit consolidated tasks.
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Merge a meeting's action items into consolidated tasks.
    Summarize {
        meeting_id: String,
        #[arg(long)]
        user: Option<String>,
    },

    /// Business-requirements document.
    Brd {
        #[command(subcommand)]
        action: BrdAction,
    },

    /// Re-print a list every time it changes, until Ctrl-C.
    Watch {
        #[command(subcommand)]
        target: WatchTarget,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ProjectAction {
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
enum MeetingAction {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Meeting date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
        /// `upcoming`, `in-progress` or `completed`.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        participants: Option<i64>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Show {
        id: String,
    },
}

#[derive(Args)]
struct ListArgs {
    meeting_id: String,
    /// Sort column: action_item, category, priority, status, due_date,
    /// assigned_to, created_at, updated_at.
    #[arg(long)]
    sort: Option<String>,
    /// Sort descending.
    #[arg(long)]
    desc: bool,
}

impl ListArgs {
    fn sort(&self) -> Result<Sort> {
        let direction = if self.desc { "desc" } else { "asc" };
        Ok(Sort::parse(self.sort.as_deref(), Some(direction))?)
    }
}

#[derive(Args)]
struct EditArgs {
    id: String,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    priority: Option<Priority>,
    #[arg(long)]
    status: Option<Status>,
    /// Due date (YYYY-MM-DD); an empty string clears it.
    #[arg(long)]
    due: Option<String>,
    #[arg(long)]
    remarks: Option<String>,
    #[arg(long)]
    info: Option<String>,
    #[arg(long)]
    assignee: Option<String>,
}

impl EditArgs {
    fn patch(&self) -> ItemPatch {
        ItemPatch {
            action_item: self.text.clone(),
            category: self.category.clone(),
            priority: self.priority,
            status: self.status,
            due_date: self.due.clone(),
            remarks: self.remarks.clone(),
            additional_info: self.info.clone(),
            assigned_to: self.assignee.clone(),
        }
    }
}

#[derive(Subcommand)]
enum ItemsAction {
    List(ListArgs),
    /// Add an action item by hand.
    Add {
        meeting_id: String,
        text: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    Edit(EditArgs),
}

#[derive(Subcommand)]
enum TasksAction {
    List(ListArgs),
    Edit(EditArgs),
}

#[derive(Subcommand)]
enum BrdAction {
    /// Print the latest version, a specific one, or the blank template.
    Show {
        meeting_id: String,
        #[arg(long)]
        version: Option<i64>,
    },
    History {
        meeting_id: String,
    },
    /// Save a file (or `-` for stdin) as the next version.
    Save {
        meeting_id: String,
        file: PathBuf,
    },
    /// Rewrite the document from the meeting's action items.
    Regenerate {
        meeting_id: String,
    },
}

#[derive(Subcommand)]
enum WatchTarget {
    Items {
        meeting_id: String,
        /// Refresh interval in seconds (defaults to `server.poll_interval_secs`).
        #[arg(long)]
        interval: Option<u64>,
    },
    Tasks {
        meeting_id: String,
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let ctx = AppContext::from_config(&cfg).await?;
            let result = run_command(&ctx, command).await;
            ctx.pool.close().await;
            result?;
        }
    }

    Ok(())
}

async fn run_command(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        // Dispatched in `main` before a context exists.
        Commands::Init | Commands::Serve => {}
        Commands::Project { action } => match action {
            ProjectAction::Add { name, description } => {
                let project =
                    meetings::create_project(&ctx.pool, &NewProject { name, description }).await?;
                println!("{}", project.id);
            }
            ProjectAction::List => {
                for p in meetings::list_projects(&ctx.pool).await? {
                    println!("{}  {}  ({})", p.id, p.name, p.status);
                }
            }
        },
        Commands::Meeting { action } => match action {
            MeetingAction::Add {
                title,
                description,
                date,
                status,
                participants,
                project,
                user,
            } => {
                let meeting = meetings::create_meeting(
                    &ctx.pool,
                    &NewMeeting {
                        title,
                        description,
                        meeting_date: date,
                        status,
                        participant_count: participants,
                        project_id: project,
                        user_id: user,
                    },
                )
                .await?;
                println!("{}", meeting.id);
            }
            MeetingAction::List { project } => {
                for m in meetings::list_meetings(&ctx.pool, project.as_deref()).await? {
                    println!(
                        "{}  {}  {}  [{}]",
                        m.id,
                        m.meeting_date.as_deref().unwrap_or("----------"),
                        m.title,
                        m.status
                    );
                }
            }
            MeetingAction::Show { id } => {
                let m = meetings::get_meeting(&ctx.pool, &id).await?;
                println!("--- Meeting ---");
                println!("id:           {}", m.id);
                println!("title:        {}", m.title);
                println!("date:         {}", m.meeting_date.as_deref().unwrap_or("(none)"));
                println!("status:       {}", m.status);
                if let Some(count) = m.participant_count {
                    println!("participants: {}", count);
                }
                if let Some(project) = &m.project_id {
                    println!("project:      {}", project);
                }
                if let Some(description) = &m.description {
                    println!("description:  {}", description);
                }
                println!("owner:        {}", m.user_id);
                println!("created_at:   {}", m.created_at);

                let docs = records::list_documents(&ctx.pool, &id).await?;
                println!();
                println!("--- Documents ({}) ---", docs.len());
                for d in docs {
                    println!("{}  {}  {} bytes", d.id, d.name, d.size_bytes);
                }
            }
        },
        Commands::Upload {
            meeting_id,
            path,
            user,
            media_type,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let outcome = ingest::upload_document(
                ctx,
                &meeting_id,
                user.as_deref(),
                &file_name,
                media_type.as_deref(),
                bytes,
            )
            .await?;

            println!("upload {}", file_name);
            println!("  document:          {}", outcome.document.id);
            println!("  stored at:         {}", outcome.document.storage_path);
            println!("  chunks:            {}", outcome.chunks_created);
            println!("  action items:      {}", outcome.ingest.action_items_generated);
            println!("ok");
        }
        Commands::Chunks { meeting_id } => {
            meetings::get_meeting(&ctx.pool, &meeting_id).await?;
            let chunks = records::list_chunks(&ctx.pool, &meeting_id).await?;
            println!("--- Chunks ({}) ---", chunks.len());
            for chunk in chunks {
                println!("[{} #{}]", chunk.source_document, chunk.chunk_index);
                println!("{}", chunk.text);
                println!();
            }
        }
        Commands::Items { action } => match action {
            ItemsAction::List(args) => print_items(ctx, ItemTable::ActionItems, &args).await?,
            ItemsAction::Add {
                meeting_id,
                text,
                category,
                priority,
                due,
                assignee,
                user,
            } => {
                let draft = ItemDraft {
                    action_item: text,
                    category,
                    priority,
                    due_date: due,
                    assigned_to: assignee,
                    ..Default::default()
                };
                let record = records::create_item(
                    &ctx.pool,
                    ItemTable::ActionItems,
                    &meeting_id,
                    user.as_deref().unwrap_or(DEFAULT_USER),
                    &draft.to_new_item()?,
                )
                .await?;
                println!("{}", record.id);
            }
            ItemsAction::Edit(args) => {
                let saved = edit_item(&ctx.pool, ItemTable::ActionItems, &args.id, &args.patch()).await?;
                println!("{}", item_line(&saved));
            }
        },
        Commands::Tasks { action } => match action {
            TasksAction::List(args) => print_items(ctx, ItemTable::Tasks, &args).await?,
            TasksAction::Edit(args) => {
                let saved = edit_item(&ctx.pool, ItemTable::Tasks, &args.id, &args.patch()).await?;
                println!("{}", item_line(&saved));
            }
        },
        Commands::Summarize { meeting_id, user } => {
            let response = summarize::summarize(
                ctx,
                &SummarizeRequest {
                    meeting_id,
                    user_id: user,
                },
            )
            .await?;
            println!("{}", response.message);
            for task in &response.tasks {
                println!("  {}", item_line(task));
            }
        }
        Commands::Brd { action } => match action {
            BrdAction::Show {
                meeting_id,
                version,
            } => {
                meetings::get_meeting(&ctx.pool, &meeting_id).await?;
                match version {
                    Some(v) => {
                        let brd = requirements::get_version(&ctx.pool, &meeting_id, v).await?;
                        println!("{}", brd.content);
                    }
                    None => {
                        let current = requirements::current_or_template(&ctx.pool, &meeting_id).await;
                        if current.is_template {
                            eprintln!("(no saved version; showing template)");
                        }
                        println!("{}", current.content);
                    }
                }
            }
            BrdAction::History { meeting_id } => {
                meetings::get_meeting(&ctx.pool, &meeting_id).await?;
                for v in requirements::list_versions(&ctx.pool, &meeting_id).await? {
                    println!("v{}  {}  {} chars", v.version, v.created_at, v.length);
                }
            }
            BrdAction::Save { meeting_id, file } => {
                let content = read_input(&file)?;
                let saved = requirements::save(ctx, &meeting_id, &content).await?;
                println!("saved version {}", saved.version);
            }
            BrdAction::Regenerate { meeting_id } => {
                let response = requirements::regenerate(ctx, &meeting_id).await?;
                println!("generated version {}", response.version);
            }
        },
        Commands::Watch { target } => {
            let (table, meeting_id, interval) = match target {
                WatchTarget::Items {
                    meeting_id,
                    interval,
                } => (ItemTable::ActionItems, meeting_id, interval),
                WatchTarget::Tasks {
                    meeting_id,
                    interval,
                } => (ItemTable::Tasks, meeting_id, interval),
            };
            meetings::get_meeting(&ctx.pool, &meeting_id).await?;
            let every =
                Duration::from_secs(interval.unwrap_or(ctx.config.server.poll_interval_secs).max(1));

            let pool = ctx.pool.clone();
            let poller = watch::spawn_poller(
                every,
                move || {
                    let pool = pool.clone();
                    let meeting_id = meeting_id.clone();
                    async move { records::list_items(&pool, table, &meeting_id, Sort::default()).await }
                },
                move |items: &Vec<ItemRecord>| {
                    println!("--- {} {}s ---", items.len(), table.label());
                    for item in items {
                        println!("{}", item_line(item));
                    }
                    println!();
                },
            );

            tokio::signal::ctrl_c().await?;
            poller.shutdown().await;
        }
    }

    Ok(())
}

async fn print_items(ctx: &AppContext, table: ItemTable, args: &ListArgs) -> Result<()> {
    meetings::get_meeting(&ctx.pool, &args.meeting_id).await?;
    let items = records::list_items(&ctx.pool, table, &args.meeting_id, args.sort()?).await?;
    if items.is_empty() {
        println!("No {}s for this meeting.", table.label());
    }
    for item in &items {
        println!("{}", item_line(item));
    }
    Ok(())
}

fn item_line(item: &ItemRecord) -> String {
    let mut line = format!(
        "{}  [{}] [{}] {}",
        item.id, item.priority, item.status, item.action_item
    );
    if let Some(who) = &item.assigned_to {
        line.push_str(&format!("  @{}", who));
    }
    if let Some(due) = item.due_date {
        line.push_str(&format!("  due {}", due));
    }
    line
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
