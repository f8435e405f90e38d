//! Feedback coach CLI.
//!
//! Submits report-card feedback to the improvement service and manages the
//! history of generated comments kept under `.coach/storage/`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coach::core::error::ErrorKind;
use coach::core::request::{
    FeedbackRequest, FocusArea, GradeLevel, Length, StandardOptions, Subject, Tone,
};
use coach::exit_codes;
use coach::io::clipboard::CommandClipboard;
use coach::io::config::{CoachConfig, load_config};
use coach::io::history_store::HistoryStore;
use coach::io::init::{CoachPaths, InitOptions, init_coach};
use coach::io::service::{HttpImproveService, ImproveService};
use coach::io::storage::FileStorage;
use coach::io::watch::spawn_history_watcher;
use coach::{Completion, SessionController};
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "coach",
    version,
    about = "Improve report-card feedback and keep a history of results"
)]
struct Cli {
    /// Context root containing `.coach/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.coach/` with a default config.
    Init {
        /// Overwrite config if `.coach/` already exists.
        #[arg(short, long)]
        force: bool,
    },
    /// Send feedback to the improvement service and print the result.
    Submit(SubmitArgs),
    /// Inspect and manage generated comments.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Args)]
struct SubmitArgs {
    /// Original feedback, or `-` to read stdin.
    text: String,
    #[arg(long, default_value_t = Subject::default())]
    subject: Subject,
    #[arg(long, default_value_t = GradeLevel::default())]
    grade_level: GradeLevel,
    #[arg(long, default_value_t = Tone::default())]
    tone: Tone,
    #[arg(long, default_value_t = Length::default())]
    length: Length,
    /// Focus area to emphasize (repeatable).
    #[arg(long = "focus")]
    focus_areas: Vec<FocusArea>,
    /// Free-form instructions replacing all standard options.
    #[arg(long, conflicts_with_all = ["subject", "grade_level", "tone", "length", "focus_areas"])]
    custom_prompt: Option<String>,
    /// Copy the result to the clipboard.
    #[arg(long)]
    copy: bool,
}

impl SubmitArgs {
    fn into_request(self, text: String) -> FeedbackRequest {
        FeedbackRequest::from_input(
            text,
            self.custom_prompt,
            StandardOptions {
                subject: self.subject,
                grade_level: self.grade_level,
                tone: self.tone,
                length: self.length,
                focus_areas: self.focus_areas.into_iter().collect(),
            },
        )
    }
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved comments, newest first.
    List,
    /// Print one saved comment.
    Show { id: String },
    /// Load a saved comment as the working copy and print it.
    Restore {
        id: String,
        /// Copy the restored text to the clipboard.
        #[arg(long)]
        copy: bool,
    },
    /// Delete one saved comment.
    Delete { id: String },
    /// Delete every saved comment.
    Clear,
    /// Print a line whenever the history changes.
    Watch {
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

fn main() {
    coach::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = CoachPaths::new(&cli.root);
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Submit(args) => cmd_submit(&paths, args),
        Command::History(command) => cmd_history(&paths, command),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_coach(root, &InitOptions { force })?;
    println!("initialized {}", paths.coach_dir.display());
    Ok(exit_codes::OK)
}

/// Everything a command needs from one context.
struct CoachContext {
    config: CoachConfig,
    store: Arc<HistoryStore>,
    storage_dir: PathBuf,
}

fn open_context(paths: &CoachPaths) -> Result<CoachContext> {
    let config = load_config(&paths.config_path)?.with_env_overrides()?;
    let storage =
        FileStorage::with_capacity_bytes(&paths.storage_dir, config.history.capacity_bytes);
    let store = HistoryStore::with_key(Arc::new(storage), config.history.storage_key.clone());
    debug!(storage = %paths.storage_dir.display(), key = store.key(), "opened context");
    Ok(CoachContext {
        config,
        store: Arc::new(store),
        storage_dir: paths.storage_dir.clone(),
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")
}

fn cmd_submit(paths: &CoachPaths, args: SubmitArgs) -> Result<i32> {
    let ctx = open_context(paths)?;
    let text = if args.text == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read feedback from stdin")?;
        buf
    } else {
        args.text.clone()
    };
    let copy_result = args.copy;
    let request = args.into_request(text);

    let service = HttpImproveService::new(&ctx.config.service)?;
    info!(endpoint = service.endpoint(), "submitting feedback");
    let mut controller = SessionController::new(Arc::new(service), Arc::clone(&ctx.store));
    let completion = runtime()?.block_on(controller.submit(&request));

    match completion {
        Completion::Succeeded(_) => {
            if let Some(artifact) = controller.artifact() {
                println!("{}", artifact.text());
                eprintln!(
                    "saved {} ({} words, {})",
                    artifact.base_artifact_id(),
                    artifact.word_count(),
                    artifact.tone()
                );
            }
            if copy_result {
                copy(&ctx, &controller)?;
            }
            Ok(exit_codes::OK)
        }
        Completion::Failed(err) => {
            eprintln!("error: {err}");
            Ok(match err.kind() {
                ErrorKind::Validation | ErrorKind::Busy => exit_codes::INVALID,
                ErrorKind::Transport | ErrorKind::Service => exit_codes::SERVICE_FAILED,
            })
        }
        Completion::Discarded | Completion::Rejected => Ok(exit_codes::INVALID),
    }
}

fn copy<S>(ctx: &CoachContext, controller: &SessionController<S>) -> Result<()>
where
    S: ImproveService,
{
    let clipboard = CommandClipboard::new(&ctx.config.clipboard)?;
    if controller.copy_to_clipboard(&clipboard) {
        eprintln!("copied to clipboard");
    } else {
        eprintln!("warning: could not copy to clipboard");
    }
    Ok(())
}

fn cmd_history(paths: &CoachPaths, command: HistoryCommand) -> Result<i32> {
    let ctx = open_context(paths)?;
    match command {
        HistoryCommand::List => {
            let entries = ctx.store.list();
            if entries.is_empty() {
                eprintln!("no saved comments");
            }
            for entry in entries {
                let artifact = &entry.artifact;
                println!(
                    "{}\t{}\t{}\t{} words\t{}",
                    artifact.id,
                    artifact.created_at,
                    artifact.tone,
                    artifact.word_count,
                    preview(&artifact.text, 60)
                );
            }
            Ok(exit_codes::OK)
        }
        HistoryCommand::Show { id } => match ctx.store.restore(&id) {
            Some(artifact) => {
                println!("{}", artifact.text);
                Ok(exit_codes::OK)
            }
            None => not_found(&id),
        },
        HistoryCommand::Restore { id, copy: copy_text } => {
            let service = HttpImproveService::new(&ctx.config.service)?;
            let mut controller = SessionController::new(Arc::new(service), Arc::clone(&ctx.store));
            if controller.restore(&id).is_err() {
                return not_found(&id);
            }
            if let Some(artifact) = controller.artifact() {
                println!("{}", artifact.text());
            }
            if copy_text {
                copy(&ctx, &controller)?;
            }
            Ok(exit_codes::OK)
        }
        HistoryCommand::Delete { id } => {
            if ctx.store.remove(&id) {
                eprintln!("deleted {id}");
                Ok(exit_codes::OK)
            } else {
                not_found(&id)
            }
        }
        HistoryCommand::Clear => {
            let count = ctx.store.len();
            ctx.store.clear();
            eprintln!("cleared {count} saved comments");
            Ok(exit_codes::OK)
        }
        HistoryCommand::Watch { interval_ms } => {
            runtime()?.block_on(watch(ctx, Duration::from_millis(interval_ms)));
            Ok(exit_codes::OK)
        }
    }
}

async fn watch(ctx: CoachContext, interval: Duration) {
    let mut rx = ctx.store.subscribe();
    println!("{} saved comments", ctx.store.len());
    let _watcher = spawn_history_watcher(Arc::clone(&ctx.store), ctx.storage_dir.clone(), interval);
    loop {
        match rx.recv().await {
            Ok(_) => println!("{} saved comments", ctx.store.len()),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn not_found(id: &str) -> Result<i32> {
    eprintln!("error: history entry '{id}' not found");
    Ok(exit_codes::NOT_FOUND)
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
