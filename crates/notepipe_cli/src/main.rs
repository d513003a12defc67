//! `notepipe` command-line collaborator.
//!
//! # Responsibility
//! - Drive the note pipeline end to end from a terminal: validate input,
//!   submit through the repository and observe the result on a `Looper`.
//! - Print the list edits the command caused, then the resulting snapshot.

use clap::{Parser, Subcommand};
use log::info;
use notepipe_core::{
    clamp_priority, core_version, init_from_config, CoreConfig, Dispatcher, ListReconciler,
    ListSink, Looper, Note, NoteDraft, NoteId, NoteRepository, SqliteNoteStore, StoreConfig,
    PRIORITY_MAX, PRIORITY_MIN,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "notepipe")]
#[command(about = "Priority-sorted notes backed by SQLite")]
struct Cli {
    /// Database file; `:memory:` for a throwaway store. Overrides NOTEPIPE_DB_PATH.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all notes, highest priority first
    List,

    /// Add a note
    Add {
        title: String,
        description: String,
        /// Clamped into the supported priority range
        #[arg(long, short, default_value_t = PRIORITY_MIN, allow_negative_numbers = true)]
        priority: i32,
    },

    /// Replace an existing note
    Edit {
        id: NoteId,
        title: String,
        description: String,
        #[arg(long, short, default_value_t = PRIORITY_MIN, allow_negative_numbers = true)]
        priority: i32,
    },

    /// Delete a note by id
    Delete { id: NoteId },

    /// Delete every note
    Clear,

    /// Print the core version
    Version,
}

/// Sink that keeps the displayed list and a printable log of the edits.
#[derive(Default)]
struct EditLog {
    shown: Vec<Note>,
    edits: Vec<Value>,
}

impl ListSink<Note> for EditLog {
    fn on_removed(&mut self, index: usize) {
        self.shown.on_removed(index);
        self.edits.push(json!({ "op": "remove", "index": index }));
    }

    fn on_inserted(&mut self, index: usize, item: &Note) {
        self.shown.on_inserted(index, item);
        self.edits.push(json!({ "op": "insert", "index": index, "id": item.id }));
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        self.shown.on_moved(from, to);
        self.edits.push(json!({ "op": "move", "from": from, "to": to }));
    }

    fn on_changed(&mut self, index: usize, item: &Note) {
        self.shown.on_changed(index, item);
        self.edits.push(json!({ "op": "change", "index": index, "id": item.id }));
    }
}

type NotesView = ListReconciler<Note, EditLog>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("notepipe_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(db) = cli.db {
        config.store = if db.as_os_str() == ":memory:" {
            StoreConfig::memory()
        } else {
            StoreConfig::file(db)
        };
    }
    if let Err(err) = init_from_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }

    let repository = NoteRepository::open(&config).map_err(|err| err.to_string())?;
    let looper = Looper::new();
    let handler: Arc<dyn Dispatcher> = Arc::new(looper.handler());
    let view: NotesView = ListReconciler::new(Arc::clone(&handler), EditLog::default());
    let feed = view.clone();
    let subscription = repository
        .all_notes()
        .subscribe(handler, move |snapshot| feed.submit(snapshot));

    settle(&repository, &looper, &view)?;
    let baseline = view.with_sink(|log| log.edits.len());

    apply(&repository, &view, cli.command)?;

    settle(&repository, &looper, &view)?;
    let edits = view.with_sink(|log| log.edits[baseline..].to_vec());
    let notes = view.current();
    info!(
        "event=cli_command module=cli status=ok edits={} notes={}",
        edits.len(),
        notes.len()
    );

    drop(subscription);
    repository.shutdown();

    if cli.json {
        let output = json!({ "edits": edits, "notes": &*notes });
        let rendered = serde_json::to_string_pretty(&output).map_err(|err| err.to_string())?;
        println!("{rendered}");
    } else {
        print_text(&edits, &notes);
    }
    Ok(())
}

fn apply(
    repository: &NoteRepository<SqliteNoteStore>,
    view: &NotesView,
    command: Commands,
) -> Result<(), String> {
    match command {
        Commands::List | Commands::Version => {}
        Commands::Add {
            title,
            description,
            priority,
        } => {
            let note = NoteDraft::new(title, description, clamped(priority))
                .into_note()
                .map_err(|err| err.to_string())?;
            repository.insert(note);
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
        } => {
            if !is_shown(view, id) {
                eprintln!("warning: no note with id {id}; nothing to edit");
            }
            let note = NoteDraft::new(title, description, clamped(priority))
                .into_update(id)
                .map_err(|err| err.to_string())?;
            repository.update(note);
        }
        Commands::Delete { id } => {
            let shown = view
                .current()
                .iter()
                .find(|note| note.id == Some(id))
                .cloned();
            match shown {
                Some(note) => repository.delete(note),
                None => eprintln!("warning: no note with id {id}; nothing to delete"),
            }
        }
        Commands::Clear => repository.clear(),
    }
    Ok(())
}

/// Waits until everything submitted so far is reflected in `view`.
fn settle(
    repository: &NoteRepository<SqliteNoteStore>,
    looper: &Looper,
    view: &NotesView,
) -> Result<(), String> {
    if !repository.sync() {
        return Err("note worker stopped unexpectedly".to_string());
    }
    let notes = repository.all_notes();
    let settled = looper.run_until(SETTLE_TIMEOUT, || {
        notes
            .latest()
            .is_some_and(|latest| Arc::ptr_eq(&latest, &view.current()))
    });
    if settled {
        Ok(())
    } else {
        Err("timed out waiting for the note list".to_string())
    }
}

fn clamped(priority: i32) -> i32 {
    let value = clamp_priority(priority);
    if value != priority {
        eprintln!(
            "warning: priority {priority} outside {PRIORITY_MIN}..={PRIORITY_MAX}, using {value}"
        );
    }
    value
}

fn is_shown(view: &NotesView, id: NoteId) -> bool {
    view.current().iter().any(|note| note.id == Some(id))
}

fn print_text(edits: &[Value], notes: &[Note]) {
    if edits.is_empty() {
        println!("no changes");
    }
    for edit in edits {
        let op = edit["op"].as_str().unwrap_or("?");
        match op {
            "move" => println!("move   {} -> {}", edit["from"], edit["to"]),
            "remove" => println!("remove @{}", edit["index"]),
            _ => println!("{op:<6} @{} id={}", edit["index"], edit["id"]),
        }
    }
    println!("---");
    for note in notes {
        let id = note.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "#{id:<4} p{:<3} {}: {}",
            note.priority, note.title, note.description
        );
    }
}
