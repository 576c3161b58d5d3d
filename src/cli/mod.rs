//! Command-line interface for sheetsync
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand group is defined in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::engine::SheetEngine;
use crate::error::Result;
use crate::events::EventDestination;
use crate::feed::ChangeFeed;
use crate::notes::FsNoteStore;
use crate::output::OutputOptions;
use crate::paths::PathResolver;
use crate::registry::CellLockRegistry;
use crate::sheet::ColumnDefaults;
use crate::store::FsLineStore;

mod actor;
mod cell;
mod row;
mod sheet;

/// sheetsync - shared sheet coordination
///
/// A CLI over the coordination core of the shared-sheet editor:
/// structural row mutations, cell edits, and promote-to-final, with the
/// same locking, renumbering, and change-feed semantics the server uses.
#[derive(Parser, Debug)]
#[command(name = "sheetsync")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Sheet root directory (defaults to current directory)
    #[arg(long, global = true, env = "SHEETSYNC_ROOT")]
    pub root: Option<PathBuf>,

    /// Actor identity recorded on mutations
    #[arg(long, global = true, env = "SHEETSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit change events as JSON lines to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a sheet with a header, fixed row, and footer
    New {
        /// Root-relative sheet path (e.g. /BDBR/Prelim.csv)
        #[arg(long)]
        sheet: String,

        /// Semicolon-separated header line
        #[arg(long)]
        header: String,
    },

    /// Print a sheet's lines
    Show {
        /// Root-relative sheet path
        #[arg(long)]
        sheet: String,
    },

    /// Structural row operations
    #[command(subcommand)]
    Row(RowCommands),

    /// Cell operations
    #[command(subcommand)]
    Cell(CellCommands),

    /// Restore the sequential numbering of the data region
    Renumber {
        /// Root-relative sheet path
        #[arg(long)]
        sheet: String,
    },

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),
}

/// Row subcommands
#[derive(Subcommand, Debug)]
pub enum RowCommands {
    /// Insert a default-valued row below an existing row
    Insert {
        #[arg(long)]
        sheet: String,

        /// Model row to insert below (0 = the fixed row)
        #[arg(long)]
        after: usize,
    },

    /// Delete a data row
    Delete {
        #[arg(long)]
        sheet: String,

        /// Model row to delete
        #[arg(long)]
        row: usize,
    },

    /// Move a data row to another position
    Move {
        #[arg(long)]
        sheet: String,

        /// Source model row
        #[arg(long)]
        from: usize,

        /// Destination model row
        #[arg(long)]
        to: usize,
    },

    /// Copy a row into a target sheet, bumping its promotion counter
    Promote {
        /// Source sheet path
        #[arg(long)]
        sheet: String,

        /// Model row to promote
        #[arg(long)]
        row: usize,

        /// Target sheet path
        #[arg(long)]
        target: String,
    },
}

/// Cell subcommands
#[derive(Subcommand, Debug)]
pub enum CellCommands {
    /// Set one cell value
    Set {
        #[arg(long)]
        sheet: String,

        /// Model row (0 = the fixed row)
        #[arg(long)]
        row: usize,

        /// Column index
        #[arg(long)]
        col: usize,

        /// New cell value
        #[arg(long)]
        value: String,
    },
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the actor identity at the sheet root
    Set {
        /// Actor name
        name: String,
    },

    /// Show the resolved actor
    Show,
}

/// Shared state built once per invocation.
pub(crate) struct CliContext {
    pub engine: SheetEngine<FsLineStore>,
    pub feed: Arc<ChangeFeed>,
    pub root: PathBuf,
    pub actor: String,
    pub output: OutputOptions,
    pub events: Option<EventDestination>,
}

impl CliContext {
    /// Emit everything the feed accumulated during this invocation.
    pub fn drain_events(&self) -> Result<()> {
        if let Some(destination) = &self.events {
            let mut sink = destination.open()?;
            sink.emit_all(&self.feed.find_since(0).events)?;
        }
        Ok(())
    }
}

impl Cli {
    fn context(&self) -> Result<CliContext> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };

        let config = Config::load(&root)?;
        let resolver = PathResolver::new(root.clone());
        let locks = Arc::new(CellLockRegistry::new(config.lock_ttl()?));
        let feed = Arc::new(ChangeFeed::new(config.feed.capacity));

        let engine = SheetEngine::new(
            FsLineStore::new(resolver.clone()),
            Arc::clone(&locks),
            Arc::clone(&feed),
        )
        .with_defaults(ColumnDefaults::from_overrides(config.column_defaults()?))
        .with_notes(Box::new(FsNoteStore::new(resolver)));

        let actor = crate::actor::resolve_actor(Some(&root), self.actor.as_deref())?;

        Ok(CliContext {
            engine,
            feed,
            root,
            actor,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
            events: EventDestination::parse(self.events.as_deref()),
        })
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = self.context()?;

        match self.command {
            Commands::New { sheet, header } => sheet::run_new(&ctx, &sheet, &header),
            Commands::Show { sheet } => sheet::run_show(&ctx, &sheet),
            Commands::Renumber { sheet } => sheet::run_renumber(&ctx, &sheet),
            Commands::Row(cmd) => match cmd {
                RowCommands::Insert { sheet, after } => row::run_insert(&ctx, &sheet, after),
                RowCommands::Delete { sheet, row } => row::run_delete(&ctx, &sheet, row),
                RowCommands::Move { sheet, from, to } => row::run_move(&ctx, &sheet, from, to),
                RowCommands::Promote { sheet, row, target } => {
                    row::run_promote(&ctx, &sheet, row, &target)
                }
            },
            Commands::Cell(cmd) => match cmd {
                CellCommands::Set {
                    sheet,
                    row,
                    col,
                    value,
                } => cell::run_set(&ctx, &sheet, row, col, &value),
            },
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name } => actor::run_set(&ctx, &name),
                ActorCommands::Show => actor::run_show(&ctx),
            },
        }
    }
}
