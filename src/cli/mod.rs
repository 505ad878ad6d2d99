pub mod day;
pub mod import;
pub mod journal;
pub mod overview;
pub mod parsing;
pub mod rules;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use day::{process_day_command, DayCommand};
use import::{process_import_command, ImportCommand};
use journal::{process_blog_command, process_note_command, BlogCommand, NoteCommand};
use overview::{process_dates_command, process_overview_command, OverviewCommand};
use rules::{process_config_command, process_rules_command, ConfigCommand, RulesCommand};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    storage::{
        event_store::FileEventStore,
        settings::{SettingsProvider, SettingsStore},
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Focuslog", version, long_about = None)]
#[command(about = "Turns recorded window focus and keyboard activity into time reports", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level written into the log files, for example debug")]
    log: Option<LevelFilter>,
    #[arg(long, global = true, help = "Also print logs to the console")]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Time spent per app and category during one day")]
    Day {
        #[command(flatten)]
        command: DayCommand,
    },
    #[command(about = "Activity heatmap over a range of days")]
    Overview {
        #[command(flatten)]
        command: OverviewCommand,
    },
    #[command(about = "List the days which have recorded data")]
    Dates,
    #[command(about = "Import window, key and note records from json lines")]
    Import {
        #[command(flatten)]
        command: ImportCommand,
    },
    #[command(about = "Write a timestamped note")]
    Note {
        #[command(flatten)]
        command: NoteCommand,
    },
    #[command(about = "Show or replace the blog of a day")]
    Blog {
        #[command(flatten)]
        command: BlogCommand,
    },
    #[command(about = "Manage category rules and focus categories")]
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    #[command(about = "Show or change general settings")]
    Config {
        #[command(flatten)]
        command: ConfigCommand,
    },
    #[command(about = "Delete records older than the retention period")]
    Purge,
}

/// Everything a command needs to run.
pub struct AppContext {
    pub store: FileEventStore,
    pub settings: SettingsStore,
    pub clock: Box<dyn Clock>,
}

impl AppContext {
    pub fn open(dir: PathBuf, clock: Box<dyn Clock>) -> Result<Self> {
        Ok(Self {
            store: FileEventStore::new(dir.join("records"))?,
            settings: SettingsStore::new(dir.join("settings.json")),
            clock,
        })
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };
    enable_logging(CLI_PREFIX, &dir, args.log, args.log_console)?;
    debug!("Using application directory {dir:?}");

    let context = AppContext::open(dir, Box::new(DefaultClock))?;

    match args.commands {
        Commands::Day { command } => process_day_command(&context, command).await,
        Commands::Overview { command } => process_overview_command(&context, command).await,
        Commands::Dates => process_dates_command(&context).await,
        Commands::Import { command } => process_import_command(&context, command).await,
        Commands::Note { command } => process_note_command(&context, command).await,
        Commands::Blog { command } => process_blog_command(&context, command).await,
        Commands::Rules { command } => process_rules_command(&context, command).await,
        Commands::Config { command } => process_config_command(&context, command).await,
        Commands::Purge => process_purge_command(&context).await,
    }
}

async fn process_purge_command(context: &AppContext) -> Result<()> {
    let settings = context.settings.settings().await?;
    let today = context.clock.today(settings.day_boundary_hour);

    match retention_cutoff(today, settings.data_retention_days) {
        Some(cutoff) => {
            let removed = context.store.purge_older_than(cutoff).await?;
            println!("Removed {removed} day files older than {cutoff}");
        }
        None => println!("Retention is disabled, nothing removed"),
    }
    Ok(())
}

/// First logical date that is kept when `retention_days` days are retained, today included.
/// Zero disables retention.
fn retention_cutoff(today: NaiveDate, retention_days: u32) -> Option<NaiveDate> {
    if retention_days == 0 {
        return None;
    }
    today.checked_sub_days(chrono::Days::new(u64::from(retention_days) - 1))
}
