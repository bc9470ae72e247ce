//! Command line front end
//!
//! Every subcommand works against the same on-disk state as the wizard, so a
//! stage made with `stage` can be written later with `commit`.

pub mod wizard;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{ConfigStore, Settings};
use crate::navigation::Navigator;
use crate::pipeline::{CommitPipeline, CommitReport, HttpLiveLimits, ReconcilePolicy, ShellReloader};
use crate::session::{self, EditSession, Selection};
use crate::staging::{SessionId, StagingArea};

#[derive(Parser)]
#[command(name = "farm-limits", version, about = "Edit render farm limits safely")]
pub struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Limits config to edit
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Folder for the staged edit
    #[arg(long, global = true)]
    pub temp_folder: Option<PathBuf>,

    /// Folder for backups
    #[arg(long, global = true)]
    pub backup_folder: Option<PathBuf>,

    /// Live limits endpoint
    #[arg(long, global = true)]
    pub live_url: Option<String>,

    /// Log at debug level regardless of LOG_LEVEL
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive editor (the default)
    Wizard,
    /// Shows that can be edited
    Shows,
    /// Editable limits and their current values
    List {
        #[arg(long)]
        show: Option<String>,
    },
    /// Stage new values without touching the live config
    Stage {
        /// Edit the limits of this show instead of the applications
        #[arg(long)]
        show: Option<String>,
        /// One value per listed limit, in list order
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<i64>,
        /// Continue an earlier session instead of starting a new one
        #[arg(long)]
        session: Option<String>,
    },
    /// Drop the staged edit
    Discard {
        #[arg(long)]
        session: Option<String>,
    },
    /// Back up, write, reload and verify the staged edit
    Commit {
        #[arg(long)]
        session: Option<String>,
    },
    /// Who owns the staged edit and what it changes
    Status,
    /// Report SiteMax values outside the allowed range
    Check,
    /// Print the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        init: bool,
    },
}

/// Resolved settings plus everything built from them
struct AppContext {
    settings: Settings,
    settings_path: PathBuf,
    store: ConfigStore,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let settings_path = cli.settings.clone().unwrap_or_else(Settings::path);
        let mut settings = Settings::load_from(settings_path.clone())?;
        if let Some(path) = &cli.config {
            settings.config_path = path.clone();
        }
        if let Some(path) = &cli.temp_folder {
            settings.temp_folder = path.clone();
        }
        if let Some(path) = &cli.backup_folder {
            settings.backup_folder = path.clone();
        }
        if let Some(url) = &cli.live_url {
            settings.live_limits_url = url.clone();
        }

        let store = ConfigStore::new(
            settings.config_path.clone(),
            StagingArea::new(settings.temp_folder.clone()),
        );
        Ok(Self {
            settings,
            settings_path,
            store,
        })
    }

    fn reloader(&self) -> Result<ShellReloader> {
        ShellReloader::from_command(&self.settings.reload_command)
            .context("reload_command in settings is empty")
    }

    fn live(&self) -> HttpLiveLimits {
        HttpLiveLimits::new(
            self.settings.live_limits_url.clone(),
            self.settings.http_timeout(),
        )
    }

    fn policy(&self) -> ReconcilePolicy {
        ReconcilePolicy::with_poll_delay(self.settings.poll_delay())
    }

    /// `requested`, or the owner of the current stage when none was given
    fn session_or_owner(&self, requested: Option<String>) -> Result<SessionId> {
        if let Some(id) = requested {
            return Ok(SessionId::from(id.as_str()));
        }
        if let Some(record) = self.store.staging().record()? {
            warn!(session = %record.session, "No --session given, acting as the stage owner");
        }
        Ok(self.store.staging().resume_session()?)
    }
}

fn selection(show: Option<String>) -> Selection {
    show.map_or(Selection::Applications, Selection::Show)
}

fn print_report(report: &CommitReport) {
    println!("Wrote {}", report.written.display());
    match &report.backup {
        Some(path) => println!("Backup: {}", path.display()),
        None => println!("Backup: none (no previous config)"),
    }
    for key in &report.reconciled {
        println!("  {} = {} (live after {} poll(s))", key.key, key.value, key.attempts);
    }
    for warning in &report.reload_warnings {
        println!("  reload attempt {} failed: {:?}", warning.attempt, warning.outcome);
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::new(&cli)?;

    match cli.command.unwrap_or(Commands::Wizard) {
        Commands::Wizard => {
            let reloader = ctx.reloader()?;
            let live = ctx.live();
            let navigator = Navigator::new(
                &ctx.store,
                ctx.settings.backup_folder.clone(),
                ctx.settings.hidden_shows.clone(),
                ctx.store.staging().resume_session()?,
                &reloader,
                &live,
                ctx.policy(),
            );
            let stdin = io::stdin();
            if let Some(report) = wizard::run(&navigator, stdin.lock(), io::stdout())? {
                print_report(&report);
            }
        }

        Commands::Shows => {
            let document = ctx.store.load_effective()?;
            for show in session::list_shows(&document, &ctx.settings.hidden_shows)? {
                println!("{show}");
            }
        }

        Commands::List { show } => {
            let document = ctx.store.load_effective()?;
            let edit = EditSession::open(&document, selection(show))?;
            for (name, value) in edit.current() {
                println!("{name:<24} {value:>6}");
            }
        }

        Commands::Stage { show, values, session } => {
            let session = session.map_or_else(SessionId::new, |id| SessionId::from(id.as_str()));
            let document = ctx.store.load_effective()?;
            let edit = EditSession::open(&document, selection(show))?;
            let proposal = edit.propose(&values)?;
            wizard::write_rows(&edit.review(&proposal), &mut io::stdout())?;

            let merged = document.with_overrides(&proposal)?;
            let record = ctx.store.staging().save(&session, &merged, &proposal)?;
            info!(session = %session, staged = record.proposal.len(), "Staged edit");
            println!("Staged {} value(s) in session {}", record.proposal.len(), session);
        }

        Commands::Discard { session } => {
            let session = ctx.session_or_owner(session)?;
            ctx.store.staging().discard(&session)?;
            println!("Discarded staged edit");
        }

        Commands::Commit { session } => {
            let session = ctx.session_or_owner(session)?;
            let reloader = ctx.reloader()?;
            let live = ctx.live();
            let mut pipeline = CommitPipeline::new(
                &ctx.store,
                ctx.settings.backup_folder.clone(),
                session,
                &reloader,
                &live,
                ctx.policy(),
            );
            pipeline.resume_stage()?;
            info!(stage = ?pipeline.current_stage(), keys = pipeline.proposal().len(), "Committing staged edit");
            print_report(&pipeline.finish()?);
        }

        Commands::Status => match ctx.store.staging().record()? {
            Some(record) => {
                println!("Staged by {} at {}", record.session, record.created);
                for (name, value) in &record.proposal {
                    println!("  {name:<24} {value:>6}");
                }
            }
            None if ctx.store.staging().exists() => {
                println!("Staged edit without an owner at {}", ctx.store.staging().stage_path().display());
            }
            None => println!("Nothing staged in {}", ctx.store.staging().temp_folder().display()),
        },

        Commands::Check => {
            let offenders = ctx.store.load_authoritative()?.out_of_range()?;
            for (key, value) in &offenders {
                println!("{key}: SiteMax {value}");
            }
            if !offenders.is_empty() {
                bail!("{} limit(s) outside the allowed SiteMax range", offenders.len());
            }
            println!("All limits within range");
        }

        Commands::Settings { init } => {
            if init {
                ctx.settings.save_to(&ctx.settings_path)?;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&ctx.settings).context("Failed to serialize settings")?
            );
        }
    }

    Ok(())
}
