//! LangSync command-line synchronization tool.
//!
//! Provides the `pull`, `push`, `synch`, and `init` subcommands against a
//! configured remote translation store, plus `validate` for configuration
//! checking.

mod progress;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use langsync_core::batch::PoolConfig;
use langsync_core::config::AppConfig;
use langsync_core::conflict::ConflictStrategy;
use langsync_core::driver::JsonFileDriver;
use langsync_core::filter::SetFilter;
use langsync_core::remote::HttpRemote;
use langsync_core::sync_engine::{PullOptions, PullReport, PushOptions, SyncEngine};

use progress::TerminalEvents;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// LangSync command-line synchronization tool.
#[derive(Parser, Debug)]
#[command(
    name = "langsync",
    version,
    about = "Synchronize local translation sets with a remote store"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to ./langsync.toml,
    /// then the platform config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull remote sets and merge them into local storage.
    Pull {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        conflicts: ConflictArgs,
    },

    /// Push local sets to the remote in bounded concurrent chunks.
    Push {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Pull then push.
    Synch {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        conflicts: ConflictArgs,
    },

    /// First-time import: push every local set with first-import metadata.
    Init {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Validate a configuration file.
    Validate,
}

/// Dimension filters shared by all sync subcommands. Repeatable; exclusion
/// wins over inclusion on the same dimension.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only sync these locales.
    #[arg(long = "locale")]
    locales: Vec<String>,

    /// Skip these locales.
    #[arg(long = "except-locale")]
    except_locales: Vec<String>,

    /// Only sync these groups.
    #[arg(long = "group")]
    groups: Vec<String>,

    /// Skip these groups.
    #[arg(long = "except-group")]
    except_groups: Vec<String>,

    /// Only sync these namespaces.
    #[arg(long = "namespace")]
    namespaces: Vec<String>,

    /// Skip these namespaces.
    #[arg(long = "except-namespace")]
    except_namespaces: Vec<String>,
}

impl FilterArgs {
    fn into_filter(self) -> SetFilter {
        SetFilter {
            only_locales: self.locales,
            except_locales: self.except_locales,
            only_groups: self.groups,
            except_groups: self.except_groups,
            only_namespaces: self.namespaces,
            except_namespaces: self.except_namespaces,
        }
    }
}

#[derive(Args, Debug, Default)]
struct ConflictArgs {
    /// Conflict strategy, overriding the configured one.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Record conflicts and keep going instead of aborting on the first.
    #[arg(long)]
    silence_conflicts: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    AcceptIncoming,
    AcceptCurrent,
    Throw,
    Ignore,
    MergeAndIgnore,
    MergeButThrow,
}

impl From<StrategyArg> for ConflictStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::AcceptIncoming => ConflictStrategy::AcceptIncoming,
            StrategyArg::AcceptCurrent => ConflictStrategy::AcceptCurrent,
            StrategyArg::Throw => ConflictStrategy::Throw,
            StrategyArg::Ignore => ConflictStrategy::Ignore,
            StrategyArg::MergeAndIgnore => ConflictStrategy::MergeAndIgnore,
            StrategyArg::MergeButThrow => ConflictStrategy::MergeButThrow,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Exit code for operations that completed but recorded conflicts.
const EXIT_CONFLICTS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::WithConflicts) => ExitCode::from(EXIT_CONFLICTS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

enum Outcome {
    Clean,
    WithConflicts,
}

async fn run(cli: Cli) -> Result<Outcome> {
    let config_path = resolve_config_path(cli.config.as_deref())?;

    if let Commands::Validate = cli.command {
        return cmd_validate(&config_path).map(|()| Outcome::Clean);
    }

    let config = AppConfig::load_and_resolve(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let engine = build_engine(&config)?;
    let events = Arc::new(TerminalEvents::new());
    let engine = engine.with_events(events.clone());

    let outcome = match cli.command {
        Commands::Pull { filter, conflicts } => {
            let options = pull_options(&config, filter, conflicts);
            let report = engine.pull(&options).await?;
            print_pull_summary(&report)
        }
        Commands::Push { filter } => {
            let options = push_options(&config, filter);
            let report = engine.push(&options).await?;
            events.finish();
            println!(
                "{}",
                style::success(&format!(
                    "Pushed {} of {} set(s) in {} chunk(s), {} skipped",
                    report.total_pushed,
                    report.total_pushable,
                    report.chunks_dispatched,
                    report.skipped
                ))
            );
            Outcome::Clean
        }
        Commands::Synch { filter, conflicts } => {
            let set_filter = filter.into_filter();
            let mut pull_opts = pull_options(&config, FilterArgs::default(), conflicts);
            pull_opts.filter = set_filter.clone();
            let push_opts = PushOptions {
                filter: set_filter,
                pool: pool_config(&config),
            };
            let (pull_report, push_report) = engine.synch(&pull_opts, &push_opts).await?;
            events.finish();
            let outcome = print_pull_summary(&pull_report);
            println!(
                "{}",
                style::success(&format!(
                    "Pushed {} of {} set(s)",
                    push_report.total_pushed, push_report.total_pushable
                ))
            );
            outcome
        }
        Commands::Init { filter } => {
            let options = push_options(&config, filter);
            let report = engine.init(&options).await?;
            events.finish();
            println!(
                "{}",
                style::success(&format!(
                    "Imported {} set(s) to the remote",
                    report.total_pushed
                ))
            );
            Outcome::Clean
        }
        Commands::Validate => unreachable!(),
    };

    Ok(outcome)
}

fn print_pull_summary(report: &PullReport) -> Outcome {
    println!(
        "{}",
        style::success(&format!(
            "Pulled {} page(s): {} saved, {} skipped",
            report.pages, report.saved, report.skipped
        ))
    );
    if report.has_conflicts() {
        progress::print_conflicts(&report.conflicts);
        Outcome::WithConflicts
    } else {
        Outcome::Clean
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn resolve_config_path(explicit: Option<&std::path::Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let local = PathBuf::from("./langsync.toml");
    if local.exists() {
        return Ok(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let fallback = config_dir.join("langsync/config.toml");
        if fallback.exists() {
            return Ok(fallback);
        }
    }
    bail!("no configuration file found; pass --config or create ./langsync.toml");
}

fn build_engine(config: &AppConfig) -> Result<SyncEngine<JsonFileDriver, HttpRemote>> {
    let token = config
        .remote
        .token
        .clone()
        .with_context(|| format!("environment variable {} is not set", config.remote.api_token_env))?;
    let remote = HttpRemote::new(
        config.remote.base_url.clone(),
        config.remote.project.clone(),
        config.remote.branch.clone(),
        token,
    );
    let driver = JsonFileDriver::new(config.storage.data_dir.clone());
    Ok(SyncEngine::new(driver, remote))
}

fn pull_options(config: &AppConfig, filter: FilterArgs, conflicts: ConflictArgs) -> PullOptions {
    let mut options = PullOptions::from_config(config);
    options.filter = filter.into_filter();
    if let Some(strategy) = conflicts.strategy {
        options.strategy = strategy.into();
    }
    if conflicts.silence_conflicts {
        options.silence_conflicts = true;
    }
    options
}

fn push_options(config: &AppConfig, filter: FilterArgs) -> PushOptions {
    PushOptions {
        filter: filter.into_filter(),
        pool: pool_config(config),
    }
}

fn pool_config(config: &AppConfig) -> PoolConfig {
    PoolConfig::new(config.push.max_pool_size, config.push.max_chunk_size)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_validate(path: &PathBuf) -> Result<()> {
    let config = AppConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    println!("{}", style::success("Configuration is valid"));
    println!(
        "  Remote: {} (project {}, branch {})",
        config.remote.base_url, config.remote.project, config.remote.branch
    );
    println!("  Storage: {}", config.storage.data_dir.display());
    if config.remote.token.is_none() {
        println!(
            "{}",
            style::warn(&format!(
                "{} is not set; sync commands will fail",
                config.remote.api_token_env
            ))
        );
    }
    Ok(())
}
