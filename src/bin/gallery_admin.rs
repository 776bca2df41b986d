//! Gallery admin command line
//!
//! Runs tag recalculation, graph lint and tag creation against the Notion
//! databases configured in the environment, or against a JSON snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Preview what a recalculation would change
//! gallery_admin recalc --from 2025-01-01
//!
//! # Apply up to 50 updates
//! gallery_admin recalc --apply --max-updates 50
//!
//! # Offline run against a snapshot
//! gallery_admin --snapshot tags.json lint -o json
//!
//! # Find or create tags
//! gallery_admin tag add "#木彫り　#作品"
//! gallery_admin tag find 木彫り --include-hidden
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use gallery_admin::config::{AdminConfig, RecalcDefaults};
use gallery_admin::normalize::parse_tag_input;
use gallery_admin::notion::NotionStores;
use gallery_admin::recalc::{parse_date, RecalcEngine, RecalcMode, RecalcOptions};
use gallery_admin::report::{render_lint, render_recalc};
use gallery_admin::store::{MemoryStore, StoreProvider};
use gallery_admin::tag_ops::{self, TagOutcome};
use gallery_admin::WorkFilter;

#[derive(Parser)]
#[command(name = "gallery_admin")]
#[command(version)]
#[command(about = "Tag consolidation and recalculation for the gallery catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Read tags and works from a JSON snapshot instead of Notion
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Log engine progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Recalculate work tags (dry run unless --apply)
    Recalc {
        /// Write changes instead of only reporting them
        #[arg(long)]
        apply: bool,

        /// Earliest completed date, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,

        /// Latest completed date, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,

        /// Only works carrying this tag id
        #[arg(long)]
        tag_id: Option<String>,

        /// Only works not marked ready
        #[arg(long)]
        unprepared_only: bool,

        /// Cap on writes for this run (default RECALC_MAX_UPDATES)
        #[arg(long)]
        max_updates: Option<usize>,
    },

    /// Report merge problems and parent cycles in the tag graph
    Lint,

    /// Tag lookup and creation
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Find or create tags; accepts "#a #b" style input
    Add {
        #[arg(required = true)]
        names: Vec<String>,

        /// Only report which tags would be created
        #[arg(long)]
        dry_run: bool,
    },

    /// Look up a tag by name or alias
    Find {
        name: String,

        /// Also match tags hidden from suggestions
        #[arg(long)]
        include_hidden: bool,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the command ran but did not fully succeed.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let (stores, defaults) = open_stores(cli.snapshot.as_ref())?;

    match &cli.command {
        Commands::Recalc {
            apply,
            from,
            to,
            tag_id,
            unprepared_only,
            max_updates,
        } => {
            let options = RecalcOptions {
                mode: if *apply {
                    RecalcMode::Apply
                } else {
                    RecalcMode::DryRun
                },
                filter: WorkFilter {
                    from: from.as_deref().map(|v| parse_date("--from", v)).transpose()?,
                    to: to.as_deref().map(|v| parse_date("--to", v)).transpose()?,
                    tag_id: tag_id.clone(),
                    unprepared_only: *unprepared_only,
                },
                max_updates: *max_updates,
            };
            cmd_recalc(stores.as_ref(), defaults, &options, cli.format).await
        }
        Commands::Lint => cmd_lint(stores.as_ref(), cli.format).await,
        Commands::Tag {
            command: TagCommands::Add { names, dry_run },
        } => cmd_tag_add(stores.as_ref(), names, *dry_run, cli.format).await,
        Commands::Tag {
            command: TagCommands::Find {
                name,
                include_hidden,
            },
        } => cmd_tag_find(stores.as_ref(), name, *include_hidden, cli.format).await,
    }
}

fn open_stores(
    snapshot: Option<&PathBuf>,
) -> anyhow::Result<(Arc<dyn StoreProvider>, RecalcDefaults)> {
    let defaults = RecalcDefaults::from_env().context("reading recalculation settings")?;

    match snapshot {
        Some(path) => {
            let store = Arc::new(MemoryStore::from_file(path)?);
            let defaults = RecalcDefaults {
                pace: Duration::ZERO,
                ..defaults
            };
            Ok((Arc::new(store), defaults))
        }
        None => {
            let config = AdminConfig::from_env().context("reading Notion settings")?;
            Ok((Arc::new(NotionStores::new(config)), defaults))
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_recalc(
    stores: &dyn StoreProvider,
    defaults: RecalcDefaults,
    options: &RecalcOptions,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let report = RecalcEngine::from_provider(stores)
        .with_defaults(defaults)
        .run(options)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => {
            let status = match (&report.failure, report.changed) {
                (Some(_), _) => "FAILED".red().bold(),
                (None, 0) => "OK".green().bold(),
                (None, _) if report.dry_run => "PENDING".yellow().bold(),
                (None, _) => "APPLIED".green().bold(),
            };
            print!("{status} {}", render_recalc(&report));
        }
    }

    Ok(report.succeeded())
}

async fn cmd_lint(stores: &dyn StoreProvider, format: OutputFormat) -> anyhow::Result<bool> {
    let report = RecalcEngine::from_provider(stores).lint().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => {
            let status = if report.warnings.is_empty() {
                "OK".green().bold()
            } else {
                "WARN".yellow().bold()
            };
            print!("{status} {}", render_lint(&report));
        }
    }

    Ok(true)
}

async fn cmd_tag_add(
    stores: &dyn StoreProvider,
    raw: &[String],
    dry_run: bool,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let names = parse_tag_input(&raw.join(" "));
    if names.is_empty() {
        anyhow::bail!("no tag names given");
    }

    let store = stores.tag_store();
    let resolutions = tag_ops::find_or_create_tags(store.as_ref(), &names, dry_run).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolutions)?),
        OutputFormat::Pretty => {
            for resolution in &resolutions {
                match &resolution.outcome {
                    TagOutcome::Existing { id } => {
                        println!("{} {} [{}]", "exists ".dimmed(), resolution.name, id)
                    }
                    TagOutcome::Created { id } => {
                        println!("{} {} [{}]", "created".green(), resolution.name, id)
                    }
                    TagOutcome::WouldCreate => {
                        println!("{} {}", "new    ".yellow(), resolution.name)
                    }
                }
            }
        }
    }

    Ok(true)
}

async fn cmd_tag_find(
    stores: &dyn StoreProvider,
    name: &str,
    include_hidden: bool,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let store = stores.tag_store();
    let found = tag_ops::find_tag(store.as_ref(), name, include_hidden).await?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "name": name,
                "id": found.as_ref().map(|m| &m.id),
                "status": found.as_ref().map(|m| m.status),
            })
        ),
        OutputFormat::Pretty => match &found {
            Some(m) => println!("{} {} [{}] {}", "found".green(), name, m.id, m.status),
            None => println!("{} {}", "no match".yellow(), name),
        },
    }

    Ok(found.is_some())
}
