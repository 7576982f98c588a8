use archive_core::{
    config::{config_path_from_env, resolve_config_path},
    sort_by_patient, ArchiveConfig, ArchiveError, ArchiveSession, MovePlan, StdFilesystem,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_RECORD_FILENAME: &str = "monaco-archive-plan.json";

#[derive(Parser)]
#[command(name = "monaco-archive")]
#[command(about = "Find stale Monaco patient directories and move them to the archive holding area")]
struct Cli {
    /// Config file (default: $MONACO_ARCHIVE_CONFIG, then ./monaco-archive.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Site to work on (may be omitted when only one site is configured)
    #[arg(long, global = true)]
    site: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sites
    Sites,
    /// List patient directories, grouped by patient
    List,
    /// Show weeks since each patient directory was touched
    Staleness,
    /// Show the moving plan and anything blocking it
    Plan {
        /// Number of weeks to keep (default from config)
        #[arg(long)]
        weeks: Option<u32>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move stale directories into the holding directory
    Move {
        /// Number of weeks to keep (default from config)
        #[arg(long)]
        weeks: Option<u32>,
        /// Confirm the move
        #[arg(long)]
        yes: bool,
        /// Where to record the executed plan for `verify`
        #[arg(long, default_value = DEFAULT_RECORD_FILENAME)]
        record: PathBuf,
    },
    /// Check that a recorded batch reached the final archive
    Verify {
        /// Plan recorded by `move`
        #[arg(long, default_value = DEFAULT_RECORD_FILENAME)]
        plan: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("archive_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config, config_path_from_env());
    tracing::debug!("config path resolved to {}", config_path.display());

    let Some(command) = cli.command else {
        println!("Use 'monaco-archive --help' for commands");
        return Ok(());
    };

    if let Commands::Verify { plan: record } = &command {
        let text = std::fs::read_to_string(record)
            .map_err(|e| format!("failed to read plan record {}: {}", record.display(), e))?;
        let plan: MovePlan = serde_json::from_str(&text)?;
        tracing::info!(
            "verifying {} recorded moves from {}",
            plan.entries().len(),
            record.display()
        );
        let report = plan.verify(&StdFilesystem::new());
        for path in &report.left_behind {
            eprintln!("`{}` was left behind.", path.display());
        }
        for path in &report.not_in_archive {
            eprintln!("`{}` was not found in archive.", path.display());
        }
        if !report.is_success() {
            return Err("planned moves were not all successful".into());
        }
        println!("All planned moves appeared to have been successful.");
        return Ok(());
    }

    tracing::info!("++ Loading config from {}", config_path.display());
    let config = ArchiveConfig::load(&config_path)?;
    if config.sites().is_empty() {
        return Err(ArchiveError::NoUsableSites.into());
    }

    if let Commands::Sites = command {
        for site in config.sites() {
            println!(
                "{}: clinic `{}`, holding `{}`, destination `{}`",
                site.name(),
                site.clinic().display(),
                site.holding().display(),
                site.destination().display()
            );
        }
        return Ok(());
    }

    let site = config.choose_site(cli.site.as_deref())?.clone();
    let fs = StdFilesystem::new();
    let mut session = ArchiveSession::new(site, config.default_weeks_to_keep());
    session.refresh_directories(&fs)?;

    match command {
        Commands::Sites | Commands::Verify { .. } => {}
        Commands::List => {
            let mut directories = session.directories().to_vec();
            sort_by_patient(&mut directories);
            if directories.is_empty() {
                println!("No patient directories found.");
            }
            for directory in directories {
                println!("{}", directory.name());
            }
        }
        Commands::Staleness => {
            let record = session.recompute_staleness(&fs, chrono::Utc::now(), None);
            for entry in record.by_weeks_descending() {
                println!("{}\t{:.2}", entry.directory.name(), entry.weeks);
            }
            for failure in record.failures() {
                eprintln!("{}\tnot assessed: {}", failure.directory.name(), failure.reason);
            }
        }
        Commands::Plan { weeks, json } => {
            let plan = plan_for(&mut session, &fs, weeks)?;
            let failures = plan.check_preconditions(&fs)?;
            if json {
                let output = serde_json::json!({
                    "plan": plan,
                    "blocked_by": failures,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for entry in plan.entries() {
                    println!(
                        "{} => {}",
                        entry.source.path().display(),
                        entry.holding.display()
                    );
                }
                for failure in &failures {
                    eprintln!("Blocked: {}", failure);
                }
            }
        }
        Commands::Move {
            weeks,
            yes,
            record,
        } => {
            let plan = plan_for(&mut session, &fs, weeks)?;
            if !yes {
                println!(
                    "{} directories would be moved into {}; re-run with --yes to move them",
                    plan.entries().len(),
                    plan.holding_root().display()
                );
                return Ok(());
            }
            let report = plan.execute(&fs)?;
            std::fs::write(&record, serde_json::to_string_pretty(&plan)?)
                .map_err(|e| format!("failed to record plan at {}: {}", record.display(), e))?;
            println!("Recorded plan at {}", record.display());
            for entry in &report.moved {
                println!("Moved {}", entry.source.name());
            }
            if let Some(failure) = &report.failed {
                eprintln!("Failed to move {}: {}", failure.entry.source.name(), failure.error);
                for entry in &report.not_attempted {
                    eprintln!("Not attempted: {}", entry.source.name());
                }
                return Err(format!(
                    "move batch stopped after {} of {} directories",
                    report.moved.len(),
                    plan.entries().len()
                )
                .into());
            }
        }
    }

    Ok(())
}

fn plan_for(
    session: &mut ArchiveSession,
    fs: &StdFilesystem,
    weeks: Option<u32>,
) -> Result<MovePlan, ArchiveError> {
    if let Some(weeks) = weeks {
        session.set_weeks_to_keep(weeks);
    }
    session.recompute_staleness(fs, chrono::Utc::now(), None);
    session
        .move_plan()
        .ok_or_else(|| ArchiveError::InvalidInput("staleness was not calculated".into()))
}
