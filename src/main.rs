use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archive_core::config::{config_path_from_env, resolve_config_path};
use archive_core::{ArchiveConfig, ArchiveError, ArchiveSession, StdFilesystem};

mod shell;

use shell::{Flow, Shell};

/// Interactive Monaco archive tool.
#[derive(Parser)]
#[command(name = "monaco-archive-run")]
#[command(about = "Interactive session for moving stale Monaco patient directories")]
struct Args {
    /// Config file (default: $MONACO_ARCHIVE_CONFIG, then ./monaco-archive.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Site to start with (may be omitted when only one site is configured)
    #[arg(long)]
    site: Option<String>,
}

/// Main entry point for the interactive archive session
///
/// Loads the site configuration once, then reads one action per line from stdin until
/// `quit` or end of input. The session (patient directories, staleness, weeks to keep) lives
/// for the whole run, so each action builds on the ones before it.
///
/// # Environment Variables
/// - `MONACO_ARCHIVE_CONFIG`: config file path, also read from a `.env` file
/// - `RUST_LOG`: log filter (default adds `archive_core=info`)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("archive_core=info".parse()?)
                .add_directive("monaco_archive_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config_path = resolve_config_path(args.config, config_path_from_env());
    tracing::info!("++ Loading config from {}", config_path.display());

    let config = ArchiveConfig::load(&config_path)?;
    let site = match config.choose_site(args.site.as_deref()) {
        Ok(site) => site.clone(),
        Err(ArchiveError::InvalidInput(_)) => {
            let first = config.sites()[0].clone();
            tracing::info!(
                "several sites configured, starting with `{}`; use `site <name>` to switch",
                first.name()
            );
            first
        }
        Err(e) => return Err(e.into()),
    };

    let session = ArchiveSession::new(site, config.default_weeks_to_keep());
    let mut shell = Shell::new(config, StdFilesystem::new(), session);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    shell.greet(&mut out)?;

    let stdin = std::io::stdin();
    loop {
        write!(out, "{}> ", shell.prompt())?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }

        if let Flow::Quit = shell.handle_line(&line, &mut out)? {
            break;
        }
    }

    Ok(())
}
