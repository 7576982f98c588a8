//! Line-oriented operator session.
//!
//! Each input line is one action, parsed with clap in multicall mode so the first word names
//! the action. Failures of an action are printed and the session carries on; only I/O errors on
//! the output stream end it.

use archive_core::staleness::StalenessProgress;
use archive_core::{
    sort_by_patient, ArchiveConfig, ArchiveError, ArchiveSession, Filesystem, MovePlan,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, Write};

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// List configured sites
    Sites,
    /// Switch to another site
    Site {
        /// Site name as written in the config
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Scan the clinic for patient directories
    Find,
    /// List the patient directories found by the last scan
    List,
    /// Calculate weeks since each patient directory was touched
    Calculate,
    /// Set the number of weeks to keep and show what would be archived
    Keep { weeks: u32 },
    /// Show the moving plan and anything blocking it
    Plan,
    /// Move the selected directories into the holding directory
    Move,
    /// Check that the last moved batch reached the final archive
    Test,
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

/// What the read loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<F> {
    config: ArchiveConfig,
    fs: F,
    session: ArchiveSession,
    /// The plan of the last executed batch, kept so `test` checks what was actually moved.
    last_moved: Option<MovePlan>,
}

impl<F: Filesystem> Shell<F> {
    pub fn new(config: ArchiveConfig, fs: F, session: ArchiveSession) -> Self {
        Self {
            config,
            fs,
            session,
            last_moved: None,
        }
    }

    pub fn prompt(&self) -> &str {
        self.session.site().name()
    }

    pub fn greet(&self, out: &mut impl Write) -> io::Result<()> {
        let site = self.session.site();
        writeln!(out, "Site: {}", site.name())?;
        writeln!(out, "  clinic:      `{}`", site.clinic().display())?;
        writeln!(out, "  holding:     `{}`", site.holding().display())?;
        writeln!(out, "  destination: `{}`", site.destination().display())?;
        writeln!(out, "Weeks to keep: {}", self.session.weeks_to_keep())?;
        writeln!(out, "Type `help` for the list of actions.")
    }

    /// Runs one input line.
    ///
    /// # Errors
    ///
    /// Only failures to write to `out` are returned.
    pub fn handle_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Flow::Continue);
        }

        let action = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.action,
            Err(e) => {
                write!(out, "{}", e)?;
                return Ok(Flow::Continue);
            }
        };

        if let Action::Quit = action {
            return Ok(Flow::Quit);
        }

        if let Err(e) = self.run(action, out) {
            match e {
                ShellError::Io(e) => return Err(e),
                ShellError::Archive(e) => writeln!(out, "error: {}", e)?,
            }
        }
        Ok(Flow::Continue)
    }

    fn run(&mut self, action: Action, out: &mut impl Write) -> Result<(), ShellError> {
        match action {
            Action::Quit => {}
            Action::Sites => {
                for name in self.config.site_names() {
                    let marker = if name == self.session.site().name() {
                        "*"
                    } else {
                        " "
                    };
                    writeln!(out, "{} {}", marker, name)?;
                }
            }
            Action::Site { name } => {
                let name = name.join(" ");
                let site = self.config.site(&name)?.clone();
                self.session = ArchiveSession::new(site, self.config.default_weeks_to_keep());
                self.last_moved = None;
                self.greet(out)?;
            }
            Action::Find => {
                let count = self.session.refresh_directories(&self.fs)?;
                writeln!(
                    out,
                    "Found {} patient directories in `{}`.",
                    count,
                    self.session.site().clinic().display()
                )?;
            }
            Action::List => {
                let mut directories = self.session.directories().to_vec();
                if directories.is_empty() {
                    writeln!(out, "No patient directories found; run `find` first.")?;
                    return Ok(());
                }
                sort_by_patient(&mut directories);
                for directory in &directories {
                    writeln!(out, "* `{}`", directory.name())?;
                }
            }
            Action::Calculate => {
                if self.session.directories().is_empty() {
                    writeln!(out, "No patient directories to assess; run `find` first.")?;
                    return Ok(());
                }
                let mut progress = |p: StalenessProgress<'_>| {
                    eprint!(
                        "\r[{:>3.0}%] Patient Directory: `{}`",
                        p.fraction() * 100.0,
                        p.directory.name()
                    );
                };
                let record = self
                    .session
                    .recompute_staleness(&self.fs, Utc::now(), Some(&mut progress));
                eprintln!();
                for entry in record.by_weeks_descending() {
                    writeln!(
                        out,
                        "* Patient Directory: `{}` | Weeks since modified: `{:.2}`",
                        entry.directory.name(),
                        entry.weeks
                    )?;
                }
                for failure in record.failures() {
                    writeln!(
                        out,
                        "warning: `{}` was not assessed and will not be archived: {}",
                        failure.directory.name(),
                        failure.reason
                    )?;
                }
            }
            Action::Keep { weeks } => {
                self.session.set_weeks_to_keep(weeks);
                if self.session.staleness().is_none() {
                    writeln!(
                        out,
                        "Keeping {} weeks; run `calculate` to see what would be archived.",
                        weeks
                    )?;
                    return Ok(());
                }
                let selected = self.session.selected();
                writeln!(
                    out,
                    "Keeping {} weeks; {} directories would be archived:",
                    weeks,
                    selected.len()
                )?;
                for directory in &selected {
                    writeln!(out, "* `{}`", directory.name())?;
                }
            }
            Action::Plan => {
                let plan = self.current_plan()?;
                writeln!(out, "Moving plan:")?;
                for entry in plan.entries() {
                    writeln!(
                        out,
                        "* `{}` => `{}`",
                        entry.source.path().display(),
                        entry.holding.display()
                    )?;
                }
                let failures = plan.check_preconditions(&self.fs)?;
                for failure in &failures {
                    writeln!(out, "warning: {}", failure)?;
                }
                if plan.is_empty() {
                    writeln!(out, "Nothing is old enough to archive.")?;
                } else if failures.is_empty() {
                    writeln!(out, "Run `move` to move these directories.")?;
                } else {
                    writeln!(out, "Moving is disabled until the warnings are resolved.")?;
                }
            }
            Action::Move => {
                let plan = self.current_plan()?;
                if plan.is_empty() {
                    writeln!(out, "Nothing is old enough to archive.")?;
                    return Ok(());
                }
                let report = match plan.execute(&self.fs) {
                    Ok(report) => report,
                    Err(ArchiveError::MoveBlocked(failures)) => {
                        for failure in &failures {
                            writeln!(out, "warning: {}", failure)?;
                        }
                        writeln!(out, "Nothing was moved.")?;
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                for entry in &report.moved {
                    writeln!(
                        out,
                        "Moved `{}` => `{}`",
                        entry.source.path().display(),
                        entry.holding.display()
                    )?;
                }
                if let Some(failure) = &report.failed {
                    writeln!(
                        out,
                        "error: failed to move `{}`: {}",
                        failure.entry.source.path().display(),
                        failure.error
                    )?;
                    for entry in &report.not_attempted {
                        writeln!(out, "Not attempted: `{}`", entry.source.path().display())?;
                    }
                }
                writeln!(
                    out,
                    "Now move the contents of `{}` to `{}`, then run `test`.",
                    plan.holding_root().display(),
                    plan.archive_root().display()
                )?;
                self.last_moved = Some(plan);
            }
            Action::Test => {
                let plan = match &self.last_moved {
                    Some(plan) => plan.clone(),
                    None => self.current_plan()?,
                };
                let report = plan.verify(&self.fs);
                for path in &report.left_behind {
                    writeln!(out, "error: `{}` was left behind.", path.display())?;
                }
                for path in &report.not_in_archive {
                    writeln!(out, "error: `{}` was not found in archive.", path.display())?;
                }
                if report.is_success() {
                    writeln!(out, "All planned moves appeared to have been successful.")?;
                }
            }
        }
        Ok(())
    }

    fn current_plan(&self) -> Result<MovePlan, ArchiveError> {
        self.session.move_plan().ok_or_else(|| {
            ArchiveError::InvalidInput("staleness has not been calculated; run `calculate`".into())
        })
    }
}

#[derive(Debug)]
enum ShellError {
    Io(io::Error),
    Archive(ArchiveError),
}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArchiveError> for ShellError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_core::{SiteDirectories, StdFilesystem};
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    fn add_patient(clinic: &Path, name: &str, weeks_ago: u32) {
        let dir = clinic.join(name);
        fs::create_dir_all(&dir).unwrap();
        let file = fs::File::create(dir.join("demographic.001")).unwrap();
        file.set_modified(SystemTime::now() - WEEK * weeks_ago).unwrap();
    }

    fn shell(temp: &TempDir) -> Shell<StdFilesystem> {
        let focal = temp.path().join("focal");
        fs::create_dir_all(focal.join("clinic")).unwrap();
        fs::create_dir_all(focal.join("holding")).unwrap();
        fs::create_dir_all(temp.path().join("archive")).unwrap();

        let site = SiteDirectories::new(
            "Test",
            focal,
            "clinic".into(),
            "holding".into(),
            temp.path().join("archive"),
        );
        let config = ArchiveConfig::new(vec![site.clone()], 52);
        Shell::new(config, StdFilesystem::new(), ArchiveSession::new(site, 52))
    }

    fn run(shell: &mut Shell<StdFilesystem>, lines: &[&str]) -> String {
        let mut out = Vec::new();
        for line in lines {
            shell.handle_line(line, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_full_session() {
        let temp = TempDir::new().unwrap();
        let clinic = temp.path().join("focal").join("clinic");
        add_patient(&clinic, "001~OLD", 100);
        add_patient(&clinic, "002~NEW", 1);
        let mut shell = shell(&temp);

        let output = run(&mut shell, &["find", "calculate", "plan", "move"]);
        assert!(output.contains("Found 2 patient directories"));
        assert!(output.find("001~OLD").unwrap() < output.find("002~NEW").unwrap());
        assert!(output.contains("Run `move`"));
        assert!(temp.path().join("focal/holding/001~OLD").exists());
        assert!(clinic.join("002~NEW").exists());

        let output = run(&mut shell, &["test"]);
        assert!(output.contains("was not found in archive"));

        fs::rename(
            temp.path().join("focal/holding/001~OLD"),
            temp.path().join("archive/001~OLD"),
        )
        .unwrap();
        let output = run(&mut shell, &["test"]);
        assert!(output.contains("All planned moves appeared to have been successful."));
    }

    #[test]
    fn test_empty_patient_directory_is_reported_and_kept() {
        let temp = TempDir::new().unwrap();
        let clinic = temp.path().join("focal").join("clinic");
        add_patient(&clinic, "001~OLD", 100);
        add_patient(&clinic, "002~GONE", 100);
        let mut shell = shell(&temp);
        run(&mut shell, &["find"]);
        fs::remove_file(clinic.join("002~GONE").join("demographic.001")).unwrap();

        let output = run(&mut shell, &["calculate", "move"]);

        assert!(output.contains("`002~GONE` was not assessed"));
        assert!(temp.path().join("focal/holding/001~OLD").exists());
        assert!(clinic.join("002~GONE").exists());
    }

    #[test]
    fn test_move_refused_while_holding_not_empty() {
        let temp = TempDir::new().unwrap();
        let clinic = temp.path().join("focal").join("clinic");
        add_patient(&clinic, "001~OLD", 100);
        let mut shell = shell(&temp);
        fs::write(temp.path().join("focal/holding/.stray"), "").unwrap();

        let output = run(&mut shell, &["find", "calculate", "move"]);

        assert!(output.contains("is not empty"));
        assert!(output.contains("Nothing was moved."));
        assert!(clinic.join("001~OLD").exists());
    }

    #[test]
    fn test_keep_changes_selection() {
        let temp = TempDir::new().unwrap();
        let clinic = temp.path().join("focal").join("clinic");
        add_patient(&clinic, "001~A", 100);
        add_patient(&clinic, "002~B", 30);
        let mut shell = shell(&temp);

        let output = run(&mut shell, &["find", "calculate", "keep 20"]);
        assert!(output.contains("2 directories would be archived"));

        let output = run(&mut shell, &["keep 200"]);
        assert!(output.contains("0 directories would be archived"));
    }

    #[test]
    fn test_actions_before_calculation_are_reported() {
        let temp = TempDir::new().unwrap();
        let mut shell = shell(&temp);

        let output = run(&mut shell, &["list", "calculate", "plan", "site Nowhere"]);

        assert!(output.contains("run `find` first"));
        assert!(output.contains("run `calculate`"));
        assert!(output.contains("Nowhere"));
        assert_eq!(shell.prompt(), "Test");
    }

    #[test]
    fn test_blank_lines_and_quit() {
        let temp = TempDir::new().unwrap();
        let mut shell = shell(&temp);
        let mut out = Vec::new();

        assert_eq!(shell.handle_line("   \n", &mut out).unwrap(), Flow::Continue);
        assert_eq!(shell.handle_line("quit\n", &mut out).unwrap(), Flow::Quit);
        assert_eq!(shell.handle_line("exit", &mut out).unwrap(), Flow::Quit);
        assert!(out.is_empty());
    }
}
