//! Saved log files and replay verification.
//!
//! A log file is plain text, one encoded unit per line, in the order the
//! units were applied. Saving writes a session's output log; loading reads
//! lines back for [`BasicLogger::load_input`].
//!
//! [`replay_lines`] replays a log onto a fresh copy of a starting board and
//! reports the resulting [`state_hash`](GameState::state_hash). Comparing it
//! with the live session's hash proves the file reproduces the session.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//! use rewind_engine::logfile::replay_lines;
//! use rewind_engine::logger::{BasicLogger, LoggerConfig};
//!
//! let start = GameState::new();
//! let mut live = start.clone();
//! let mut logger = BasicLogger::default();
//! logger.log(&mut live, Command::display_text("A")).unwrap();
//! logger.undo(&mut live).unwrap();
//!
//! let outcome = replay_lines(start, logger.encoded_output(), &LoggerConfig::default());
//! assert_eq!(outcome.steps, 2);
//! assert!(outcome.matches(&live.state_hash()));
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rewind_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::logger::{BasicLogger, LoggerConfig};
use crate::report::{DataReport, ReportKind};

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write the output log of `logger` to `out`, one unit per line.
pub fn write_log<W: Write>(mut out: W, logger: &BasicLogger) -> io::Result<()> {
    for line in logger.encoded_output() {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Write the output log of `logger` to `path`.
pub fn save_log_file(path: impl AsRef<Path>, logger: &BasicLogger) -> Result<(), anyhow::Error> {
    let path = path.as_ref();
    let file = fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("failed to create log file {}: {e}", path.display()))?;
    write_log(io::BufWriter::new(file), logger)
        .map_err(|e| anyhow::anyhow!("failed to write log file {}: {e}", path.display()))?;
    info!(path = %path.display(), units = logger.output().len(), "log saved");
    Ok(())
}

/// Read the lines of a saved log. Windows line endings and blank lines are
/// dropped.
pub fn load_log_file(path: impl AsRef<Path>) -> Result<Vec<String>, anyhow::Error> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read log file {}: {e}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// The result of replaying a log onto a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// Units stepped.
    pub steps: usize,
    /// Problems encountered: skipped lines and aborted chains.
    pub reports: Vec<DataReport>,
    /// The board after the last step.
    pub state: GameState,
    /// BLAKE3 hex digest of `state`.
    pub state_hash: String,
}

impl ReplayOutcome {
    /// Lines that failed to decode.
    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.kind == ReportKind::BadData)
            .count()
    }

    /// Whether the replayed board hashes to `expected_hash`.
    pub fn matches(&self, expected_hash: &str) -> bool {
        self.state_hash == expected_hash
    }
}

/// Replay `lines` onto `initial` and report where it ends up.
///
/// Bad lines are skipped. A unit whose trigger chain is aborted, or that
/// adds a piece over a different one, keeps the effects it applied. All of
/// these are reported and replay continues.
pub fn replay_lines<I, S>(initial: GameState, lines: I, config: &LoggerConfig) -> ReplayOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = initial;
    let mut logger = BasicLogger::new(config.clone());
    let mut reports = logger.load_input(lines).reports;

    let mut steps = 0;
    while logger.is_replaying() {
        let index = logger.next_input();
        if let Err(e) = logger.step(&mut state) {
            warn!(step = index + 1, error = %e, "replayed unit was cut short");
            let unit = CommandEncoder.encode(&logger.input()[index]);
            reports.push(DataReport::from_core(&e, unit));
        }
        steps += 1;
    }

    let state_hash = state.state_hash();
    ReplayOutcome {
        steps,
        reports,
        state,
        state_hash,
    }
}

/// Load `path` and replay it onto `initial`.
pub fn replay_log_file(
    path: impl AsRef<Path>,
    initial: GameState,
    config: &LoggerConfig,
) -> Result<ReplayOutcome, anyhow::Error> {
    let lines = load_log_file(path)?;
    Ok(replay_lines(initial, lines, config))
}
