//! The log orchestrator: one ordered record of everything applied.
//!
//! [`BasicLogger`] multiplexes three sources of mutation into a single
//! output log:
//!
//! - **Replay**: [`step`](BasicLogger::step) applies the next unit of the
//!   input log (a saved file or a session history received on join).
//! - **Local**: [`log`](BasicLogger::log) applies a unit that originated
//!   here or arrived from a peer.
//! - **Undo**: [`undo`](BasicLogger::undo) applies an undo marker for the
//!   most recent forward entry not yet undone.
//!
//! The output log is append-only. Undo never deletes; it appends a marker,
//! so the output is a full audit trail and replaying it on another board
//! reproduces this one exactly.
//!
//! # Undo targets
//!
//! Forward entries (replayed and local, undo markers received from peers
//! included) are kept on a stack of output indices. `undo` pops the top.
//! Undo markers this logger appends are never pushed, so repeated undo walks
//! back through history and an extra undo past the beginning does nothing.
//!
//! Undoing a *replayed* entry also rewinds the input cursor to it, so the
//! next [`step`](BasicLogger::step) re-applies it (redo by stepping).
//! Undoing a local entry leaves the cursor alone.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//! use rewind_engine::logger::{BasicLogger, LoggerConfig};
//!
//! let mut state = GameState::new();
//! let mut logger = BasicLogger::new(LoggerConfig::default());
//! logger.set_input(vec![Command::display_text("A"), Command::display_text("B")]);
//!
//! while logger.step(&mut state).unwrap() {}
//! logger.undo(&mut state).unwrap();
//!
//! assert_eq!(logger.output().len(), 3);
//! assert!(logger.is_replaying()); // B can be stepped again
//! ```

use std::fmt;

use rewind_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::report::DataReport;

// ---------------------------------------------------------------------------
// LoggerConfig
// ---------------------------------------------------------------------------

/// Construction-time settings for a [`BasicLogger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Deepest trigger chain a single unit may set off.
    pub max_recursion_depth: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_RECURSION_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// Where an output entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Replayed from the given input index.
    Input(usize),
    /// Passed to [`BasicLogger::log`].
    Local,
    /// Appended by [`BasicLogger::undo`].
    Undo,
}

/// One applied unit in the output log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub command: Command,
    pub origin: Origin,
}

// ---------------------------------------------------------------------------
// LoggerState / UndoOutcome / LoadSummary
// ---------------------------------------------------------------------------

/// Replay state, derived entirely from the input cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// No input log loaded.
    Idle,
    /// Input units remain to be stepped.
    Replaying,
    /// The cursor is at the end of a non-empty input log.
    Exhausted,
}

impl fmt::Display for LoggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoggerState::Idle => "idle",
            LoggerState::Replaying => "replaying",
            LoggerState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// What a call to [`BasicLogger::undo`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// Nothing left to undo; the output log is unchanged.
    NothingToUndo,
    /// A marker was appended and the target was reversed.
    Undone,
    /// A marker was appended but the target had no inverse, so the board is
    /// unchanged.
    NoInverse,
}

/// Result of [`BasicLogger::load_input`].
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Units now in the input log.
    pub loaded: usize,
    /// One report per line that failed to decode.
    pub reports: Vec<DataReport>,
}

impl LoadSummary {
    pub fn skipped(&self) -> usize {
        self.reports.len()
    }
}

// ---------------------------------------------------------------------------
// BasicLogger
// ---------------------------------------------------------------------------

/// Input log, output log, input cursor, and undo bookkeeping.
#[derive(Debug)]
pub struct BasicLogger {
    log_input: Vec<Command>,
    log_output: Vec<LogEntry>,
    next_input: usize,
    /// Output indices of forward entries not yet undone, oldest first.
    undo_stack: Vec<usize>,
    guard: RecursionGuard,
}

impl BasicLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            log_input: Vec::new(),
            log_output: Vec::new(),
            next_input: 0,
            undo_stack: Vec::new(),
            guard: RecursionGuard::new(config.max_recursion_depth),
        }
    }

    // -- input --------------------------------------------------------------

    /// Replace the input log and rewind the cursor.
    ///
    /// Output entries already replayed from the previous input keep their
    /// place in history but are re-labelled [`Origin::Local`], so undoing
    /// them no longer moves the new cursor.
    pub fn set_input(&mut self, commands: Vec<Command>) {
        for entry in &mut self.log_output {
            if let Origin::Input(_) = entry.origin {
                entry.origin = Origin::Local;
            }
        }
        self.log_input = commands;
        self.next_input = 0;
        debug!(units = self.log_input.len(), "input log loaded");
    }

    /// Decode `lines` and install them as the input log.
    ///
    /// Empty lines are ignored. Lines that fail to decode are skipped and
    /// reported with their 1-based line number; replay continues without
    /// them.
    pub fn load_input<I, S>(&mut self, lines: I) -> LoadSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encoder = CommandEncoder;
        let mut commands = Vec::new();
        let mut reports = Vec::new();

        for (index, line) in lines.into_iter().enumerate() {
            let line = line.as_ref().trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match encoder.decode(line) {
                Ok(command) if command.is_null() => {}
                Ok(command) => commands.push(command),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "skipping undecodable log entry");
                    reports.push(DataReport::bad_data(e.to_string(), line).at_line(index + 1));
                }
            }
        }

        let loaded = commands.len();
        self.set_input(commands);
        LoadSummary { loaded, reports }
    }

    pub fn input(&self) -> &[Command] {
        &self.log_input
    }

    /// Index of the next input unit [`step`](Self::step) will apply.
    pub fn next_input(&self) -> usize {
        self.next_input
    }

    /// `true` while input units remain.
    pub fn is_replaying(&self) -> bool {
        self.next_input < self.log_input.len()
    }

    pub fn remaining(&self) -> usize {
        self.log_input.len().saturating_sub(self.next_input)
    }

    pub fn state(&self) -> LoggerState {
        if self.log_input.is_empty() {
            LoggerState::Idle
        } else if self.is_replaying() {
            LoggerState::Replaying
        } else {
            LoggerState::Exhausted
        }
    }

    // -- operations ---------------------------------------------------------

    /// Apply the next input unit.
    ///
    /// Returns `Ok(false)` without touching anything when no input remains.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecursionLimit`] if the unit set off a runaway
    /// trigger chain. The unit is still recorded and the cursor still
    /// advances, because the effects applied before the abort remain on the
    /// board.
    pub fn step(&mut self, state: &mut GameState) -> Result<bool, CoreError> {
        let Some(command) = self.log_input.get(self.next_input).cloned() else {
            debug!("step ignored: nothing left to replay");
            return Ok(false);
        };
        let index = self.next_input;
        self.next_input += 1;
        trace!(index, command = %command, "step");

        let result = command.execute(state, &self.guard);
        self.record(command, Origin::Input(index));
        result.map(|()| true)
    }

    /// Apply a unit that did not come from the input log.
    ///
    /// Null units are ignored. The input cursor is unaffected.
    ///
    /// # Errors
    ///
    /// As for [`step`](Self::step): the unit is recorded even when a
    /// trigger chain inside it is aborted.
    pub fn log(&mut self, state: &mut GameState, command: Command) -> Result<(), CoreError> {
        if command.is_null() {
            debug!("log ignored: null unit");
            return Ok(());
        }
        trace!(command = %command, "log");
        let result = command.execute(state, &self.guard);
        self.record(command, Origin::Local);
        result
    }

    /// Reverse the most recent forward entry not yet undone.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecursionLimit`] if reversing the target set off
    /// a runaway trigger chain. The marker is recorded regardless.
    pub fn undo(&mut self, state: &mut GameState) -> Result<UndoOutcome, CoreError> {
        let Some(target_index) = self.undo_stack.pop() else {
            debug!("undo ignored: nothing to undo");
            return Ok(UndoOutcome::NothingToUndo);
        };
        let entry = &self.log_output[target_index];
        let original = entry.command.clone();
        if let Origin::Input(index) = entry.origin {
            self.next_input = index;
        }

        let outcome = if original.has_inverse() {
            UndoOutcome::Undone
        } else {
            warn!(command = %original, "undo target has no inverse, recording inert marker");
            UndoOutcome::NoInverse
        };

        let marker = Command::undo_of(original);
        trace!(entry = target_index, command = %marker, "undo");
        let result = marker.execute(state, &self.guard);
        self.record(marker, Origin::Undo);
        result.map(|()| outcome)
    }

    fn record(&mut self, command: Command, origin: Origin) {
        if origin != Origin::Undo {
            self.undo_stack.push(self.log_output.len());
        }
        self.log_output.push(LogEntry { command, origin });
    }

    /// Forget all input, output, and undo history.
    pub fn reset(&mut self) {
        self.log_input.clear();
        self.log_output.clear();
        self.undo_stack.clear();
        self.next_input = 0;
    }

    // -- output -------------------------------------------------------------

    /// The output log in applied order.
    pub fn output(&self) -> &[LogEntry] {
        &self.log_output
    }

    /// Output units without their origins.
    pub fn output_commands(&self) -> impl Iterator<Item = &Command> {
        self.log_output.iter().map(|e| &e.command)
    }

    /// The output log encoded one unit per element, ready to save.
    pub fn encoded_output(&self) -> Vec<String> {
        let encoder = CommandEncoder;
        self.log_output
            .iter()
            .map(|e| encoder.encode(&e.command))
            .collect()
    }

    /// Forward entries still available to [`undo`](Self::undo).
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// The unit the next [`undo`](Self::undo) would reverse.
    pub fn undo_target(&self) -> Option<&Command> {
        self.undo_stack
            .last()
            .map(|&index| &self.log_output[index].command)
    }

    pub fn guard(&self) -> &RecursionGuard {
        &self.guard
    }
}

impl Default for BasicLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
