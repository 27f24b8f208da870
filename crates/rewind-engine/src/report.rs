//! Journal of non-fatal data problems.
//!
//! Nothing the orchestrator or session encounters at runtime is fatal. A
//! malformed log line is skipped and a runaway trigger chain is aborted. A
//! piece added under an id that is already taken is refused, and an undo
//! with no inverse does nothing. Each of these is recorded here as a
//! [`DataReport`] so the host can surface it to the player.
//!
//! # Query API
//!
//! - **Kind**: [`ReportJournal::reports_of_kind`]
//! - **All**: [`ReportJournal::all_reports`]
//!
//! # Example
//!
//! ```
//! use rewind_engine::report::{DataReport, ReportJournal, ReportKind};
//!
//! let mut journal = ReportJournal::new();
//! journal.record(DataReport::bad_data("unknown record tag 'WARP'", "WARP\t1").at_line(3));
//!
//! assert_eq!(journal.len(), 1);
//! assert_eq!(journal.reports_of_kind(ReportKind::BadData).count(), 1);
//! ```

use std::fmt;

use rewind_core::CoreError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ReportKind
// ---------------------------------------------------------------------------

/// Category of a recorded problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// Encoded data could not be decoded and was skipped.
    BadData,
    /// A triggered chain hit the recursion bound and was aborted.
    RecursionLimit,
    /// An undo target had no inverse; an inert marker was recorded.
    InverseUnavailable,
    /// The transport refused to send a unit.
    Transport,
    /// A piece was added under an id held by a different piece; the
    /// existing piece was kept.
    PieceConflict,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::BadData => "bad data",
            ReportKind::RecursionLimit => "recursion limit",
            ReportKind::InverseUnavailable => "inverse unavailable",
            ReportKind::Transport => "transport",
            ReportKind::PieceConflict => "piece conflict",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// DataReport
// ---------------------------------------------------------------------------

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataReport {
    pub kind: ReportKind,
    /// Human-readable description.
    pub message: String,
    /// The offending data (an encoded unit, a chain summary), if any.
    pub data: String,
    /// 1-based line number when the data came from a log file.
    pub line: Option<usize>,
}

impl DataReport {
    pub fn new(kind: ReportKind, message: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: data.into(),
            line: None,
        }
    }

    pub fn bad_data(message: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(ReportKind::BadData, message, data)
    }

    /// Report a failed execution of the unit encoded as `unit`.
    pub fn from_core(error: &CoreError, unit: impl Into<String>) -> Self {
        let kind = match error {
            CoreError::RecursionLimit { .. } => ReportKind::RecursionLimit,
            CoreError::PieceConflict { .. } => ReportKind::PieceConflict,
            CoreError::MissingPiece { .. } | CoreError::Codec(_) => ReportKind::BadData,
        };
        Self::new(kind, error.to_string(), unit)
    }

    /// Attach a 1-based source line.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for DataReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {line}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportJournal
// ---------------------------------------------------------------------------

/// Accumulates [`DataReport`]s in the order they happened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportJournal {
    reports: Vec<DataReport>,
}

impl ReportJournal {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    pub fn record(&mut self, report: DataReport) {
        self.reports.push(report);
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// All reports in insertion order.
    pub fn all_reports(&self) -> &[DataReport] {
        &self.reports
    }

    pub fn reports_of_kind(&self, kind: ReportKind) -> impl Iterator<Item = &DataReport> {
        self.reports.iter().filter(move |r| r.kind == kind)
    }

    /// Move every report out, leaving the journal empty.
    pub fn drain(&mut self) -> Vec<DataReport> {
        std::mem::take(&mut self.reports)
    }
}

impl Extend<DataReport> for ReportJournal {
    fn extend<I: IntoIterator<Item = DataReport>>(&mut self, iter: I) {
        self.reports.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_by_kind() {
        let mut journal = ReportJournal::new();
        journal.record(DataReport::bad_data("bad", "X"));
        journal.record(DataReport::new(ReportKind::Transport, "offline", ""));
        journal.record(DataReport::bad_data("worse", "Y").at_line(7));

        let bad: Vec<_> = journal.reports_of_kind(ReportKind::BadData).collect();
        assert_eq!(bad.len(), 2);
        assert_eq!(bad[1].line, Some(7));
        assert_eq!(journal.reports_of_kind(ReportKind::RecursionLimit).count(), 0);
    }

    #[test]
    fn core_errors_map_to_kinds() {
        let conflict = CoreError::PieceConflict {
            piece: rewind_core::piece::PieceId(3),
        };
        let report = DataReport::from_core(&conflict, "ADD\t3");
        assert_eq!(report.kind, ReportKind::PieceConflict);
        assert_eq!(report.data, "ADD\t3");

        let runaway = CoreError::RecursionLimit {
            limit: 5,
            actor: "loop".to_owned(),
            chain: "a -> b".to_owned(),
        };
        assert_eq!(DataReport::from_core(&runaway, "").kind, ReportKind::RecursionLimit);
    }

    #[test]
    fn clear_and_drain() {
        let mut journal = ReportJournal::new();
        journal.record(DataReport::bad_data("bad", "X"));
        let drained = journal.drain();
        assert_eq!(drained.len(), 1);
        assert!(journal.is_empty());

        journal.extend(drained);
        assert_eq!(journal.len(), 1);
        journal.clear();
        assert!(journal.is_empty());
    }

    #[test]
    fn display_includes_line() {
        let report = DataReport::bad_data("unknown record tag 'WARP'", "WARP").at_line(3);
        assert_eq!(report.to_string(), "bad data (line 3): unknown record tag 'WARP'");
        let report = DataReport::new(ReportKind::Transport, "offline", "");
        assert_eq!(report.to_string(), "transport: offline");
    }
}
