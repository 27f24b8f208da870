//! Rewind engine -- log orchestration, sessions, and replay for a shared board.
//!
//! This crate builds on [`rewind_core`] to provide the session driver: a
//! [`BasicLogger`](logger::BasicLogger) that multiplexes replayed, local, and
//! undone units into one output log, a channel-fed
//! [`Session`](session::Session) that pairs every send with a log, and log
//! file persistence that proves a saved game replays to the same board.
//!
//! # Quick Start
//!
//! ```
//! use rewind_engine::prelude::*;
//!
//! let (transport, _sent) = LoopbackTransport::new();
//! let mut start = GameState::new();
//! let tank = start.spawn_piece(PieceState::named("Tank"), Location::new("Main", 0, 0));
//!
//! let mut session = Session::new(start.clone(), Box::new(transport), SessionConfig::default());
//! session
//!     .perform(|state| move_piece(state, tank, Location::new("Main", 1, 0)))
//!     .unwrap();
//! session.undo().unwrap();
//!
//! let outcome = replay_lines(start, session.logger().encoded_output(), &LoggerConfig::default());
//! assert!(outcome.matches(&session.state().state_hash()));
//! ```

#![deny(unsafe_code)]

pub mod actions;
pub mod dice;
pub mod logfile;
pub mod logger;
pub mod report;
pub mod session;

/// Re-export the core crate for convenience.
pub use rewind_core;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Executing a unit failed (a trigger chain was aborted, or an added
    /// piece collided with another).
    #[error(transparent)]
    Core(#[from] rewind_core::CoreError),

    /// Encoded data could not be decoded.
    #[error(transparent)]
    Codec(#[from] rewind_core::codec::CodecError),

    /// The transport refused a unit.
    #[error(transparent)]
    Transport(#[from] session::TransportError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the core prelude.
    pub use rewind_core::prelude::*;

    pub use crate::actions::{
        delete_piece, mark_all_unmoved, move_piece, place_marker, set_moved, MarkerSpec,
        MOVED_PROPERTY, PARENT_ID_PROPERTY,
    };
    pub use crate::dice::{DiceRoll, DiceRoller};
    pub use crate::logfile::{
        load_log_file, replay_lines, replay_log_file, save_log_file, ReplayOutcome,
    };
    pub use crate::logger::{
        BasicLogger, LoadSummary, LogEntry, LoggerConfig, LoggerState, Origin, UndoOutcome,
    };
    pub use crate::report::{DataReport, ReportJournal, ReportKind};
    pub use crate::session::{
        Delivery, LoopbackTransport, PeerTransport, Session, SessionConfig, SessionHandle,
        Transport, TransportError,
    };
    pub use crate::EngineError;
}
