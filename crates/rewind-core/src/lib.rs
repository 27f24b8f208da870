//! Rewind core -- invertible command units for logged, replayable boards.
//!
//! This crate provides the mutation model shared by every participant of a
//! game session. All state changes after setup are expressed as
//! [`Command`](command::Command) units that can be composed, executed,
//! inverted, and encoded to a line-safe wire form.
//!
//! # Quick Start
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let mut state = GameState::new();
//! let guard = RecursionGuard::default();
//! let id = state.spawn_piece(PieceState::named("Scout"), Location::new("Main", 0, 0));
//!
//! // Mutate, capture the change, and ship it.
//! let change = ChangeTracker::track(&mut state, id, |s| {
//!     s.piece_mut(id).unwrap().location = Location::new("Main", 1, 1);
//! });
//! let wire = CommandEncoder.encode(&change);
//!
//! // A peer decodes and executes the same unit.
//! let mut peer = GameState::new();
//! peer.spawn_piece(PieceState::named("Scout"), Location::new("Main", 0, 0));
//! CommandEncoder.decode(&wire).unwrap().execute(&mut peer, &guard).unwrap();
//! assert_eq!(peer.state_hash(), state.state_hash());
//! ```

#![deny(unsafe_code)]

pub mod board;
pub mod codec;
pub mod command;
pub mod guard;
pub mod piece;
pub mod snapshot;
pub mod tracker;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building or executing units.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The piece does not exist on the board.
    #[error("piece {piece} does not exist")]
    MissingPiece { piece: piece::PieceId },

    /// An `AddPiece` named an id already held by a different piece. The
    /// existing piece is kept.
    #[error("piece {piece} already exists with different contents")]
    PieceConflict { piece: piece::PieceId },

    /// A triggered chain ran deeper than the guard allows.
    #[error("recursion limit of {limit} exceeded by {actor} (chain: {chain})")]
    RecursionLimit {
        limit: usize,
        actor: String,
        chain: String,
    },

    /// An encoded unit could not be decoded.
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::board::GameState;
    pub use crate::codec::{CodecError, CommandEncoder, COMMAND_SEPARATOR};
    pub use crate::command::{Command, Effect};
    pub use crate::guard::{ChainMark, ExecutionScope, Loopable, RecursionGuard, DEFAULT_RECURSION_LIMIT};
    pub use crate::piece::{Location, Movement, Piece, PieceId, PieceState};
    pub use crate::snapshot::BoardSnapshot;
    pub use crate::tracker::ChangeTracker;
    pub use crate::CoreError;
}
