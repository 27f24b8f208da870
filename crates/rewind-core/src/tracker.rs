//! Before/after diffing of a single piece.
//!
//! Game logic that mutates a piece directly brackets the mutation with a
//! [`ChangeTracker`]: snapshot first, mutate, then ask the tracker for the
//! [`Command`] that reproduces (and can reverse) what happened.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let mut state = GameState::new();
//! let id = state.spawn_piece(PieceState::named("Tank"), Location::new("Main", 0, 0));
//!
//! let tracker = ChangeTracker::new(&state, id);
//! state.piece_mut(id).unwrap().state.set_property("Damaged", "true");
//! let change = tracker.capture_changes(&state);
//!
//! assert!(change.has_inverse());
//! assert_eq!(change.len(), 1);
//! ```

use crate::board::GameState;
use crate::command::{Command, Effect};
use crate::piece::{Piece, PieceId};

/// Snapshot of one piece taken before a mutation.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    id: PieceId,
    before: Option<Piece>,
}

impl ChangeTracker {
    /// Record the current state of `id`. A piece that does not exist yet is
    /// recorded as absent, so creating it shows up as an `AddPiece`.
    pub fn new(state: &GameState, id: PieceId) -> Self {
        Self {
            id,
            before: state.piece(id).cloned(),
        }
    }

    pub fn piece(&self) -> PieceId {
        self.id
    }

    /// Whether the piece differs from the snapshot.
    pub fn is_changed(&self, state: &GameState) -> bool {
        self.before.as_ref() != state.piece(self.id)
    }

    /// The unit that turns the snapshot into the current piece.
    ///
    /// Returns [`Command::Null`] when nothing changed. A state change and a
    /// location change on the same piece come back as two leaves, state
    /// first.
    pub fn capture_changes(self, state: &GameState) -> Command {
        let after = state.piece(self.id);
        match (self.before, after) {
            (None, None) => Command::Null,
            (None, Some(piece)) => Command::from(Effect::AddPiece {
                id: self.id,
                state: piece.state.clone(),
                location: piece.location.clone(),
            }),
            (Some(before), None) => Command::from(Effect::RemovePiece {
                id: self.id,
                state: Some(before.state),
                location: Some(before.location),
            }),
            (Some(before), Some(after)) => {
                let mut change = Command::Null;
                if before.state != after.state {
                    change = change.append(Command::from(Effect::ChangePiece {
                        id: self.id,
                        old: Some(before.state),
                        new: after.state.clone(),
                    }));
                }
                if before.location != after.location {
                    change = change.append(Command::from(Effect::MovePiece {
                        id: self.id,
                        from: Some(before.location),
                        to: after.location.clone(),
                    }));
                }
                change
            }
        }
    }

    /// Run `mutate` inside a tracker bracket for `id` and return the
    /// captured change.
    pub fn track<F>(state: &mut GameState, id: PieceId, mutate: F) -> Command
    where
        F: FnOnce(&mut GameState),
    {
        let tracker = Self::new(state, id);
        mutate(state);
        tracker.capture_changes(state)
    }
}
