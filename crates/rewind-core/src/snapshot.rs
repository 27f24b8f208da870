//! Board snapshots with BLAKE3 content hashing.
//!
//! Two peers that executed the same units from the same starting board must
//! end with the same [`GameState::state_hash`]. Replays and tests use this
//! to check convergence without comparing boards field by field.
//!
//! # Usage
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let mut state = GameState::new();
//! state.spawn_piece(PieceState::named("Scout"), Location::new("Main", 0, 0));
//!
//! let snapshot = BoardSnapshot::capture(&state);
//! assert_eq!(snapshot.hash.len(), 64); // BLAKE3 hex digest
//! assert!(snapshot.verify());
//! ```
//!
//! # What Is NOT Hashed
//!
//! - **Triggers**: key-command macros are module definition, not state, and
//!   are skipped by serialization.

use serde::{Deserialize, Serialize};

use crate::board::GameState;

impl GameState {
    /// BLAKE3 hex digest of the serialized board.
    pub fn state_hash(&self) -> String {
        let json_bytes =
            serde_json::to_vec(self).expect("GameState should always be JSON-serializable");
        blake3::hash(&json_bytes).to_hex().to_string()
    }
}

/// A serializable copy of the board together with its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub state: GameState,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `state`.
    pub hash: String,
}

impl BoardSnapshot {
    pub fn capture(state: &GameState) -> Self {
        Self {
            state: state.clone(),
            hash: state.state_hash(),
        }
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> bool {
        self.state.state_hash() == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Location, PieceState};

    #[test]
    fn identical_boards_hash_identically() {
        let mut a = GameState::new();
        let mut b = GameState::new();
        for state in [&mut a, &mut b] {
            state.spawn_piece(PieceState::named("A"), Location::new("Main", 0, 0));
            state.push_chat("hello");
        }
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn hash_changes_with_state() {
        let mut state = GameState::new();
        let id = state.spawn_piece(PieceState::named("A"), Location::new("Main", 0, 0));
        let before = state.state_hash();
        state.set_location(id, Location::new("Main", 1, 0)).unwrap();
        assert_ne!(before, state.state_hash());
    }

    #[test]
    fn tampered_snapshot_fails_verification() {
        let mut state = GameState::new();
        state.push_chat("original");
        let mut snapshot = BoardSnapshot::capture(&state);
        assert!(snapshot.verify());
        snapshot.state.push_chat("forged");
        assert!(!snapshot.verify());
    }

    #[test]
    fn snapshot_survives_json() {
        let mut state = GameState::new();
        state.spawn_piece(PieceState::named("A"), Location::new("Main", 2, 3));
        let snapshot = BoardSnapshot::capture(&state);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert!(back.verify());
        assert_eq!(back.state, state);
    }
}
