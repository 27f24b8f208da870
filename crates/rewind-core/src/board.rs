//! The mutable game board that commands execute against.
//!
//! [`GameState`] holds every piece, the chat transcript, and the trigger
//! table. All state-changing entry points used by effects write absolute
//! values, so executing the same effect twice leaves the board as executing
//! it once (chat lines excepted: they append).
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let mut state = GameState::new();
//! let id = state.spawn_piece(PieceState::named("Scout"), Location::new("Main", 0, 0));
//!
//! state.set_location(id, Location::new("Main", 3, 4)).unwrap();
//! assert_eq!(state.piece(id).unwrap().location, Location::new("Main", 3, 4));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::piece::{Location, Piece, PieceId, PieceState};
use crate::CoreError;

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The full observable game state.
///
/// Pieces live in a `BTreeMap` so iteration and serialization order are
/// deterministic, which is what makes [`state_hash`](Self::state_hash)
/// comparable across peers and replays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameState {
    pieces: BTreeMap<PieceId, Piece>,
    chat: Vec<String>,
    /// Next serial handed out by [`allocate_id`](Self::allocate_id). Shared
    /// by every namespace and bumped past every inserted id, so peers that
    /// have seen the same pieces agree on it.
    next_id: u64,
    /// Namespace of ids this participant allocates. A local setting, not
    /// part of the shared state.
    #[serde(skip)]
    id_namespace: u16,
    /// Key-command macros, keyed by `(piece, key)`. Part of the module
    /// definition rather than the persistent state, so not serialized.
    #[serde(skip)]
    triggers: BTreeMap<(PieceId, String), Command>,
    /// Macros shared by every piece with a given name, keyed by
    /// `(name, key)`. Consulted when no per-piece macro matches.
    #[serde(skip)]
    named_triggers: BTreeMap<(String, String), Command>,
}

impl GameState {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    // -- pieces -------------------------------------------------------------

    /// Set the namespace future [`allocate_id`](Self::allocate_id) calls
    /// draw from. Each participant of a session needs its own.
    pub fn set_id_namespace(&mut self, namespace: u16) {
        self.id_namespace = namespace;
    }

    pub fn id_namespace(&self) -> u16 {
        self.id_namespace
    }

    /// Hand out a fresh piece id in this board's namespace.
    pub fn allocate_id(&mut self) -> PieceId {
        let id = PieceId::new(self.id_namespace, self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// The serial the next [`allocate_id`](Self::allocate_id) will use.
    pub fn next_serial(&self) -> u64 {
        self.next_id
    }

    /// Put the allocator back to an earlier [`next_serial`](Self::next_serial),
    /// for abandoning an action whose ids were never published.
    pub fn restore_next_serial(&mut self, serial: u64) {
        self.next_id = serial;
    }

    /// Allocate an id and place a new piece in one call. Intended for board
    /// setup; gameplay adds pieces through `AddPiece` effects.
    pub fn spawn_piece(&mut self, state: PieceState, location: Location) -> PieceId {
        let id = self.allocate_id();
        self.insert_piece(id, state, location);
        id
    }

    /// Insert or overwrite the piece with `id`.
    ///
    /// The id allocator is bumped past the serial of `id`, so every peer
    /// that has seen the same pieces allocates from the same serial.
    pub fn insert_piece(&mut self, id: PieceId, state: PieceState, location: Location) {
        if id.serial() >= self.next_id {
            self.next_id = id.serial().saturating_add(1);
        }
        self.pieces.insert(
            id,
            Piece {
                id,
                state,
                location,
            },
        );
    }

    /// Remove a piece, returning it if it existed.
    pub fn remove_piece(&mut self, id: PieceId) -> Option<Piece> {
        self.pieces.remove(&id)
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    /// Mutable access for game logic that mutates inside a
    /// [`ChangeTracker`](crate::tracker::ChangeTracker) bracket.
    pub fn piece_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.pieces.get_mut(&id)
    }

    /// Overwrite the persistent state of an existing piece.
    pub fn set_piece_state(&mut self, id: PieceId, state: PieceState) -> Result<(), CoreError> {
        let piece = self
            .pieces
            .get_mut(&id)
            .ok_or(CoreError::MissingPiece { piece: id })?;
        piece.state = state;
        Ok(())
    }

    /// Move an existing piece.
    pub fn set_location(&mut self, id: PieceId, location: Location) -> Result<(), CoreError> {
        let piece = self
            .pieces
            .get_mut(&id)
            .ok_or(CoreError::MissingPiece { piece: id })?;
        piece.location = location;
        Ok(())
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.pieces.contains_key(&id)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Iterate pieces in id order.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.values()
    }

    /// Ids of all pieces currently at `location`, in id order.
    pub fn pieces_at<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = PieceId> + 'a {
        self.pieces
            .values()
            .filter(move |p| &p.location == location)
            .map(|p| p.id)
    }

    // -- chat ---------------------------------------------------------------

    pub fn push_chat(&mut self, text: &str) {
        self.chat.push(text.to_owned());
    }

    /// The chat transcript in display order.
    pub fn chat(&self) -> &[String] {
        &self.chat
    }

    // -- triggers -----------------------------------------------------------

    /// Register the macro that a `Trigger { piece, key }` effect executes.
    pub fn set_trigger(&mut self, piece: PieceId, key: &str, command: Command) {
        self.triggers.insert((piece, key.to_owned()), command);
    }

    /// Register a macro for every piece named `name`, including pieces
    /// created later by other participants.
    pub fn set_named_trigger(&mut self, name: &str, key: &str, command: Command) {
        self.named_triggers
            .insert((name.to_owned(), key.to_owned()), command);
    }

    /// The macro for `(piece, key)`: the per-piece entry if present,
    /// otherwise the entry for the piece's name.
    pub fn trigger(&self, piece: PieceId, key: &str) -> Option<&Command> {
        self.triggers.get(&(piece, key.to_owned())).or_else(|| {
            let name = &self.pieces.get(&piece)?.state.name;
            self.named_triggers.get(&(name.clone(), key.to_owned()))
        })
    }
}

/// Equality covers the board and the trigger tables. The id namespace is a
/// per-participant setting, so two peers holding the same board compare
/// equal.
impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.chat == other.chat
            && self.next_id == other.next_id
            && self.triggers == other.triggers
            && self.named_triggers == other.named_triggers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: i32, y: i32) -> Location {
        Location::new("Main", x, y)
    }

    #[test]
    fn spawn_allocates_sequential_ids() {
        let mut state = GameState::new();
        let a = state.spawn_piece(PieceState::named("A"), loc(0, 0));
        let b = state.spawn_piece(PieceState::named("B"), loc(1, 0));
        assert_eq!(a, PieceId(0));
        assert_eq!(b, PieceId(1));
        assert_eq!(state.piece_count(), 2);
    }

    #[test]
    fn insert_bumps_allocator_past_remote_id() {
        let mut state = GameState::new();
        state.insert_piece(PieceId(40), PieceState::named("Remote"), loc(0, 0));
        assert_eq!(state.allocate_id(), PieceId(41));
    }

    #[test]
    fn namespaces_allocate_disjoint_ids_from_shared_serial() {
        let mut alice = GameState::new();
        alice.spawn_piece(PieceState::named("Tank"), loc(0, 0));
        let mut bob = alice.clone();
        alice.set_id_namespace(1);
        bob.set_id_namespace(2);

        let a = alice.allocate_id();
        let b = bob.allocate_id();
        assert_ne!(a, b);
        assert_eq!(a.serial(), b.serial());

        alice.insert_piece(a, PieceState::named("Flag"), loc(1, 0));
        bob.insert_piece(b, PieceState::named("Smoke"), loc(1, 0));
        alice.insert_piece(b, PieceState::named("Smoke"), loc(1, 0));
        bob.insert_piece(a, PieceState::named("Flag"), loc(1, 0));
        assert_eq!(alice, bob);
        assert_eq!(alice.state_hash(), bob.state_hash());
    }

    #[test]
    fn restore_next_serial_rewinds_allocator() {
        let mut state = GameState::new();
        let mark = state.next_serial();
        state.allocate_id();
        state.allocate_id();
        state.restore_next_serial(mark);
        assert_eq!(state, GameState::new());
    }

    #[test]
    fn insert_overwrites_existing_piece() {
        let mut state = GameState::new();
        state.insert_piece(PieceId(1), PieceState::named("Old"), loc(0, 0));
        state.insert_piece(PieceId(1), PieceState::named("New"), loc(2, 2));
        assert_eq!(state.piece_count(), 1);
        let piece = state.piece(PieceId(1)).unwrap();
        assert_eq!(piece.state.name, "New");
        assert_eq!(piece.location, loc(2, 2));
    }

    #[test]
    fn set_state_on_missing_piece_fails() {
        let mut state = GameState::new();
        let err = state
            .set_piece_state(PieceId(9), PieceState::named("X"))
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingPiece { piece: PieceId(9) }));
        assert!(state.set_location(PieceId(9), loc(0, 0)).is_err());
    }

    #[test]
    fn remove_returns_piece() {
        let mut state = GameState::new();
        let id = state.spawn_piece(PieceState::named("A"), loc(0, 0));
        let removed = state.remove_piece(id).unwrap();
        assert_eq!(removed.state.name, "A");
        assert!(!state.contains(id));
        assert!(state.remove_piece(id).is_none());
    }

    #[test]
    fn pieces_at_filters_by_location() {
        let mut state = GameState::new();
        let a = state.spawn_piece(PieceState::named("A"), loc(1, 1));
        let _b = state.spawn_piece(PieceState::named("B"), loc(2, 2));
        let c = state.spawn_piece(PieceState::named("C"), loc(1, 1));
        let here = loc(1, 1);
        let ids: Vec<_> = state.pieces_at(&here).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn named_trigger_is_fallback() {
        let mut state = GameState::new();
        let a = state.spawn_piece(PieceState::named("Marker"), loc(0, 0));
        let b = state.spawn_piece(PieceState::named("Marker"), loc(1, 0));
        state.set_named_trigger("Marker", "flip", Command::display_text("named"));
        state.set_trigger(b, "flip", Command::display_text("own"));

        assert_eq!(state.trigger(a, "flip"), Some(&Command::display_text("named")));
        assert_eq!(state.trigger(b, "flip"), Some(&Command::display_text("own")));
        assert!(state.trigger(PieceId(99), "flip").is_none());
    }

    #[test]
    fn triggers_are_not_serialized() {
        let mut state = GameState::new();
        let id = state.spawn_piece(PieceState::named("A"), loc(0, 0));
        state.set_trigger(id, "flip", Command::null());
        assert!(state.trigger(id, "flip").is_some());

        let json = serde_json::to_string(&state).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();
        assert!(restored.trigger(id, "flip").is_none());
        assert_eq!(restored.piece(id), state.piece(id));
    }
}
