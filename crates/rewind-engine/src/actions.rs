//! Game actions that originate commands.
//!
//! Each action mutates the board directly, the way a player's drag or key
//! press does, and returns the [`Command`] that describes what happened.
//! Piece changes are captured with a [`ChangeTracker`] and are set-style, so
//! executing the returned unit again on this board (as
//! [`Session::send_and_log`](crate::session::Session::send_and_log) does) is
//! harmless. Chat lines and triggers are *not* applied here; they run once,
//! when the unit is logged.

use rewind_core::prelude::*;
use tracing::{debug, warn};

/// Property set to `"true"` on a piece once it has moved this turn.
pub const MOVED_PROPERTY: &str = "Moved";

/// Property a placed marker carries naming the piece that placed it.
pub const PARENT_ID_PROPERTY: &str = "ParentID";

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Move `id` to `to` and flag it as moved.
///
/// Returns the null unit if the piece is missing, immobilized, or already
/// at `to`.
pub fn move_piece(state: &mut GameState, id: PieceId, to: Location) -> Command {
    let Some(piece) = state.piece(id) else {
        warn!(piece = %id, "move ignored: piece not on board");
        return Command::null();
    };
    if piece.state.movement == Movement::Never {
        debug!(piece = %id, "move ignored: piece is immobilized");
        return Command::null();
    }
    if piece.location == to {
        return Command::null();
    }

    let from = piece.location.clone();
    let moved = ChangeTracker::track(state, id, |s| {
        if let Some(p) = s.piece_mut(id) {
            p.location = to.clone();
        }
    });
    debug!(piece = %id, %from, %to, "piece moved");
    moved.append(set_moved(state, id, true))
}

/// Set or clear the moved flag on one piece.
pub fn set_moved(state: &mut GameState, id: PieceId, moved: bool) -> Command {
    let value = if moved { "true" } else { "false" };
    ChangeTracker::track(state, id, |s| {
        if let Some(p) = s.piece_mut(id) {
            p.state.set_property(MOVED_PROPERTY, value);
        }
    })
}

/// Clear the moved flag on every piece that carries it.
pub fn mark_all_unmoved(state: &mut GameState) -> Command {
    let moved: Vec<PieceId> = state
        .pieces()
        .filter(|p| p.state.property(MOVED_PROPERTY) == Some("true"))
        .map(|p| p.id)
        .collect();
    Command::sequence(moved.into_iter().map(|id| set_moved(state, id, false)))
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// What [`place_marker`] creates.
#[derive(Debug, Clone, Default)]
pub struct MarkerSpec {
    /// State of the new piece. `ParentID` is added automatically.
    pub state: PieceState,
    /// Horizontal offset from the parent.
    pub x_offset: i32,
    /// Vertical offset from the parent, positive meaning up.
    pub y_offset: i32,
    /// Key fired on the new marker once it is placed.
    pub after_burner: Option<String>,
    /// Chat line announcing the placement.
    pub report: Option<String>,
}

/// Place a new marker next to `parent`.
///
/// Returns the null unit if `parent` is not on the board.
pub fn place_marker(state: &mut GameState, parent: PieceId, spec: &MarkerSpec) -> Command {
    let Some(parent_piece) = state.piece(parent) else {
        warn!(piece = %parent, "marker not placed: parent not on board");
        return Command::null();
    };
    let location = parent_piece
        .location
        .offset(spec.x_offset, spec.y_offset.saturating_neg());
    let marker_state = spec
        .state
        .clone()
        .with_property(PARENT_ID_PROPERTY, &parent.to_string());

    let marker = state.allocate_id();
    let mut command = ChangeTracker::track(state, marker, |s| {
        s.insert_piece(marker, marker_state, location);
    });
    debug!(%parent, %marker, "marker placed");

    if let Some(key) = &spec.after_burner {
        command = command.append(Command::from(Effect::Trigger {
            piece: marker,
            key: key.clone(),
        }));
    }
    if let Some(report) = &spec.report {
        command = command.append(Command::display_text(report));
    }
    command
}

/// Remove `id` from the board.
pub fn delete_piece(state: &mut GameState, id: PieceId) -> Command {
    ChangeTracker::track(state, id, |s| {
        s.remove_piece(id);
    })
}
