//! Piece identifiers, locations, and persistent piece state.
//!
//! A [`Piece`] is split into two independently mutable halves so that the
//! command layer can describe each change precisely:
//!
//! - [`PieceState`]: the persistent, externally visible state (name,
//!   properties, movement restriction). This is what a
//!   [`ChangeTracker`](crate::tracker::ChangeTracker) snapshots.
//! - [`Location`]: where the piece sits. Changed by `MovePiece` effects.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PieceId
// ---------------------------------------------------------------------------

/// Unique identifier of a piece on the board.
///
/// Ids are assigned by whichever participant originates the piece and are
/// carried verbatim inside `AddPiece` effects, so every peer and every replay
/// refers to the same piece by the same id.
///
/// The top 16 bits name the participant that allocated the id and the rest
/// is a serial number. Two participants creating pieces at the same moment
/// draw from different namespaces and cannot collide. Namespace 0 is used for
/// board setup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PieceId(pub u64);

impl PieceId {
    const SERIAL_BITS: u32 = 48;
    const SERIAL_MASK: u64 = (1 << Self::SERIAL_BITS) - 1;

    /// The id `serial` within `namespace`. Serials wrap at 2^48.
    pub fn new(namespace: u16, serial: u64) -> Self {
        PieceId((u64::from(namespace) << Self::SERIAL_BITS) | (serial & Self::SERIAL_MASK))
    }

    /// The participant namespace this id was allocated in.
    pub fn namespace(self) -> u16 {
        // Always fits: only 16 bits remain after the shift.
        (self.0 >> Self::SERIAL_BITS) as u16
    }

    pub fn serial(self) -> u64 {
        self.0 & Self::SERIAL_MASK
    }
}

impl fmt::Debug for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PieceId({self})")
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            0 => write!(f, "{}", self.serial()),
            ns => write!(f, "{ns}:{}", self.serial()),
        }
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A position on a named map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Name of the map the piece is on.
    pub map: String,
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(map: &str, x: i32, y: i32) -> Self {
        Self {
            map: map.to_owned(),
            x,
            y,
        }
    }

    /// Same map, shifted by `(dx, dy)`.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            map: self.map.clone(),
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.map, self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Movement restriction carried by a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Movement {
    /// The piece can be moved freely.
    #[default]
    Normal,
    /// The piece is immobilized and move actions ignore it.
    Never,
}

// ---------------------------------------------------------------------------
// PieceState
// ---------------------------------------------------------------------------

/// The persistent, externally visible state of a piece.
///
/// Two states compare equal field by field; this is the equality a
/// [`ChangeTracker`](crate::tracker::ChangeTracker) uses to decide whether
/// anything changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PieceState {
    /// Display name, e.g. `"Infantry"`.
    pub name: String,
    /// Persistent properties. `BTreeMap` keeps serialization order stable.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub movement: Movement,
}

impl PieceState {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_owned(), value.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A piece on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub state: PieceState,
    pub location: Location,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
