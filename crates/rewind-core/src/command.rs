//! Composable, invertible units of board mutation.
//!
//! A [`Command`] is the only way game state changes once play has begun. It
//! is one of:
//!
//! - [`Command::Null`]: no effect. The seed for building sequences.
//! - [`Command::Effect`]: a single leaf [`Effect`].
//! - [`Command::Compound`]: children executed in insertion order.
//! - [`Command::Undo`]: an undo marker wrapping the unit it reverses.
//!
//! # Composition
//!
//! [`Command::append`] is associative and treats the null unit as identity.
//! Sequences are kept flat, so `a.append(b).append(c)` and
//! `a.append(b.append(c))` produce the same children.
//!
//! # Inversion
//!
//! [`Command::undo_command`] returns the unit that, executed right after this
//! one, restores the prior board. A compound's inverse is the inverse of each
//! child in reverse order. Inverting an undo marker yields the original unit,
//! so undo-of-undo is redo rather than a third state.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let mut state = GameState::new();
//! let guard = RecursionGuard::default();
//! let id = state.spawn_piece(PieceState::named("Scout"), Location::new("Main", 0, 0));
//!
//! let step = Command::from(Effect::MovePiece {
//!     id,
//!     from: Some(Location::new("Main", 0, 0)),
//!     to: Location::new("Main", 2, 0),
//! })
//! .append(Command::display_text("Scout advances"));
//!
//! step.execute(&mut state, &guard).unwrap();
//! assert_eq!(state.piece(id).unwrap().location, Location::new("Main", 2, 0));
//!
//! step.undo_command().execute(&mut state, &guard).unwrap();
//! assert_eq!(state.piece(id).unwrap().location, Location::new("Main", 0, 0));
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::board::GameState;
use crate::codec::CommandEncoder;
use crate::guard::{Loopable, RecursionGuard};
use crate::piece::{Location, PieceId, PieceState};
use crate::CoreError;

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

/// A single semantic change to the board.
///
/// Piece effects write absolute values. Fields typed `Option` hold the
/// "before" data needed for inversion; when they are `None` the effect still
/// executes but has no inverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// Place a piece (insert or overwrite).
    AddPiece {
        id: PieceId,
        state: PieceState,
        location: Location,
    },
    /// Take a piece off the board.
    RemovePiece {
        id: PieceId,
        /// State at removal time, needed to put it back.
        state: Option<PieceState>,
        location: Option<Location>,
    },
    /// Replace a piece's persistent state.
    ChangePiece {
        id: PieceId,
        old: Option<PieceState>,
        new: PieceState,
    },
    /// Relocate a piece.
    MovePiece {
        id: PieceId,
        from: Option<Location>,
        to: Location,
    },
    /// Append a line to the chat transcript. Chat is a record, not state, so
    /// it has no inverse.
    DisplayText { text: String },
    /// Fire the key-command macro registered for `(piece, key)`.
    Trigger { piece: PieceId, key: String },
}

impl Effect {
    /// The effect that reverses this one, if enough "before" data exists.
    pub fn inverse(&self) -> Option<Effect> {
        match self {
            Effect::AddPiece {
                id,
                state,
                location,
            } => Some(Effect::RemovePiece {
                id: *id,
                state: Some(state.clone()),
                location: Some(location.clone()),
            }),
            Effect::RemovePiece {
                id,
                state: Some(state),
                location: Some(location),
            } => Some(Effect::AddPiece {
                id: *id,
                state: state.clone(),
                location: location.clone(),
            }),
            Effect::RemovePiece { .. } => None,
            Effect::ChangePiece {
                id,
                old: Some(old),
                new,
            } => Some(Effect::ChangePiece {
                id: *id,
                old: Some(new.clone()),
                new: old.clone(),
            }),
            Effect::ChangePiece { old: None, .. } => None,
            Effect::MovePiece {
                id,
                from: Some(from),
                to,
            } => Some(Effect::MovePiece {
                id: *id,
                from: Some(to.clone()),
                to: from.clone(),
            }),
            Effect::MovePiece { from: None, .. } => None,
            Effect::DisplayText { .. } | Effect::Trigger { .. } => None,
        }
    }

    /// Apply a non-trigger effect to the board.
    ///
    /// Stale piece references are logged and skipped. An `AddPiece` that
    /// would replace a different piece under the same id is refused.
    /// Triggers are expanded by [`Command::execute`], never here.
    fn apply(&self, state: &mut GameState) -> Result<(), CoreError> {
        match self {
            Effect::AddPiece {
                id,
                state: piece_state,
                location,
            } => {
                if let Some(existing) = state.piece(*id) {
                    if existing.state != *piece_state || existing.location != *location {
                        warn!(piece = %id, "add refused: id already holds a different piece");
                        return Err(CoreError::PieceConflict { piece: *id });
                    }
                }
                state.insert_piece(*id, piece_state.clone(), location.clone());
            }
            Effect::RemovePiece { id, .. } => {
                if state.remove_piece(*id).is_none() {
                    warn!(piece = %id, "remove skipped: piece not on board");
                }
            }
            Effect::ChangePiece { id, new, .. } => {
                if let Err(e) = state.set_piece_state(*id, new.clone()) {
                    warn!(piece = %id, error = %e, "change skipped");
                }
            }
            Effect::MovePiece { id, to, .. } => {
                if let Err(e) = state.set_location(*id, to.clone()) {
                    warn!(piece = %id, error = %e, "move skipped");
                }
            }
            Effect::DisplayText { text } => state.push_chat(text),
            Effect::Trigger { .. } => {}
        }
        Ok(())
    }
}

/// Pending work for [`Command::execute`].
enum Frame<'a> {
    Run(Cow<'a, Command>),
    /// End of a triggered macro: release its guard link.
    Leave,
}

impl Loopable for Effect {
    fn loop_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::AddPiece { id, state, location } => {
                write!(f, "AddPiece[{id} {} @ {location}]", state.name)
            }
            Effect::RemovePiece { id, .. } => write!(f, "RemovePiece[{id}]"),
            Effect::ChangePiece { id, new, .. } => write!(f, "ChangePiece[{id} {}]", new.name),
            Effect::MovePiece { id, to, .. } => write!(f, "MovePiece[{id} -> {to}]"),
            Effect::DisplayText { text } => write!(f, "DisplayText[{text}]"),
            Effect::Trigger { piece, key } => write!(f, "Trigger[{key} on {piece}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// An atomic or composite, invertible, serializable board mutation.
///
/// Equality compares the encoded wire form, so two units built differently
/// but encoding identically are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Command {
    /// No effect.
    #[default]
    Null,
    /// One leaf effect.
    Effect(Effect),
    /// Children applied in order. Built through [`append`](Command::append),
    /// which keeps it flat and free of null children.
    Compound(Vec<Command>),
    /// Marks "this is the undo of the wrapped unit". Executes the wrapped
    /// unit's inverse.
    Undo(Box<Command>),
}

impl Command {
    /// The null unit.
    pub fn null() -> Self {
        Command::Null
    }

    /// Shorthand for a `DisplayText` leaf.
    pub fn display_text(text: &str) -> Self {
        Command::Effect(Effect::DisplayText {
            text: text.to_owned(),
        })
    }

    /// Wrap `original` in an undo marker.
    pub fn undo_of(original: Command) -> Self {
        Command::Undo(Box::new(original))
    }

    /// Fold a sequence of units with [`append`](Self::append).
    pub fn sequence<I>(commands: I) -> Self
    where
        I: IntoIterator<Item = Command>,
    {
        commands.into_iter().fold(Command::Null, Command::append)
    }

    /// `true` if executing this unit has no effect and it carries no undo
    /// marker.
    pub fn is_null(&self) -> bool {
        match self {
            Command::Null => true,
            Command::Compound(children) => children.iter().all(Command::is_null),
            Command::Effect(_) | Command::Undo(_) => false,
        }
    }

    /// `true` if this is an undo marker.
    pub fn is_undo(&self) -> bool {
        matches!(self, Command::Undo(_))
    }

    /// The unit an undo marker reverses.
    pub fn undone(&self) -> Option<&Command> {
        match self {
            Command::Undo(original) => Some(original.as_ref()),
            _ => None,
        }
    }

    /// Compose `self` then `other` into one unit.
    ///
    /// Null operands vanish; compound operands are spliced so the result is
    /// always a flat sequence.
    pub fn append(self, other: Command) -> Command {
        if other.is_null() {
            return self;
        }
        if self.is_null() {
            return other;
        }
        let mut children = self.into_children();
        children.extend(other.into_children());
        Command::Compound(children)
    }

    fn into_children(self) -> Vec<Command> {
        match self {
            Command::Null => Vec::new(),
            Command::Compound(children) => children
                .into_iter()
                .flat_map(Command::into_children)
                .collect(),
            leaf => vec![leaf],
        }
    }

    /// Number of top-level entries (leaves and undo markers) after
    /// flattening.
    pub fn len(&self) -> usize {
        match self {
            Command::Null => 0,
            Command::Compound(children) => children.iter().map(Command::len).sum(),
            Command::Effect(_) | Command::Undo(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute every leaf in order.
    ///
    /// Not idempotent in general: chat lines append, and triggered macros
    /// run again. Callers must execute a unit once.
    ///
    /// Triggered macros are expanded on an explicit work stack, so chain
    /// depth is bounded by the guard alone and never by the thread's stack.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecursionLimit`] if a triggered chain runs too
    /// deep, or [`CoreError::PieceConflict`] if an added piece collides with
    /// a different one. Leaves applied before the failure stay applied.
    pub fn execute(&self, state: &mut GameState, guard: &RecursionGuard) -> Result<(), CoreError> {
        let _mark = guard.mark();
        let mut stack = vec![Frame::Run(Cow::Borrowed(self))];

        while let Some(frame) = stack.pop() {
            let command = match frame {
                Frame::Leave => {
                    guard.pop();
                    continue;
                }
                Frame::Run(Cow::Borrowed(Command::Compound(children))) => {
                    stack.extend(children.iter().rev().map(|c| Frame::Run(Cow::Borrowed(c))));
                    continue;
                }
                Frame::Run(Cow::Owned(Command::Compound(children))) => {
                    stack.extend(children.into_iter().rev().map(|c| Frame::Run(Cow::Owned(c))));
                    continue;
                }
                Frame::Run(command) => command,
            };

            match &*command {
                Command::Null | Command::Compound(_) => {}
                Command::Undo(original) => {
                    stack.push(Frame::Run(Cow::Owned(original.undo_command())));
                }
                Command::Effect(trigger @ Effect::Trigger { piece, key }) => {
                    guard.push(trigger)?;
                    match state.trigger(*piece, key) {
                        Some(chain) => {
                            stack.push(Frame::Leave);
                            stack.push(Frame::Run(Cow::Owned(chain.clone())));
                        }
                        None => {
                            debug!(piece = %piece, key = %key, "no macro registered");
                            guard.pop();
                        }
                    }
                }
                Command::Effect(effect) => effect.apply(state)?,
            }
        }
        Ok(())
    }

    /// The unit that reverses this one.
    ///
    /// Leaves without an inverse contribute nothing, so the result may be
    /// null; see [`has_inverse`](Self::has_inverse).
    pub fn undo_command(&self) -> Command {
        match self {
            Command::Null => Command::Null,
            Command::Effect(effect) => effect.inverse().map_or(Command::Null, Command::Effect),
            Command::Compound(children) => children
                .iter()
                .rev()
                .map(Command::undo_command)
                .fold(Command::Null, Command::append),
            Command::Undo(original) => (**original).clone(),
        }
    }

    /// `true` if every leaf can be reversed.
    pub fn has_inverse(&self) -> bool {
        match self {
            Command::Null | Command::Undo(_) => true,
            Command::Effect(effect) => effect.inverse().is_some(),
            Command::Compound(children) => children.iter().all(Command::has_inverse),
        }
    }
}

impl From<Effect> for Command {
    fn from(effect: Effect) -> Self {
        Command::Effect(effect)
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        let encoder = CommandEncoder;
        encoder.encode(self) == encoder.encode(other)
    }
}

impl Eq for Command {}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Null => write!(f, "Null"),
            Command::Effect(effect) => write!(f, "{effect}"),
            Command::Compound(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{child}")?;
                }
                Ok(())
            }
            Command::Undo(original) => write!(f, "[* UNDO: {original}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
