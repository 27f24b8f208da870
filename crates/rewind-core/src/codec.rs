//! Line-safe wire format for [`Command`]s.
//!
//! Every leaf is one record: a type tag followed by tab-separated fields.
//! Sibling records of a compound are joined with [`COMMAND_SEPARATOR`]
//! (ESC, `0x1B`). Field text is escaped so it never contains a raw tab,
//! ESC, or newline, which makes an encoded unit safe to store one per line
//! and lets an undo marker carry its wrapped unit as a single escaped field.
//!
//! | Tag       | Fields                                   |
//! |-----------|------------------------------------------|
//! | `ADD`     | id, state JSON, location JSON            |
//! | `REMOVE`  | id, state JSON or empty, location JSON or empty |
//! | `CHANGE`  | id, new state JSON, old state JSON or empty |
//! | `MOVE`    | id, to JSON, from JSON or empty          |
//! | `CHAT`    | text                                     |
//! | `TRIGGER` | id, key                                  |
//! | `UNDO`    | encoded wrapped unit                     |
//!
//! The null unit encodes as the empty string.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//!
//! let encoder = CommandEncoder;
//! let cmd = Command::display_text("hello").append(Command::display_text("world"));
//! let wire = encoder.encode(&cmd);
//! assert_eq!(wire, "CHAT\thello\u{1b}CHAT\tworld");
//! assert_eq!(encoder.decode(&wire).unwrap(), cmd);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::command::{Command, Effect};
use crate::piece::PieceId;

/// Separates sibling records of a compound unit.
pub const COMMAND_SEPARATOR: char = '\u{1b}';

const FIELD_SEPARATOR: char = '\t';

const TAG_ADD: &str = "ADD";
const TAG_REMOVE: &str = "REMOVE";
const TAG_CHANGE: &str = "CHANGE";
const TAG_MOVE: &str = "MOVE";
const TAG_CHAT: &str = "CHAT";
const TAG_TRIGGER: &str = "TRIGGER";
const TAG_UNDO: &str = "UNDO";

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Why an encoded unit could not be reconstructed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("unknown record tag '{tag}'")]
    UnknownTag { tag: String },

    #[error("'{tag}' record is missing field '{field}'")]
    MissingField { tag: &'static str, field: &'static str },

    #[error("'{tag}' record has {count} unexpected trailing field(s)")]
    TrailingFields { tag: &'static str, count: usize },

    #[error("field '{field}' is not a valid piece id: '{value}'")]
    BadNumber { field: &'static str, value: String },

    #[error("field '{field}' holds malformed JSON: {details}")]
    BadJson { field: &'static str, details: String },

    #[error("invalid escape sequence in '{raw}'")]
    BadEscape { raw: String },
}

// ---------------------------------------------------------------------------
// CommandEncoder
// ---------------------------------------------------------------------------

/// Encodes and decodes [`Command`]s to and from their wire text.
///
/// Stateless; `decode(encode(u))` reproduces a unit equal to `u`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEncoder;

impl CommandEncoder {
    /// Encode a unit to wire text.
    pub fn encode(&self, command: &Command) -> String {
        let mut records = Vec::new();
        encode_records(command, &mut records);
        records.join(&COMMAND_SEPARATOR.to_string())
    }

    /// Decode wire text produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first malformed record.
    pub fn decode(&self, text: &str) -> Result<Command, CodecError> {
        let mut command = Command::Null;
        for record in text.split(COMMAND_SEPARATOR) {
            if record.is_empty() {
                continue;
            }
            command = command.append(decode_record(record)?);
        }
        Ok(command)
    }
}

// -- encoding ---------------------------------------------------------------

fn encode_records(command: &Command, out: &mut Vec<String>) {
    match command {
        Command::Null => {}
        Command::Compound(children) => {
            for child in children {
                encode_records(child, out);
            }
        }
        Command::Effect(effect) => out.push(encode_effect(effect)),
        Command::Undo(original) => {
            let inner = CommandEncoder.encode(original);
            out.push(record(TAG_UNDO, &[inner]));
        }
    }
}

fn encode_effect(effect: &Effect) -> String {
    match effect {
        Effect::AddPiece {
            id,
            state,
            location,
        } => record(TAG_ADD, &[id.0.to_string(), json(state), json(location)]),
        Effect::RemovePiece {
            id,
            state,
            location,
        } => record(
            TAG_REMOVE,
            &[id.0.to_string(), opt_json(state), opt_json(location)],
        ),
        Effect::ChangePiece { id, old, new } => {
            record(TAG_CHANGE, &[id.0.to_string(), json(new), opt_json(old)])
        }
        Effect::MovePiece { id, from, to } => {
            record(TAG_MOVE, &[id.0.to_string(), json(to), opt_json(from)])
        }
        Effect::DisplayText { text } => record(TAG_CHAT, &[text.clone()]),
        Effect::Trigger { piece, key } => record(TAG_TRIGGER, &[piece.0.to_string(), key.clone()]),
    }
}

fn record(tag: &str, fields: &[String]) -> String {
    let mut out = String::from(tag);
    for field in fields {
        out.push(FIELD_SEPARATOR);
        escape_into(field, &mut out);
    }
    out
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("piece payloads are always JSON-serializable")
}

fn opt_json<T: Serialize>(value: &Option<T>) -> String {
    value.as_ref().map(json).unwrap_or_default()
}

fn escape_into(raw: &str, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            FIELD_SEPARATOR => out.push_str("\\t"),
            COMMAND_SEPARATOR => out.push_str("\\e"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
}

// -- decoding ---------------------------------------------------------------

fn unescape(raw: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push(FIELD_SEPARATOR),
            Some('e') => out.push(COMMAND_SEPARATOR),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            _ => {
                return Err(CodecError::BadEscape {
                    raw: raw.to_owned(),
                })
            }
        }
    }
    Ok(out)
}

/// Cursor over the unescaped fields of one record.
struct Fields<'a> {
    tag: &'static str,
    parts: std::str::Split<'a, char>,
}

impl Fields<'_> {
    fn text(&mut self, field: &'static str) -> Result<String, CodecError> {
        let raw = self.parts.next().ok_or(CodecError::MissingField {
            tag: self.tag,
            field,
        })?;
        unescape(raw)
    }

    /// Fail if the record carries more fields than its tag defines.
    fn finish(self) -> Result<(), CodecError> {
        match self.parts.count() {
            0 => Ok(()),
            count => Err(CodecError::TrailingFields {
                tag: self.tag,
                count,
            }),
        }
    }

    fn id(&mut self, field: &'static str) -> Result<PieceId, CodecError> {
        let raw = self.text(field)?;
        raw.parse::<u64>()
            .map(PieceId)
            .map_err(|_| CodecError::BadNumber { field, value: raw })
    }

    fn json<T: DeserializeOwned>(&mut self, field: &'static str) -> Result<T, CodecError> {
        let raw = self.text(field)?;
        parse_json(field, &raw)
    }

    fn opt_json<T: DeserializeOwned>(&mut self, field: &'static str) -> Result<Option<T>, CodecError> {
        let raw = self.text(field)?;
        if raw.is_empty() {
            return Ok(None);
        }
        parse_json(field, &raw).map(Some)
    }
}

fn parse_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, CodecError> {
    serde_json::from_str(raw).map_err(|e| CodecError::BadJson {
        field,
        details: e.to_string(),
    })
}

fn decode_record(text: &str) -> Result<Command, CodecError> {
    let mut parts = text.split(FIELD_SEPARATOR);
    let raw_tag = parts.next().unwrap_or_default();
    let tag = match raw_tag {
        TAG_ADD => TAG_ADD,
        TAG_REMOVE => TAG_REMOVE,
        TAG_CHANGE => TAG_CHANGE,
        TAG_MOVE => TAG_MOVE,
        TAG_CHAT => TAG_CHAT,
        TAG_TRIGGER => TAG_TRIGGER,
        TAG_UNDO => TAG_UNDO,
        other => {
            return Err(CodecError::UnknownTag {
                tag: other.to_owned(),
            })
        }
    };
    let mut fields = Fields { tag, parts };

    let effect = match tag {
        TAG_ADD => Effect::AddPiece {
            id: fields.id("id")?,
            state: fields.json("state")?,
            location: fields.json("location")?,
        },
        TAG_REMOVE => Effect::RemovePiece {
            id: fields.id("id")?,
            state: fields.opt_json("state")?,
            location: fields.opt_json("location")?,
        },
        TAG_CHANGE => {
            let id = fields.id("id")?;
            let new = fields.json("new")?;
            let old = fields.opt_json("old")?;
            Effect::ChangePiece { id, old, new }
        }
        TAG_MOVE => {
            let id = fields.id("id")?;
            let to = fields.json("to")?;
            let from = fields.opt_json("from")?;
            Effect::MovePiece { id, from, to }
        }
        TAG_CHAT => Effect::DisplayText {
            text: fields.text("text")?,
        },
        TAG_TRIGGER => Effect::Trigger {
            piece: fields.id("piece")?,
            key: fields.text("key")?,
        },
        _ => {
            let inner = fields.text("command")?;
            fields.finish()?;
            return Ok(Command::undo_of(CommandEncoder.decode(&inner)?));
        }
    };
    fields.finish()?;
    Ok(Command::Effect(effect))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
