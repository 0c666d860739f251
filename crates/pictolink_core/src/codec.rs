//! crates/pictolink_core/src/codec.rs
//!
//! The textual wire format carried in a chat message's `content` field.
//!
//! Three shapes exist:
//!
//! - plain text, stored verbatim;
//! - `[pictogram:<id>:<label>]` for a single pictogram;
//! - `[pictograms:<id>,<id>,...:<label> <label> ...|<gloss>]` for a sequence,
//!   where the `|<gloss>` tail is optional (older senders never wrote it).
//!
//! Labels are written without escaping. A label containing a space shifts the
//! label-to-id pairing of a decoded sequence; the format is kept as is so every
//! message ever stored keeps decoding the same way.

use crate::domain::{static_image_url, FALLBACK_LABEL};
use serde::Serialize;

const SEQUENCE_OPEN: &str = "[pictograms:";
const SINGLE_OPEN: &str = "[pictogram:";
const CLOSE: char = ']';
const GLOSS_SEPARATOR: char = '|';

/// A decoded chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    PlainText {
        text: String,
    },
    SinglePictogram {
        id: u32,
        label: String,
    },
    PictogramSequence {
        ids: Vec<u32>,
        labels: Vec<String>,
        text: Option<String>,
    },
}

/// A pictogram reference ready to be drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPictogram {
    pub id: u32,
    pub label: String,
    pub image_url: String,
}

impl WireMessage {
    /// The pictograms referenced by the message, paired with their labels.
    /// Missing labels render as `Pictograma <id>`.
    pub fn pictograms(&self) -> Vec<RenderedPictogram> {
        match self {
            WireMessage::PlainText { .. } => Vec::new(),
            WireMessage::SinglePictogram { id, label } => vec![RenderedPictogram {
                id: *id,
                label: label.clone(),
                image_url: static_image_url(*id),
            }],
            WireMessage::PictogramSequence { ids, labels, .. } => ids
                .iter()
                .enumerate()
                .map(|(index, id)| RenderedPictogram {
                    id: *id,
                    label: labels
                        .get(index)
                        .filter(|l| !l.is_empty())
                        .cloned()
                        .unwrap_or_else(|| format!("{} {}", FALLBACK_LABEL, id)),
                    image_url: static_image_url(*id),
                })
                .collect(),
        }
    }

    /// What a speech synthesizer should read aloud for this message.
    pub fn speakable_text(&self) -> String {
        match self {
            WireMessage::PlainText { text } => text.clone(),
            WireMessage::SinglePictogram { label, .. } => label.clone(),
            WireMessage::PictogramSequence { labels, text, .. } => match text {
                Some(gloss) => gloss.clone(),
                None => labels.join(" "),
            },
        }
    }

    /// Writes the message back in its wire form.
    pub fn encode(&self) -> String {
        match self {
            WireMessage::PlainText { text } => text.clone(),
            WireMessage::SinglePictogram { id, label } => encode_single(*id, label),
            WireMessage::PictogramSequence { ids, labels, text } => {
                encode(ids, labels, text.as_deref())
            }
        }
    }
}

//=========================================================================================
// Encoding
//=========================================================================================

/// Encodes a pictogram sequence. Ids are comma-joined and labels space-joined,
/// both in sequence order; an empty or blank gloss is left out.
pub fn encode<L: AsRef<str>>(ids: &[u32], labels: &[L], gloss: Option<&str>) -> String {
    let ids = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let labels = labels
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    match gloss.filter(|g| !g.trim().is_empty()) {
        Some(gloss) => format!("{}{}:{}{}{}{}", SEQUENCE_OPEN, ids, labels, GLOSS_SEPARATOR, gloss, CLOSE),
        None => format!("{}{}:{}{}", SEQUENCE_OPEN, ids, labels, CLOSE),
    }
}

pub fn encode_single(id: u32, label: &str) -> String {
    format!("{}{}:{}{}", SINGLE_OPEN, id, label, CLOSE)
}

//=========================================================================================
// Decoding
//=========================================================================================

type Matcher = fn(&str) -> Option<WireMessage>;

/// Tried in order; the first match wins.
const MATCHERS: [Matcher; 2] = [match_sequence, match_single];

/// Decodes a message body. Never fails: anything that is not a well-formed
/// pictogram expression is plain text.
pub fn decode(message: &str) -> WireMessage {
    MATCHERS
        .iter()
        .find_map(|matcher| matcher(message))
        .unwrap_or_else(|| WireMessage::PlainText {
            text: message.to_string(),
        })
}

/// Strips `open` and the final `]`, returning what lies between.
fn bracket_body<'a>(message: &'a str, open: &str) -> Option<&'a str> {
    message.strip_prefix(open)?.strip_suffix(CLOSE)
}

fn parse_id(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn match_sequence(message: &str) -> Option<WireMessage> {
    let body = bracket_body(message, SEQUENCE_OPEN)?;
    let (ids_part, rest) = body.split_once(':')?;
    let ids = ids_part.split(',').map(parse_id).collect::<Option<Vec<_>>>()?;

    let (labels_part, gloss) = match rest.split_once(GLOSS_SEPARATOR) {
        Some((labels, gloss)) => (labels, Some(gloss)),
        None => (rest, None),
    };
    if labels_part.is_empty() {
        return None;
    }

    Some(WireMessage::PictogramSequence {
        ids,
        labels: labels_part.split(' ').map(str::to_string).collect(),
        text: gloss.filter(|g| !g.is_empty()).map(str::to_string),
    })
}

fn match_single(message: &str) -> Option<WireMessage> {
    let body = bracket_body(message, SINGLE_OPEN)?;
    let (id_part, label) = body.split_once(':')?;
    if label.is_empty() {
        return None;
    }
    Some(WireMessage::SinglePictogram {
        id: parse_id(id_part)?,
        label: label.to_string(),
    })
}
