//! Segmentation of a finished reply into prose and fenced code

use serde::{Deserialize, Serialize};

/// Fenced-code delimiter
const FENCE: &str = "```";

/// Classification used when a fence carries no language tag
pub const PLAINTEXT: &str = "plaintext";

/// Header label shown on multi-line prose blocks
const BLOCK_HEADER: &str = "Text";

/// One typed unit of a rendered reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Single-line prose
    Plain { text: String },
    /// Multi-line prose rendered as a bounded, copyable unit
    Block { text: String },
    /// Fenced code with its language tag (or "plaintext")
    Code { language: String, code: String },
}

impl Segment {
    /// Label for the unit's header; plain prose has none
    pub fn header(&self) -> Option<&str> {
        match self {
            Segment::Plain { .. } => None,
            Segment::Block { .. } => Some(BLOCK_HEADER),
            Segment::Code { language, .. } => Some(language),
        }
    }

    /// Text a copy action puts on the clipboard
    pub fn copy_text(&self) -> &str {
        match self {
            Segment::Plain { text } | Segment::Block { text } => text,
            Segment::Code { code, .. } => code,
        }
    }

    /// Markdown-equivalent source of this segment
    pub fn raw_text(&self) -> String {
        match self {
            Segment::Plain { text } | Segment::Block { text } => text.clone(),
            Segment::Code { language, code } if language == PLAINTEXT => {
                format!("{FENCE}\n{code}\n{FENCE}")
            }
            Segment::Code { language, code } => format!("{FENCE}{language}\n{code}\n{FENCE}"),
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code { .. })
    }
}

/// A raw slice of the input before classification
enum Part<'a> {
    Prose(&'a str),
    Fenced(&'a str),
}

/// Split text into alternating prose and fenced parts.
///
/// A fence opens at the first "```" and closes at the next one; an opening
/// fence with no partner is left in the surrounding prose.
fn split_fences(text: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut cursor = 0;

    while let Some(open_rel) = text[cursor..].find(FENCE) {
        let open = cursor + open_rel;
        let body_start = open + FENCE.len();
        let Some(close_rel) = text[body_start..].find(FENCE) else {
            break;
        };
        let close = body_start + close_rel;

        parts.push(Part::Prose(&text[cursor..open]));
        parts.push(Part::Fenced(&text[body_start..close]));
        cursor = close + FENCE.len();
    }

    parts.push(Part::Prose(&text[cursor..]));
    parts
}

/// Parse the inside of a fence: optional word-character language tag, then code
fn parse_fenced(inner: &str) -> Segment {
    let tag_len = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(inner.len());
    let (tag, code) = inner.split_at(tag_len);

    let language = if tag.is_empty() {
        PLAINTEXT.to_string()
    } else {
        tag.to_string()
    };

    Segment::Code {
        language,
        code: code.trim().to_string(),
    }
}

fn classify_prose(text: &str) -> Option<Segment> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let text = trimmed.to_string();
    if trimmed.contains('\n') {
        Some(Segment::Block { text })
    } else {
        Some(Segment::Plain { text })
    }
}

/// Partition a finished reply into ordered segments.
///
/// Pure function of `text`: calling it twice on the same input yields the same result.
pub fn segment(text: &str) -> Vec<Segment> {
    split_fences(text)
        .into_iter()
        .filter_map(|part| match part {
            Part::Prose(prose) => classify_prose(prose),
            Part::Fenced(inner) => Some(parse_fenced(inner)),
        })
        .collect()
}
