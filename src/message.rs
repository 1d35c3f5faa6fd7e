//! Newsletter message extraction from story comments.
//!
//! When a reviewer sets the newsletter review to pass, Tracker posts a comment
//! that starts with [`PASS_MARKER`]; whatever the reviewer typed follows it.

use crate::tracker::Comment;

/// Text Tracker writes into the comment when the newsletter review passes.
pub const PASS_MARKER: &str = "**Newsletter** review set to **pass**";

/// Outcome of looking for the marker comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLookup {
    /// Marker found with text after it (already trimmed).
    Found(String),
    /// Marker found, nothing but whitespace after it.
    MarkerWithoutText,
    NoMarker,
}

impl MessageLookup {
    /// Resolve to the exported message. `placeholder` only replaces the
    /// marker-without-text case; a missing marker is always empty.
    pub fn into_message(self, placeholder: Option<&str>) -> String {
        match self {
            MessageLookup::Found(text) => text,
            MessageLookup::MarkerWithoutText => placeholder.unwrap_or_default().to_string(),
            MessageLookup::NoMarker => String::new(),
        }
    }
}

/// Scan comments in order and inspect the first one containing the marker.
/// Later marker comments are ignored.
pub fn find_message(comments: &[Comment]) -> MessageLookup {
    let Some(text) = comments
        .iter()
        .filter_map(|comment| comment.text.as_deref())
        .find(|text| text.contains(PASS_MARKER))
    else {
        return MessageLookup::NoMarker;
    };

    // Text between the first marker and the next one (or the end).
    let message = text.trim().split(PASS_MARKER).nth(1).unwrap_or_default().trim();

    if message.is_empty() {
        MessageLookup::MarkerWithoutText
    } else {
        MessageLookup::Found(message.to_string())
    }
}

/// The newsletter message, or `""` when there is none.
pub fn extract_message(comments: &[Comment]) -> String {
    find_message(comments).into_message(None)
}
