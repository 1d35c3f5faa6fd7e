use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Story identifier, unique within a project.
pub type StoryId = u64;

/// Review category identifier (`review_type_id` in the Tracker API).
///
/// Treated as an opaque token: the configured value and the API value are
/// both parsed into this type and compared by exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ReviewTypeId(u64);

impl ReviewTypeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for ReviewTypeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl fmt::Display for ReviewTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A story label. Either attribute may be absent from a payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Review status vocabulary. Anything the API adds later lands in `Other`
/// and never counts as a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Unstarted,
    InReview,
    Pass,
    Revise,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub review_type_id: ReviewTypeId,
    pub status: ReviewStatus,
}

/// A story comment. Attachment-only comments carry no `text`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
