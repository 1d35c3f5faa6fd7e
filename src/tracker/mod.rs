//! Pivotal Tracker API gateway.
//!
//! Three read-only calls against the v5 REST API:
//!
//! - accepted stories of the configured project (paginated)
//! - reviews of one story
//! - comments of one story
//!
//! Every call is a plain authenticated GET decoded into the types in
//! [`types`]. Failures surface as [`UpstreamError`], tagged with the call
//! (and story id) that failed.

mod client;
mod types;

pub use client::{
    Call, ClientError, FetchErrorKind, TrackerClient, TrackerSettings, UpstreamError,
    DEFAULT_BASE_URL,
};
pub use types::{Comment, Label, Review, ReviewStatus, ReviewTypeId, Story, StoryId};
