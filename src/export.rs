//! Export pipeline: accepted stories → reviews + comments → qualifying rows.
//!
//! Stories are examined through a bounded pool of concurrent requests, but
//! results are consumed in the order the Tracker listed the stories, so a run
//! produces the same rows in the same order as a sequential one would.

use crate::message::find_message;
use crate::review::is_qualifying;
use crate::tracker::{Label, ReviewTypeId, Story, StoryId, TrackerClient, UpstreamError};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::str::FromStr;

/// Which label attribute ends up in the `labels` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelField {
    #[default]
    Name,
    Id,
}

impl FromStr for LabelField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(LabelField::Name),
            "id" => Ok(LabelField::Id),
            other => Err(format!("expected \"name\" or \"id\", got {:?}", other)),
        }
    }
}

/// What to do when a per-story Tracker call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and return the error. Nothing is exported.
    #[default]
    Abort,
    /// Log the failure, leave the story out and carry on.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(format!("expected \"abort\" or \"skip\", got {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Review category a story needs a pass in.
    pub review_type: ReviewTypeId,
    /// Stories examined at once (each one issues two requests).
    pub concurrency: usize,
    pub label_field: LabelField,
    pub on_story_error: FailurePolicy,
    /// Written instead of `""` when the marker comment has no text.
    pub empty_message_placeholder: Option<String>,
}

impl ExportSettings {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const MAX_CONCURRENCY: usize = 16;

    pub fn new(review_type: ReviewTypeId) -> Self {
        Self {
            review_type,
            concurrency: Self::DEFAULT_CONCURRENCY,
            label_field: LabelField::default(),
            on_story_error: FailurePolicy::default(),
            empty_message_placeholder: None,
        }
    }
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub story_id: StoryId,
    pub story_title: String,
    pub newsletter_message: String,
    pub labels: String,
}

impl ExportRow {
    pub fn from_story(story: &Story, newsletter_message: String, label_field: LabelField) -> Self {
        Self {
            story_id: story.id,
            story_title: story.name.clone(),
            newsletter_message,
            labels: join_labels(&story.labels, label_field),
        }
    }
}

/// Labels joined with `", "` in their given order. Labels lacking the chosen
/// attribute are left out in either mode.
pub fn join_labels(labels: &[Label], field: LabelField) -> String {
    let parts: Vec<String> = labels
        .iter()
        .filter_map(|label| match field {
            LabelField::Name => label.name.clone(),
            LabelField::Id => label.id.map(|id| id.to_string()),
        })
        .collect();
    parts.join(", ")
}

/// Result of one export run.
#[derive(Debug, Default)]
pub struct ExportRun {
    /// Qualifying stories, in Tracker order.
    pub rows: Vec<ExportRow>,
    pub stories_examined: usize,
    /// Per-story failures left out under [`FailurePolicy::Skip`].
    pub skipped: Vec<UpstreamError>,
}

pub struct Exporter {
    client: TrackerClient,
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(client: TrackerClient, settings: ExportSettings) -> Self {
        Self { client, settings }
    }

    /// Runs the whole pipeline against the configured project.
    ///
    /// # Errors
    ///
    /// Returns the [`UpstreamError`] of the stories listing, or of the first
    /// failing per-story call under [`FailurePolicy::Abort`]. No rows are
    /// returned in that case.
    pub async fn export_qualifying_stories(&self) -> Result<ExportRun, UpstreamError> {
        let stories = self.client.fetch_accepted_stories().await?;
        let total = stories.len();
        let concurrency = self
            .settings
            .concurrency
            .clamp(1, ExportSettings::MAX_CONCURRENCY);

        tracing::info!(
            project_id = self.client.project_id(),
            review_type = %self.settings.review_type,
            stories = total,
            concurrency = concurrency,
            "Examining accepted stories"
        );

        let mut run = ExportRun {
            stories_examined: total,
            ..ExportRun::default()
        };

        // `buffered` keeps input order; dropping it on abort cancels in-flight requests
        let mut outcomes = stream::iter(stories)
            .map(|story| self.examine(story))
            .buffered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(Some(row)) => run.rows.push(row),
                Ok(None) => {}
                Err(e) => match self.settings.on_story_error {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Skip => {
                        tracing::warn!(
                            story_id = ?e.story_id(),
                            error = %e,
                            "Skipping story after failed Tracker call"
                        );
                        run.skipped.push(e);
                    }
                },
            }
        }

        tracing::info!(
            qualifying = run.rows.len(),
            skipped = run.skipped.len(),
            "Export finished"
        );
        Ok(run)
    }

    async fn examine(&self, story: Story) -> Result<Option<ExportRow>, UpstreamError> {
        let (reviews, comments) = tokio::try_join!(
            self.client.fetch_reviews(story.id),
            self.client.fetch_comments(story.id)
        )?;

        if !is_qualifying(&reviews, self.settings.review_type) {
            tracing::debug!(
                story_id = story.id,
                reviews = reviews.len(),
                "No passing review of the target category"
            );
            return Ok(None);
        }

        let message = find_message(&comments)
            .into_message(self.settings.empty_message_placeholder.as_deref());
        if message.is_empty() {
            tracing::debug!(story_id = story.id, "Qualifying story has no newsletter message");
        }

        Ok(Some(ExportRow::from_story(
            &story,
            message,
            self.settings.label_field,
        )))
    }
}
