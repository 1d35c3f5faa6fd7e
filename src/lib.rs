//! Export accepted Pivotal Tracker stories whose newsletter review passed.
//!
//! - [`tracker`] - read-only Tracker API client (stories, reviews, comments)
//! - [`review`] - does a story have a passing review of the target category
//! - [`message`] - newsletter text from the marker comment
//! - [`export`] - the per-story pipeline producing [`export::ExportRow`]s
//! - [`output`] - CSV serialization
//! - [`config`] - layered configuration (TOML file + environment)

pub mod config;
pub mod export;
pub mod message;
pub mod output;
pub mod review;
pub mod tracker;

use anyhow::{Context, Result};
use config::Config;
use export::{ExportRun, Exporter};
use tracker::TrackerClient;

/// Runs one export end-to-end and writes the CSV.
///
/// The file is only written once every story has been examined, so an
/// aborted run leaves any previous export untouched.
pub async fn run_export(config: Config) -> Result<ExportRun> {
    let Config {
        tracker,
        export,
        output_path,
        csv,
    } = config;

    let client = TrackerClient::new(tracker).context("Failed to set up Tracker client")?;
    let exporter = Exporter::new(client, export);

    let run = exporter
        .export_qualifying_stories()
        .await
        .context("Export aborted, no file was written")?;

    output::write_to_file(&run.rows, &output_path, &csv)
        .with_context(|| format!("Failed to write export to '{}'", output_path.display()))?;

    tracing::info!(
        path = %output_path.display(),
        rows = run.rows.len(),
        "Export written"
    );
    Ok(run)
}
