//! CSV serialization of export rows.

use crate::export::ExportRow;
use anyhow::{Context, Result};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const DEFAULT_OUTPUT_PATH: &str = "newsletter_stories.csv";

const HEADER: [&str; 4] = ["story_id", "story_title", "newsletter_message", "labels"];
const HEADER_WITHOUT_MESSAGE: [&str; 3] = ["story_id", "story_title", "labels"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter, a single ASCII byte.
    pub delimiter: u8,
    /// Emit the `newsletter_message` column.
    pub include_message: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_message: true,
        }
    }
}

/// Writes the header and one record per row to `writer`.
pub fn write_rows<W: Write>(writer: W, rows: &[ExportRow], options: &CsvOptions) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    let header = if options.include_message {
        wtr.write_record(HEADER)
    } else {
        wtr.write_record(HEADER_WITHOUT_MESSAGE)
    };
    header.context("Failed to write CSV header")?;

    for row in rows {
        let story_id = row.story_id.to_string();
        let written = if options.include_message {
            wtr.write_record([
                story_id.as_str(),
                row.story_title.as_str(),
                row.newsletter_message.as_str(),
                row.labels.as_str(),
            ])
        } else {
            wtr.write_record([
                story_id.as_str(),
                row.story_title.as_str(),
                row.labels.as_str(),
            ])
        };
        written.with_context(|| format!("Failed to write CSV record for story {}", row.story_id))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Renders rows into an in-memory CSV document.
pub fn render(rows: &[ExportRow], options: &CsvOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_rows(&mut buffer, rows, options)?;
    Ok(buffer)
}

/// Writes rows to `path` atomically.
///
/// The CSV goes to a temporary sibling file which is synced and then renamed
/// over `path`, so readers see either the previous file or the complete new
/// one, never a partial export.
pub fn write_to_file(rows: &[ExportRow], path: &Path, options: &CsvOptions) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create output directory '{}'", parent.display())
        })?;
    }

    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    let mut writer = BufWriter::new(file);
    if let Err(e) = write_rows(&mut writer, rows, options) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.context(format!(
            "Failed to write CSV to temporary file '{}'",
            temp_path.display()
        )));
    }

    let file = writer.into_inner().map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        anyhow::anyhow!(
            "Failed to flush temporary file '{}': {}",
            temp_path.display(),
            e.error()
        )
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "Wrote CSV export");
    Ok(())
}
