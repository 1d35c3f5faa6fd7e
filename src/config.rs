//! Configuration for an export run.
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, then environment variables (the binary loads `.env`
//! into the environment before this runs). Everything is validated once into
//! a [`Config`], whose parts are handed to each component's constructor.
//!
//! The config file is optional unless given explicitly. Unknown keys are
//! ignored by serde, though we log a warning for likely typos.
use crate::export::{ExportSettings, FailurePolicy, LabelField};
use crate::output::{CsvOptions, DEFAULT_OUTPUT_PATH};
use crate::tracker::{ReviewTypeId, TrackerSettings, DEFAULT_BASE_URL};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "newsletter-export.toml";

pub const ENV_PROJECT_ID: &str = "PIVOTAL_PROJECT_ID";
pub const ENV_API_TOKEN: &str = "PIVOTAL_API_TOKEN";
pub const ENV_REVIEW_TYPE: &str = "PIVOTAL_REVIEW_TYPE";
pub const ENV_BASE_URL: &str = "PIVOTAL_BASE_URL";
pub const ENV_ACCEPTED_AFTER: &str = "PIVOTAL_ACCEPTED_AFTER";
pub const ENV_OUTPUT_PATH: &str = "NEWSLETTER_OUTPUT_PATH";
pub const ENV_LABEL_FIELD: &str = "NEWSLETTER_LABEL_FIELD";
pub const ENV_ON_STORY_ERROR: &str = "NEWSLETTER_ON_STORY_ERROR";
pub const ENV_EMPTY_MESSAGE: &str = "NEWSLETTER_EMPTY_MESSAGE";

const MAX_RETRIES_LIMIT: u32 = 10;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing required setting `{key}`: set {env} or add `{key}` to the config file")]
    Missing {
        key: &'static str,
        env: &'static str,
    },

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// File Layer
// ============================================================================

/// An identifier the config file may spell as `123` or `"123"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(u64),
    Text(String),
}

impl IdValue {
    fn into_text(self) -> String {
        match self {
            IdValue::Int(n) => n.to_string(),
            IdValue::Text(s) => s,
        }
    }
}

/// Raw contents of the TOML config file. Every key is optional here;
/// [`Config::resolve`] decides what is required.
///
/// Custom Debug impl masks `api_token`.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub project_id: Option<IdValue>,
    pub api_token: Option<String>,
    pub review_type: Option<IdValue>,
    pub base_url: Option<String>,
    /// RFC3339 timestamp.
    pub accepted_after: Option<String>,
    pub output_path: Option<PathBuf>,
    pub label_field: Option<LabelField>,
    pub on_story_error: Option<FailurePolicy>,
    pub empty_message_placeholder: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub page_size: Option<u32>,
    pub include_message: Option<bool>,
    pub delimiter: Option<char>,
}

impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("project_id", &self.project_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("review_type", &self.review_type)
            .field("base_url", &self.base_url)
            .field("accepted_after", &self.accepted_after)
            .field("output_path", &self.output_path)
            .field("label_field", &self.label_field)
            .field("on_story_error", &self.on_story_error)
            .field("empty_message_placeholder", &self.empty_message_placeholder)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .field("include_message", &self.include_message)
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

impl FileConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 15] = [
        "project_id",
        "api_token",
        "review_type",
        "base_url",
        "accepted_after",
        "output_path",
        "label_field",
        "on_story_error",
        "empty_message_placeholder",
        "request_timeout_secs",
        "max_retries",
        "concurrency",
        "page_size",
        "include_message",
        "delimiter",
    ];

    /// Load the file layer from TOML.
    ///
    /// - Missing file → `Ok(FileConfig::default())` unless `required`
    /// - Empty file → `Ok(FileConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        // Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "No config file found, using environment only");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using environment only");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, path = %path.display(), "Unknown key in config file, ignoring");
                }
            }
        }

        let config: FileConfig = toml::from_str(content)?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Validated settings for one run.
#[derive(Debug)]
pub struct Config {
    pub tracker: TrackerSettings,
    pub export: ExportSettings,
    pub output_path: PathBuf,
    pub csv: CsvOptions,
}

impl Config {
    /// Reads the config file (`path`, or [`DEFAULT_CONFIG_FILE`] if present)
    /// and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => FileConfig::load(path, true)?,
            None => FileConfig::load(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Merges the file layer with environment values from `lookup` and
    /// validates the result. Empty environment values count as unset.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let project_id = env(ENV_PROJECT_ID)
            .or_else(|| file.project_id.clone().map(IdValue::into_text))
            .ok_or(ConfigError::Missing {
                key: "project_id",
                env: ENV_PROJECT_ID,
            })
            .and_then(|raw| parse_project_id(&raw))?;

        let api_token = env(ENV_API_TOKEN)
            .or_else(|| file.api_token.clone())
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from)
            .ok_or(ConfigError::Missing {
                key: "api_token",
                env: ENV_API_TOKEN,
            })?;

        let review_type = env(ENV_REVIEW_TYPE)
            .or_else(|| file.review_type.clone().map(IdValue::into_text))
            .ok_or(ConfigError::Missing {
                key: "review_type",
                env: ENV_REVIEW_TYPE,
            })
            .and_then(|raw| parse_review_type(&raw))?;

        let base_url = env(ENV_BASE_URL)
            .or_else(|| file.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let accepted_after = env(ENV_ACCEPTED_AFTER)
            .or_else(|| file.accepted_after.clone())
            .map(|raw| parse_timestamp(&raw))
            .transpose()?;

        let label_field = match env(ENV_LABEL_FIELD) {
            Some(raw) => raw
                .parse::<LabelField>()
                .map_err(|reason| ConfigError::invalid("label_field", reason))?,
            None => file.label_field.unwrap_or_default(),
        };

        let on_story_error = match env(ENV_ON_STORY_ERROR) {
            Some(raw) => raw
                .parse::<FailurePolicy>()
                .map_err(|reason| ConfigError::invalid("on_story_error", reason))?,
            None => file.on_story_error.unwrap_or_default(),
        };

        let empty_message_placeholder =
            env(ENV_EMPTY_MESSAGE).or_else(|| file.empty_message_placeholder.clone());

        let output_path = env(ENV_OUTPUT_PATH)
            .map(PathBuf::from)
            .or_else(|| file.output_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

        let request_timeout = match file.request_timeout_secs {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "request_timeout_secs",
                    "must be at least 1 second",
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => TrackerSettings::DEFAULT_TIMEOUT,
        };

        let max_retries = file
            .max_retries
            .unwrap_or(TrackerSettings::DEFAULT_MAX_RETRIES);
        if max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(
                "max_retries",
                format!("must be at most {}", MAX_RETRIES_LIMIT),
            ));
        }

        let concurrency = file
            .concurrency
            .unwrap_or(ExportSettings::DEFAULT_CONCURRENCY);
        if !(1..=ExportSettings::MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::invalid(
                "concurrency",
                format!("must be between 1 and {}", ExportSettings::MAX_CONCURRENCY),
            ));
        }

        let page_size = file.page_size.unwrap_or(TrackerSettings::DEFAULT_PAGE_SIZE);
        if !(1..=TrackerSettings::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ConfigError::invalid(
                "page_size",
                format!("must be between 1 and {}", TrackerSettings::MAX_PAGE_SIZE),
            ));
        }

        let delimiter = parse_delimiter(file.delimiter.unwrap_or(','))?;

        let mut tracker = TrackerSettings::new(base_url, project_id, api_token);
        tracker.request_timeout = request_timeout;
        tracker.max_retries = max_retries;
        tracker.page_size = page_size;
        tracker.accepted_after = accepted_after;

        let mut export = ExportSettings::new(review_type);
        export.concurrency = concurrency;
        export.label_field = label_field;
        export.on_story_error = on_story_error;
        export.empty_message_placeholder = empty_message_placeholder;

        let csv = CsvOptions {
            delimiter,
            include_message: file.include_message.unwrap_or(true),
        };

        Ok(Self {
            tracker,
            export,
            output_path,
            csv,
        })
    }
}

fn parse_project_id(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid(
            "project_id",
            format!("expected a positive integer, got {:?}", raw),
        )),
        Ok(id) => Ok(id),
    }
}

fn parse_review_type(raw: &str) -> Result<ReviewTypeId, ConfigError> {
    raw.parse().map_err(|_| {
        ConfigError::invalid(
            "review_type",
            format!("expected an integer review type id, got {:?}", raw),
        )
    })
}

/// HTTPS is required because every request carries the API token.
/// Plain HTTP is allowed only for localhost (testing purposes).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::invalid("base_url", format!("{} ({:?})", e, raw)))?;

    match url.scheme() {
        "https" => {}
        "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => {
            tracing::warn!(base_url = %url, "Using non-HTTPS Tracker base URL (localhost only)");
        }
        _ => {
            return Err(ConfigError::invalid(
                "base_url",
                format!("HTTPS required (except localhost), got {:?}", raw),
            ))
        }
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::invalid("base_url", format!("not a base URL: {:?}", raw)));
    }

    Ok(url)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ConfigError::invalid(
                "accepted_after",
                format!("expected an RFC3339 timestamp, got {:?} ({})", raw, e),
            )
        })
}

fn parse_delimiter(c: char) -> Result<u8, ConfigError> {
    if !c.is_ascii() || matches!(c, '"' | '\n' | '\r') {
        return Err(ConfigError::invalid(
            "delimiter",
            format!("must be a single ASCII character other than quote or newline, got {:?}", c),
        ));
    }
    Ok(c as u8)
}

// ============================================================================
// Tests
// ============================================================================
