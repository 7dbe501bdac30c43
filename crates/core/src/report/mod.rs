use crate::emotion::{AnalysisResult, EmotionScore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_TARGET: &str = "report";
pub const REPORT_FILE_PREFIX: &str = "emotion-analysis-";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    /// Recognised so callers get a clear refusal; no PDF writer exists.
    Pdf,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            other => Err(ReportError::UnsupportedFormat(other.to_owned())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A serialized report plus the file name it should be saved under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Report {
    pub async fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ReportError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.bytes)
            .await
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::info!(target: LOG_TARGET, path = %path.display(), bytes = self.bytes.len(), "report written");
        Ok(path)
    }
}

// Field order here is the order in the written file.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportBody<'a> {
    filename: &'a str,
    timestamp: DateTime<Utc>,
    primary_emotion: &'a str,
    confidence: u8,
    all_emotions: &'a [EmotionScore],
    duration: &'a str,
    processing_time: &'a str,
}

/// Serializes `result` for download. Pure: identical input gives identical bytes.
pub fn serialize(result: &AnalysisResult, format: ReportFormat) -> Result<Report, ReportError> {
    match format {
        ReportFormat::Json => {
            let body = ReportBody {
                filename: result.filename(),
                timestamp: result.timestamp(),
                primary_emotion: result.primary_emotion(),
                confidence: result.confidence(),
                all_emotions: result.all_emotions(),
                duration: result.duration(),
                processing_time: result.processing_time(),
            };
            Ok(Report {
                filename: report_filename(result.filename(), format),
                bytes: serde_json::to_vec_pretty(&body)?,
            })
        }
        ReportFormat::Pdf => Err(ReportError::UnsupportedFormat(format.to_string())),
    }
}

/// `emotion-analysis-<original>.<ext>`, with path separators neutralised.
pub fn report_filename(original: &str, format: ReportFormat) -> String {
    let safe: String = original
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{REPORT_FILE_PREFIX}{safe}.{}", format.as_str())
}
