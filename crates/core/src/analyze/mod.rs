mod fixed;
mod http;

use crate::emotion::AnalysisResult;
use crate::upload::AudioFile;
use futures::future::BoxFuture;

pub use fixed::FixedAnalyzer;
pub use http::HttpAnalysisClient;

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("inference backend unreachable: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    #[error("inference backend returned HTTP {status}")]
    ServerError { status: u16 },

    #[error("malformed inference response: {reason}")]
    MalformedResponse { reason: String },
}

/// Turns one uploaded file into a canonical result.
///
/// Implementations never touch the store; callers record the outcome.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, file: AudioFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>>;
}
