use crate::analyze::{AnalysisError, Analyzer};
use crate::emotion::AnalysisResult;
use crate::store::{AnalysisStore, StoreError};
use crate::upload::AudioFile;
use std::sync::Arc;

const LOG_TARGET: &str = "session";
const CANCELLED_MESSAGE: &str = "analysis was cancelled before it finished";

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Drives one upload through the store: begin, analyze, then complete or fail.
pub struct AnalysisSession<A> {
    analyzer: A,
    store: Arc<AnalysisStore>,
}

impl<A: Analyzer> AnalysisSession<A> {
    pub fn new(analyzer: A, store: Arc<AnalysisStore>) -> Self {
        Self { analyzer, store }
    }

    pub fn store(&self) -> &Arc<AnalysisStore> {
        &self.store
    }

    /// Rejected with [`StoreError::AlreadyInProgress`] before any request is
    /// sent if another submission is still outstanding.
    pub async fn submit(&self, file: AudioFile) -> Result<AnalysisResult, SessionError> {
        self.store.begin_analysis()?;
        let mut guard = InFlight {
            store: &self.store,
            settled: false,
        };

        let name = file.name().to_owned();
        let outcome = self.analyzer.analyze(file).await;
        guard.settled = true;

        match outcome {
            Ok(result) => {
                self.store.complete_analysis(result.clone());
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, file = %name, error = %e, "analysis failed");
                self.store.fail_analysis(e.to_string());
                Err(e.into())
            }
        }
    }
}

// Returns the store to idle if the submit future is dropped mid-flight.
struct InFlight<'a> {
    store: &'a AnalysisStore,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(target: LOG_TARGET, "in-flight analysis dropped");
            self.store.fail_analysis(CANCELLED_MESSAGE);
        }
    }
}
