//! Session-wide analysis state.
//!
//! The store owns the current analysis, the bounded recent history and the
//! in-flight/error flags. Every transition is published through a
//! [`watch`] channel, so subscribers observe it as soon as it happens and
//! always read a complete snapshot.

use crate::emotion::AnalysisResult;
use crate::util::RingBuffer;
use tokio::sync::watch;
use uuid::Uuid;

const LOG_TARGET: &str = "store";
pub const HISTORY_CAPACITY: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("an analysis is already in progress")]
    AlreadyInProgress,

    #[error("analysis {0} is not in recent history")]
    UnknownAnalysis(Uuid),
}

#[derive(Clone, Debug)]
pub struct AnalysisSnapshot {
    current: Option<AnalysisResult>,
    recent: RingBuffer<AnalysisResult>,
    is_analyzing: bool,
    error: Option<String>,
}

impl AnalysisSnapshot {
    fn empty() -> Self {
        Self {
            current: None,
            recent: RingBuffer::new(HISTORY_CAPACITY),
            is_analyzing: false,
            error: None,
        }
    }

    pub fn current_analysis(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }

    /// Most recent first.
    pub fn recent_analyses(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.recent.iter_newest_first()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

pub struct AnalysisStore {
    state: watch::Sender<AnalysisSnapshot>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AnalysisSnapshot::empty());
        Self { state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_analyzing(&self) -> bool {
        self.state.borrow().is_analyzing
    }

    /// Idle -> in flight. Clears the previous error.
    pub fn begin_analysis(&self) -> Result<(), StoreError> {
        let mut rejected = false;
        self.state.send_if_modified(|s| {
            if s.is_analyzing {
                rejected = true;
                return false;
            }
            s.is_analyzing = true;
            s.error = None;
            true
        });

        if rejected {
            tracing::warn!(target: LOG_TARGET, "rejected analysis start while another is in flight");
            return Err(StoreError::AlreadyInProgress);
        }
        tracing::debug!(target: LOG_TARGET, "analysis started");
        Ok(())
    }

    /// Records `result` as current and prepends it to the recent history,
    /// evicting the oldest entry beyond [`HISTORY_CAPACITY`].
    pub fn complete_analysis(&self, result: AnalysisResult) {
        let id = result.id();
        let mut evicted = None;
        self.state.send_modify(|s| {
            s.is_analyzing = false;
            evicted = s.recent.push(result.clone());
            s.current = Some(result);
        });

        tracing::debug!(target: LOG_TARGET, %id, "analysis recorded");
        if let Some(old) = evicted {
            tracing::debug!(target: LOG_TARGET, id = %old.id(), file = %old.filename(), "evicted from recent history");
        }
    }

    /// In flight -> idle with `message`; the current analysis is kept.
    pub fn fail_analysis<S: Into<String>>(&self, message: S) {
        let message = message.into();
        tracing::debug!(target: LOG_TARGET, error = %message, "analysis failed");
        self.state.send_modify(|s| {
            s.is_analyzing = false;
            s.error = Some(message);
        });
    }

    pub fn clear_current_analysis(&self) {
        self.state.send_if_modified(|s| s.current.take().is_some());
    }

    /// Re-displays a result from recent history as the current analysis.
    pub fn select_analysis(&self, id: Uuid) -> Result<(), StoreError> {
        let found = self.state.send_if_modified(|s| {
            let selected = s.recent.iter().find(|r| r.id() == id).cloned();
            let found = selected.is_some();
            if found {
                s.current = selected;
            }
            found
        });
        if found {
            Ok(())
        } else {
            Err(StoreError::UnknownAnalysis(id))
        }
    }
}

impl Default for AnalysisStore {
    fn default() -> Self {
        Self::new()
    }
}
