mod normalize;

use crate::playback::PlaybackHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub use normalize::{normalize, to_percent, RawPrediction};

pub const DEFAULT_DURATION: &str = "0:00";
pub const UNKNOWN_PROCESSING_TIME: &str = "unknown";

/// One emotion's likelihood as a whole-number percentage.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct EmotionScore {
    pub emotion: String,
    pub confidence: u8,
}

impl EmotionScore {
    pub fn new<S: Into<String>>(emotion: S, confidence: u8) -> Self {
        Self {
            emotion: emotion.into(),
            confidence,
        }
    }
}

/// Canonical outcome of one analysis.
///
/// Only the normalizer builds these, so `all_emotions` is never empty and is
/// ranked by descending confidence. Values are never edited once built; the
/// store keeps its own clones and hands out further clones.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    id: Uuid,
    filename: String,
    primary_emotion: String,
    confidence: u8,
    all_emotions: Vec<EmotionScore>,
    timestamp: DateTime<Utc>,
    duration: String,
    processing_time: String,
    audio_url: Option<PlaybackHandle>,
}

impl AnalysisResult {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn primary_emotion(&self) -> &str {
        &self.primary_emotion
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn all_emotions(&self) -> &[EmotionScore] {
        &self.all_emotions
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn processing_time(&self) -> &str {
        &self.processing_time
    }

    pub fn audio_url(&self) -> Option<&PlaybackHandle> {
        self.audio_url.as_ref()
    }

    /// True when the backend's top-level emotion is not what its own ranked
    /// breakdown puts first: the label is missing from the breakdown, scores
    /// differently there, or is outranked.
    pub fn has_ranking_discrepancy(&self) -> bool {
        let top = match self.all_emotions.first() {
            Some(top) => top.confidence,
            None => return false,
        };
        match self
            .all_emotions
            .iter()
            .find(|s| s.emotion == self.primary_emotion)
        {
            Some(score) => score.confidence != self.confidence || score.confidence < top,
            None => true,
        }
    }

    pub(crate) fn with_playback(mut self, handle: PlaybackHandle) -> Self {
        self.audio_url = Some(handle);
        self
    }
}
