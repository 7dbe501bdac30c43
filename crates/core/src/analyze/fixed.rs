use crate::analyze::{AnalysisError, Analyzer};
use crate::emotion::{normalize, AnalysisResult, RawPrediction};
use crate::playback::PlaybackRegistry;
use crate::upload::AudioFile;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Answers every upload with the same prediction, without a backend.
#[derive(Clone)]
pub struct FixedAnalyzer {
    prediction: RawPrediction,
    playback: PlaybackRegistry,
}

impl FixedAnalyzer {
    pub fn new(prediction: RawPrediction, playback: PlaybackRegistry) -> Self {
        Self {
            prediction,
            playback,
        }
    }

    /// Canned prediction used for offline runs.
    pub fn demo(playback: PlaybackRegistry) -> Self {
        let mut prediction = RawPrediction::from_scores(
            "Happy",
            0.87,
            &[("Happy", 0.87), ("Neutral", 0.09), ("Surprise", 0.04)],
        );
        prediction.processing_time = Some("0.0s".to_owned());
        Self::new(prediction, playback)
    }
}

impl Analyzer for FixedAnalyzer {
    fn analyze(&self, file: AudioFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>> {
        async move {
            let result = normalize(self.prediction.clone(), &file)?;
            let handle = self.playback.register(file.bytes().clone());
            Ok(result.with_playback(handle))
        }
        .boxed()
    }
}
