use crate::analyze::AnalysisError;
use crate::emotion::{AnalysisResult, EmotionScore, DEFAULT_DURATION, UNKNOWN_PROCESSING_TIME};
use crate::upload::AudioFile;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const LOG_TARGET: &str = "emotion::normalize";

/// Prediction body as returned by `POST /predict`.
///
/// Every field is optional here so that missing data surfaces as a
/// `MalformedResponse` with a reason rather than a bare decode error.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawPrediction {
    pub emotion: Option<String>,
    pub confidence: Option<f64>,
    /// Label to fractional confidence, in the order the backend sent them.
    pub emotions: Option<Map<String, Value>>,
    pub duration: Option<String>,
    pub processing_time: Option<String>,
}

impl RawPrediction {
    pub fn from_scores(emotion: &str, confidence: f64, scores: &[(&str, f64)]) -> Self {
        let emotions = scores
            .iter()
            .map(|(label, value)| ((*label).to_owned(), Value::from(*value)))
            .collect();
        Self {
            emotion: Some(emotion.to_owned()),
            confidence: Some(confidence),
            emotions: Some(emotions),
            duration: None,
            processing_time: None,
        }
    }
}

/// Scales a fractional confidence to a rounded percentage.
/// Returns `None` outside `[0, 1]` (and for NaN).
pub fn to_percent(value: f64) -> Option<u8> {
    if !(0.0..=1.0).contains(&value) {
        return None;
    }
    Some((value * 100.0).round() as u8)
}

/// Converts a backend prediction into the canonical result for `source`.
///
/// The top-level `emotion`/`confidence` pair is taken as-is even when the
/// ranked breakdown disagrees; the disagreement is logged and stays visible
/// through [`AnalysisResult::has_ranking_discrepancy`].
pub fn normalize(
    raw: RawPrediction,
    source: &AudioFile,
) -> Result<AnalysisResult, AnalysisError> {
    let all_emotions = rank_emotions(raw.emotions)?;

    let primary_emotion = raw
        .emotion
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| malformed("missing top-level `emotion`"))?;
    let raw_confidence = raw
        .confidence
        .ok_or_else(|| malformed("missing top-level `confidence`"))?;
    let confidence = to_percent(raw_confidence)
        .ok_or_else(|| malformed(format!("top-level confidence {raw_confidence} outside [0, 1]")))?;

    let result = AnalysisResult {
        id: Uuid::now_v7(),
        filename: source.name().to_owned(),
        primary_emotion,
        confidence,
        all_emotions,
        timestamp: Utc::now(),
        duration: non_empty_or(raw.duration, DEFAULT_DURATION),
        processing_time: non_empty_or(raw.processing_time, UNKNOWN_PROCESSING_TIME),
        audio_url: None,
    };

    if result.has_ranking_discrepancy() {
        tracing::warn!(
            target: LOG_TARGET,
            file = %result.filename,
            primary = %result.primary_emotion,
            confidence = result.confidence,
            ranked_top = %result.all_emotions[0].emotion,
            ranked_top_confidence = result.all_emotions[0].confidence,
            "top-level emotion disagrees with the ranked breakdown"
        );
    }

    Ok(result)
}

fn rank_emotions(
    emotions: Option<Map<String, Value>>,
) -> Result<Vec<EmotionScore>, AnalysisError> {
    let emotions = emotions.ok_or_else(|| malformed("missing `emotions` mapping"))?;
    if emotions.is_empty() {
        return Err(malformed("empty `emotions` mapping"));
    }

    let mut scores = Vec::with_capacity(emotions.len());
    for (label, value) in emotions {
        if label.trim().is_empty() {
            return Err(malformed("empty emotion label"));
        }
        let fraction = value
            .as_f64()
            .ok_or_else(|| malformed(format!("emotion `{label}` has non-numeric confidence")))?;
        let confidence = to_percent(fraction).ok_or_else(|| {
            malformed(format!("emotion `{label}` confidence {fraction} outside [0, 1]"))
        })?;
        scores.push(EmotionScore::new(label, confidence));
    }

    // stable: equal scores keep the backend's order
    scores.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    Ok(scores)
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn malformed(reason: impl Into<String>) -> AnalysisError {
    AnalysisError::MalformedResponse {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> AudioFile {
        AudioFile::new("clip.wav", vec![0u8; 4])
    }

    fn reason(err: AnalysisError) -> String {
        match err {
            AnalysisError::MalformedResponse { reason } => reason,
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_happy_clip() {
        let raw = RawPrediction::from_scores(
            "Happy",
            0.87,
            &[("Happy", 0.87), ("Neutral", 0.09), ("Surprise", 0.04)],
        );
        let result = normalize(raw, &clip()).expect("valid prediction");

        assert_eq!(result.filename(), "clip.wav");
        assert_eq!(result.primary_emotion(), "Happy");
        assert_eq!(result.confidence(), 87);
        assert_eq!(
            result.all_emotions(),
            &[
                EmotionScore::new("Happy", 87),
                EmotionScore::new("Neutral", 9),
                EmotionScore::new("Surprise", 4),
            ]
        );
        assert!(!result.has_ranking_discrepancy());
        assert!(result.audio_url().is_none());
    }

    #[test]
    fn ranks_descending_and_keeps_backend_order_on_ties() {
        let raw = RawPrediction::from_scores(
            "Sad",
            0.4,
            &[("Calm", 0.1), ("Sad", 0.4), ("Fear", 0.1), ("Angry", 0.4)],
        );
        let result = normalize(raw, &clip()).expect("valid prediction");
        let labels: Vec<_> = result.all_emotions().iter().map(|s| s.emotion.as_str()).collect();
        assert_eq!(labels, vec!["Sad", "Angry", "Calm", "Fear"]);
        assert!(result
            .all_emotions()
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        assert!(!result.has_ranking_discrepancy());
    }

    #[test]
    fn top_level_emotion_wins_over_ranking() {
        let raw = RawPrediction::from_scores("Happy", 0.3, &[("Happy", 0.3), ("Sad", 0.7)]);
        let result = normalize(raw, &clip()).expect("valid prediction");
        assert_eq!(result.primary_emotion(), "Happy");
        assert_eq!(result.confidence(), 30);
        assert_eq!(result.all_emotions()[0].emotion, "Sad");
        assert!(result.has_ranking_discrepancy());
    }

    #[test]
    fn ranking_is_sorted_and_top_level_always_wins() {
        // (primary, confidence, breakdown, expected label order, discrepancy)
        let cases: &[(&str, f64, &[(&str, f64)], &[&str], bool)] = &[
            ("Calm", 1.0, &[("Calm", 1.0)], &["Calm"], false),
            ("Calm", 0.0, &[("Calm", 0.0)], &["Calm"], false),
            ("Fear", 0.5, &[("Sad", 0.5)], &["Sad"], true),
            (
                "Happy",
                0.6,
                &[("Sad", 0.1), ("Happy", 0.6), ("Angry", 0.3)],
                &["Happy", "Angry", "Sad"],
                false,
            ),
            (
                "Angry",
                0.25,
                &[("Angry", 0.25), ("Sad", 0.25), ("Calm", 0.25), ("Fear", 0.25)],
                &["Angry", "Sad", "Calm", "Fear"],
                false,
            ),
            (
                "Sad",
                0.25,
                &[("Angry", 0.25), ("Sad", 0.25), ("Calm", 0.25), ("Fear", 0.25)],
                &["Angry", "Sad", "Calm", "Fear"],
                false,
            ),
            (
                "Neutral",
                0.2,
                &[("Neutral", 0.2), ("Disgust", 0.3), ("Surprise", 0.5)],
                &["Surprise", "Disgust", "Neutral"],
                true,
            ),
            ("Happy", 0.9, &[("Happy", 0.8), ("Sad", 0.2)], &["Happy", "Sad"], true),
            (
                "Excited",
                0.7,
                &[("Calm", 0.2), ("Happy", 0.7), ("Sad", 0.1)],
                &["Happy", "Calm", "Sad"],
                true,
            ),
            (
                "Surprise",
                0.4,
                &[("Fear", 0.2), ("Surprise", 0.4), ("Disgust", 0.2), ("Happy", 0.4)],
                &["Surprise", "Happy", "Fear", "Disgust"],
                false,
            ),
        ];

        for &(primary, confidence, breakdown, expected, discrepancy) in cases {
            let raw = RawPrediction::from_scores(primary, confidence, breakdown);
            let result = normalize(raw, &clip()).expect("valid prediction");

            let labels: Vec<_> = result.all_emotions().iter().map(|s| s.emotion.as_str()).collect();
            assert_eq!(labels, expected, "order for {breakdown:?}");
            assert!(
                result
                    .all_emotions()
                    .windows(2)
                    .all(|w| w[0].confidence >= w[1].confidence),
                "descending for {breakdown:?}"
            );
            assert_eq!(result.all_emotions().len(), breakdown.len());
            assert_eq!(result.primary_emotion(), primary);
            assert_eq!(result.confidence(), to_percent(confidence).expect("in range"));
            assert_eq!(
                result.has_ranking_discrepancy(),
                discrepancy,
                "discrepancy for {primary} over {breakdown:?}"
            );
        }
    }

    #[test]
    fn primary_missing_from_breakdown_is_a_discrepancy() {
        let raw = RawPrediction::from_scores("Excited", 0.5, &[("Happy", 0.5)]);
        let result = normalize(raw, &clip()).expect("valid prediction");
        assert!(result.has_ranking_discrepancy());
    }

    #[test]
    fn fills_missing_metadata_with_markers() {
        let mut raw = RawPrediction::from_scores("Neutral", 0.9, &[("Neutral", 0.9)]);
        raw.processing_time = Some(String::new());
        let result = normalize(raw, &clip()).expect("valid prediction");
        assert_eq!(result.duration(), DEFAULT_DURATION);
        assert_eq!(result.processing_time(), UNKNOWN_PROCESSING_TIME);

        let mut raw = RawPrediction::from_scores("Neutral", 0.9, &[("Neutral", 0.9)]);
        raw.duration = Some("2:45".into());
        raw.processing_time = Some("0.8s".into());
        let result = normalize(raw, &clip()).expect("valid prediction");
        assert_eq!(result.duration(), "2:45");
        assert_eq!(result.processing_time(), "0.8s");
    }

    #[test]
    fn assigns_fresh_ids() {
        let raw = RawPrediction::from_scores("Neutral", 0.9, &[("Neutral", 0.9)]);
        let a = normalize(raw.clone(), &clip()).expect("valid prediction");
        let b = normalize(raw, &clip()).expect("valid prediction");
        assert_ne!(a.id(), b.id());
        assert!(a.timestamp() <= b.timestamp());
    }

    #[test]
    fn empty_mapping_is_malformed() {
        let raw = RawPrediction::from_scores("Happy", 0.8, &[]);
        let err = normalize(raw, &clip()).expect_err("empty mapping");
        assert!(reason(err).contains("empty `emotions`"));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let mut raw = RawPrediction::from_scores("Happy", 0.8, &[("Happy", 0.8)]);
        raw.emotions = None;
        assert!(reason(normalize(raw, &clip()).expect_err("no mapping")).contains("missing"));

        let mut raw = RawPrediction::from_scores("Happy", 0.8, &[("Happy", 0.8)]);
        raw.emotion = None;
        assert!(reason(normalize(raw, &clip()).expect_err("no emotion")).contains("`emotion`"));

        let mut raw = RawPrediction::from_scores("Happy", 0.8, &[("Happy", 0.8)]);
        raw.confidence = None;
        assert!(reason(normalize(raw, &clip()).expect_err("no confidence")).contains("`confidence`"));
    }

    #[test]
    fn out_of_range_confidences_are_malformed() {
        let raw = RawPrediction::from_scores("Happy", 1.2, &[("Happy", 0.8)]);
        assert!(reason(normalize(raw, &clip()).expect_err("top-level")).contains("outside"));

        let raw = RawPrediction::from_scores("Happy", 0.8, &[("Happy", -0.1)]);
        assert!(reason(normalize(raw, &clip()).expect_err("mapping")).contains("`Happy`"));

        let raw = RawPrediction::from_scores("Happy", f64::NAN, &[("Happy", 0.8)]);
        assert!(normalize(raw, &clip()).is_err());
    }

    #[test]
    fn non_numeric_scores_are_malformed() {
        let raw: RawPrediction = serde_json::from_value(serde_json::json!({
            "emotion": "Happy",
            "confidence": 0.8,
            "emotions": {"Happy": "high"}
        }))
        .expect("decodes");
        assert!(reason(normalize(raw, &clip()).expect_err("string score")).contains("non-numeric"));
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(to_percent(0.0), Some(0));
        assert_eq!(to_percent(0.046), Some(5));
        assert_eq!(to_percent(0.994), Some(99));
        assert_eq!(to_percent(1.0), Some(100));
        assert_eq!(to_percent(1.0001), None);
    }
}
