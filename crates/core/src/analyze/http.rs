use crate::analyze::{AnalysisError, Analyzer};
use crate::config::{AnalysisConfig, ConfigError};
use crate::emotion::{normalize, AnalysisResult, RawPrediction};
use crate::playback::PlaybackRegistry;
use crate::upload::AudioFile;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Instant;
use url::Url;

const LOG_TARGET: &str = "analyze::http";
const FILE_FIELD: &str = "file";

/// Uploads audio to the inference backend's `/predict` endpoint.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: Url,
    playback: PlaybackRegistry,
}

impl HttpAnalysisClient {
    pub fn new(config: &AnalysisConfig, playback: PlaybackRegistry) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout.duration());
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.api_base_url.predict_endpoint()?,
            playback,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn upload(&self, file: &AudioFile) -> Result<RawPrediction, AnalysisError> {
        let new_part = || Part::bytes(file.bytes().to_vec()).file_name(file.name().to_owned());
        let part = match file.content_type() {
            Some(content_type) => new_part().mime_str(content_type).unwrap_or_else(|e| {
                tracing::warn!(target: LOG_TARGET, content_type, error = %e, "sending without content type");
                new_part()
            }),
            None => new_part(),
        };
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: LOG_TARGET, endpoint = %self.endpoint, error = %e, "upload failed");
                AnalysisError::NetworkUnavailable(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(target: LOG_TARGET, %status, body = %body, "inference backend error");
            return Err(AnalysisError::ServerError {
                status: status.as_u16(),
            });
        }

        // a body cut off mid-transfer is a transport failure, not a bad payload
        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: LOG_TARGET, endpoint = %self.endpoint, error = %e, "response body interrupted");
            AnalysisError::NetworkUnavailable(e)
        })?;

        serde_json::from_slice::<RawPrediction>(&body).map_err(|e| {
            AnalysisError::MalformedResponse {
                reason: format!("invalid JSON body: {e}"),
            }
        })
    }
}

impl Analyzer for HttpAnalysisClient {
    fn analyze(&self, file: AudioFile) -> BoxFuture<'_, Result<AnalysisResult, AnalysisError>> {
        async move {
            let started = Instant::now();
            tracing::info!(target: LOG_TARGET, file = %file.name(), size = file.size(), "uploading for analysis");

            let raw = self.upload(&file).await?;
            let result = normalize(raw, &file)?;
            let handle = self.playback.register(file.bytes().clone());

            tracing::info!(
                target: LOG_TARGET,
                file = %result.filename(),
                emotion = %result.primary_emotion(),
                confidence = result.confidence(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "analysis complete"
            );
            Ok(result.with_playback(handle))
        }
        .boxed()
    }
}
