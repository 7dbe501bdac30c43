use crate::report::ReportFormat;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = DEFAULT_MAX_UPLOAD_MB * BYTES_PER_MB;
const BYTES_PER_MB: u64 = 1024 * 1024;
pub const DEFAULT_REPORT_FORMAT: &str = "json";
pub const PREDICT_PATH: &str = "predict";
pub const ENV_API_BASE_URL: &str = "EMOTION_API_URL";
pub const ENV_EXPORT_DIR: &str = "EMOTION_EXPORT_DIR";

/// Base URL of the inference backend. The path always ends in `/` so that
/// endpoint paths resolve beneath it instead of replacing its last segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiBaseUrl(Url);

impl ApiBaseUrl {
    pub fn new<S: AsRef<str>>(value: S) -> Result<Self, ConfigError> {
        let raw = value.as_ref().trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptyApiUrl);
        }
        let mut url = Url::parse(raw).map_err(|e| ConfigError::InvalidApiUrl {
            value: raw.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl {
                value: raw.to_owned(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn predict_endpoint(&self) -> Result<Url, ConfigError> {
        self.0
            .join(PREDICT_PATH)
            .map_err(|e| ConfigError::InvalidApiUrl {
                value: self.0.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestTimeout {
    pub secs: u64,
}

impl RequestTimeout {
    pub fn new(secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self { secs })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadLimit {
    pub max_bytes: u64,
}

impl UploadLimit {
    pub fn from_megabytes(mb: u64) -> Result<Self, ConfigError> {
        if mb == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        Ok(Self {
            max_bytes: mb.saturating_mul(BYTES_PER_MB),
        })
    }
}

impl Default for UploadLimit {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub api_base_url: ApiBaseUrl,
    /// No timeout is applied unless one is configured explicitly.
    pub request_timeout: Option<RequestTimeout>,
    pub upload_limit: UploadLimit,
    pub export_dir: Option<PathBuf>,
    pub report_format: ReportFormat,
}

impl AnalysisConfig {
    pub fn new(api_base_url: ApiBaseUrl) -> Self {
        Self {
            api_base_url,
            request_timeout: None,
            upload_limit: UploadLimit::default(),
            export_dir: None,
            report_format: ReportFormat::Json,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api url must not be empty")]
    EmptyApiUrl,
    #[error("invalid api url `{value}`: {reason}")]
    InvalidApiUrl { value: String, reason: String },
    #[error("request timeout must be > 0 s")]
    ZeroTimeout,
    #[error("upload limit must be > 0 MB")]
    ZeroUploadLimit,
    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_base_url(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<ApiBaseUrl, ConfigError> {
    ApiBaseUrl::new(resolve_string_with_default(
        cli_value,
        ENV_API_BASE_URL,
        env,
        DEFAULT_API_BASE_URL,
    ))
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_API_BASE_URL, "http://env-host:9000");
        let url = resolve_api_base_url(Some("http://cli-host:8000".to_owned()), &env)
            .expect("valid url");
        assert_eq!(url.as_url().host_str(), Some("cli-host"));
    }

    #[test]
    fn api_url_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_API_BASE_URL, "http://env-host:9000");
        let url = resolve_api_base_url(None, &env).expect("valid url");
        assert_eq!(url.as_url().port(), Some(9000));
    }

    #[test]
    fn api_url_defaults_to_localhost() {
        let url = resolve_api_base_url(None, &MapEnv::default()).expect("valid url");
        assert_eq!(
            url.predict_endpoint().expect("endpoint").as_str(),
            "http://localhost:5000/predict"
        );
    }

    #[test]
    fn predict_endpoint_keeps_base_path() {
        let url = ApiBaseUrl::new("https://models.example.com/emotion").expect("valid url");
        assert_eq!(
            url.predict_endpoint().expect("endpoint").as_str(),
            "https://models.example.com/emotion/predict"
        );
    }

    #[test]
    fn api_url_rejects_empty_and_non_http() {
        assert_eq!(ApiBaseUrl::new("  "), Err(ConfigError::EmptyApiUrl));
        assert!(matches!(
            ApiBaseUrl::new("ftp://host/"),
            Err(ConfigError::InvalidApiUrl { .. })
        ));
    }

    #[test]
    fn timeout_must_be_positive() {
        assert_eq!(RequestTimeout::new(0), Err(ConfigError::ZeroTimeout));
        let t = RequestTimeout::new(30).expect("nonzero");
        assert_eq!(t.duration(), Duration::from_secs(30));
    }

    #[test]
    fn default_config_has_no_timeout() {
        let base = ApiBaseUrl::new(DEFAULT_API_BASE_URL).expect("valid url");
        let cfg = AnalysisConfig::new(base);
        assert!(cfg.request_timeout.is_none());
        assert_eq!(cfg.upload_limit.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn upload_limit_scales_megabytes() {
        let limit = UploadLimit::from_megabytes(2).expect("nonzero");
        assert_eq!(limit.max_bytes, 2 * 1024 * 1024);
        assert_eq!(UploadLimit::from_megabytes(0), Err(ConfigError::ZeroUploadLimit));
    }

    #[test]
    fn resolve_optional_string_falls_back_to_env() {
        let env = MapEnv::default().with_var(ENV_EXPORT_DIR, "/tmp/reports");
        assert_eq!(
            resolve_optional_string(None, ENV_EXPORT_DIR, &env).as_deref(),
            Some("/tmp/reports")
        );
        assert_eq!(resolve_optional_string(None, ENV_EXPORT_DIR, &MapEnv::default()), None);
    }

    #[test]
    fn resolve_string_with_default_default_used_when_both_missing() {
        let env = MapEnv::default();
        let v = resolve_string_with_default(None, ENV_API_BASE_URL, &env, "def");
        assert_eq!(v, "def");
    }
}
