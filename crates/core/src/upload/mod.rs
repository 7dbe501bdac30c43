use crate::config::UploadLimit;
use bytes::Bytes;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "upload";

/// An audio file picked by the user, held in memory for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFile {
    name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("`{name}` is not an audio file (supported: mp3, wav, flac, ogg, m4a, aac, webm, opus)")]
    NotAudio { name: String },

    #[error("`{name}` is {size} bytes, above the {limit} byte upload limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("`{name}` is empty")]
    Empty { name: String },

    #[error("path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AudioFile {
    /// Builds a file from memory, inferring the MIME type from the extension.
    pub fn new<S: Into<String>, B: Into<Bytes>>(name: S, bytes: B) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).map(str::to_owned);
        Self {
            name,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::NoFileName(path.to_path_buf()))?;
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(target: LOG_TARGET, file = %name, size = bytes.len(), "audio file loaded");
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Upload-area checks: audio MIME type, non-empty, within `limit`.
    pub fn validate(&self, limit: UploadLimit) -> Result<(), UploadError> {
        let is_audio = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("audio/"));
        if !is_audio {
            return Err(UploadError::NotAudio {
                name: self.name.clone(),
            });
        }
        if self.bytes.is_empty() {
            return Err(UploadError::Empty {
                name: self.name.clone(),
            });
        }
        if self.size() > limit.max_bytes {
            return Err(UploadError::TooLarge {
                name: self.name.clone(),
                size: self.size(),
                limit: limit.max_bytes,
            });
        }
        Ok(())
    }
}

pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "webm" => "audio/webm",
        _ => return None,
    };
    Some(ct)
}
