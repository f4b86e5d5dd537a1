//! Audio sources and their coercion into request payloads.
//!
//! # Responsibilities
//! - Accept a local file, an in-memory buffer or a `gs://` URI
//! - Produce the `RecognitionAudio` JSON payload (base64 content or URI)
//! - Carry encoding, language and sample rate for the recognition config

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::google::GoogleError;

const GCS_SCHEME: &str = "gs://";

/// Audio encodings accepted by Speech-to-Text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Linear16,
    Flac,
    Mulaw,
    Amr,
    AmrWb,
    OggOpus,
    SpeexWithHeaderByte,
}

impl std::str::FromStr for AudioEncoding {
    type Err = GoogleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "linear16" | "linear" | "raw" => Ok(Self::Linear16),
            "flac" => Ok(Self::Flac),
            "mulaw" => Ok(Self::Mulaw),
            "amr" => Ok(Self::Amr),
            "amr_wb" => Ok(Self::AmrWb),
            "ogg_opus" => Ok(Self::OggOpus),
            "speex_with_header_byte" | "speex" => Ok(Self::SpeexWithHeaderByte),
            other => Err(GoogleError::ConfigurationError(format!(
                "unknown audio encoding '{other}'"
            ))),
        }
    }
}

/// Where the audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file, read and inlined.
    File(PathBuf),
    /// In-memory audio, inlined.
    Bytes(Vec<u8>),
    /// Cloud Storage object, passed by reference.
    Uri(String),
}

impl AudioSource {
    /// `gs://...` becomes a URI source; anything else is a file path.
    pub fn from_location(location: &str) -> Self {
        if location.starts_with(GCS_SCHEME) {
            Self::Uri(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }

    /// Coerce into the request payload.
    ///
    /// # Errors
    ///
    /// - `GoogleError::Io` if a file cannot be read
    /// - `GoogleError::ConfigurationError` for empty audio or a non-`gs://` URI
    pub async fn to_recognition_audio(&self) -> Result<RecognitionAudio, GoogleError> {
        match self {
            Self::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                encode_content(&bytes)
            }
            Self::Bytes(bytes) => encode_content(bytes),
            Self::Uri(uri) => {
                if !uri.starts_with(GCS_SCHEME) || uri.len() == GCS_SCHEME.len() {
                    return Err(GoogleError::ConfigurationError(format!(
                        "audio URI must be a gs:// object, got '{uri}'"
                    )));
                }
                Ok(RecognitionAudio::Uri(uri.clone()))
            }
        }
    }
}

impl From<Vec<u8>> for AudioSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

fn encode_content(bytes: &[u8]) -> Result<RecognitionAudio, GoogleError> {
    if bytes.is_empty() {
        return Err(GoogleError::ConfigurationError(
            "audio content is empty".to_string(),
        ));
    }
    Ok(RecognitionAudio::Content(BASE64.encode(bytes)))
}

/// The `audio` field of a recognize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecognitionAudio {
    /// Base64-encoded audio bytes.
    Content(String),
    /// Cloud Storage URI.
    Uri(String),
}

/// Audio plus the parameters needed to recognize it.
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub source: AudioSource,
    pub encoding: Option<AudioEncoding>,
    pub language: Option<String>,
    pub sample_rate: Option<u32>,
}

impl Audio {
    pub fn new(source: impl Into<AudioSource>) -> Self {
        Self {
            source: source.into(),
            encoding: None,
            language: None,
            sample_rate: None,
        }
    }

    pub fn encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn sample_rate(mut self, hertz: u32) -> Self {
        self.sample_rate = Some(hertz);
        self
    }

    /// Check that the audio can be sent.
    pub fn validate(&self) -> Result<(), GoogleError> {
        match self.language.as_deref() {
            Some(lang) if !lang.trim().is_empty() => {}
            _ => {
                return Err(GoogleError::ConfigurationError(
                    "language is required for recognition".to_string(),
                ))
            }
        }
        if self.sample_rate == Some(0) {
            return Err(GoogleError::ConfigurationError(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
