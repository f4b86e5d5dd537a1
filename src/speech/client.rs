//! Speech-to-Text REST client.
//!
//! - `recognize`: synchronous recognition, results returned inline
//! - `process`: long-running recognition, returns an `Operation` to poll

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::audio::{Audio, AudioEncoding, RecognitionAudio};
use crate::config::SpeechConfig;
use crate::google::{GoogleError, RestClient, TokenProvider};

/// Recognition tuning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizeOptions {
    /// Maximum number of alternatives per result (API default 1).
    pub max_alternatives: Option<u32>,
    /// Mask profanities with asterisks.
    pub profanity_filter: bool,
    /// Phrase hints.
    pub phrases: Vec<String>,
    /// Include per-word time offsets.
    pub words: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<AudioEncoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate_hertz: Option<u32>,
    language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_alternatives: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    profanity_filter: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    speech_contexts: Vec<SpeechContext>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    enable_word_time_offsets: bool,
}

#[derive(Debug, Serialize)]
struct SpeechContext {
    phrases: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireResult {
    #[serde(default)]
    alternatives: Vec<WireAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireWord {
    word: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

/// A recognized word with its offsets (e.g. `"1.300s"`).
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub word: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// One alternative transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
}

/// The best transcript of one audio segment plus the runners-up.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    pub transcript: String,
    pub confidence: f32,
    pub words: Vec<Word>,
    pub alternatives: Vec<Alternative>,
}

impl SpeechResult {
    fn from_wire(result: WireResult) -> Option<Self> {
        let mut alternatives = result.alternatives.into_iter();
        let best = alternatives.next()?;
        Some(Self {
            transcript: best.transcript,
            confidence: best.confidence,
            words: best
                .words
                .into_iter()
                .map(|w| Word {
                    word: w.word,
                    start_time: w.start_time,
                    end_time: w.end_time,
                })
                .collect(),
            alternatives: alternatives
                .map(|a| Alternative {
                    transcript: a.transcript,
                    confidence: a.confidence,
                })
                .collect(),
        })
    }
}

fn results_from_value(value: Value) -> Result<Vec<SpeechResult>, GoogleError> {
    let response: RecognizeResponse = serde_json::from_value(value)?;
    Ok(response
        .results
        .into_iter()
        .filter_map(SpeechResult::from_wire)
        .collect())
}

/// HTTP status and canonical name for a `google.rpc.Code`.
fn grpc_status(code: i32) -> (u16, &'static str) {
    match code {
        0 => (200, "OK"),
        1 => (499, "CANCELLED"),
        3 => (400, "INVALID_ARGUMENT"),
        4 => (504, "DEADLINE_EXCEEDED"),
        5 => (404, "NOT_FOUND"),
        6 => (409, "ALREADY_EXISTS"),
        7 => (403, "PERMISSION_DENIED"),
        8 => (429, "RESOURCE_EXHAUSTED"),
        9 => (400, "FAILED_PRECONDITION"),
        10 => (409, "ABORTED"),
        11 => (400, "OUT_OF_RANGE"),
        12 => (501, "UNIMPLEMENTED"),
        13 => (500, "INTERNAL"),
        14 => (503, "UNAVAILABLE"),
        15 => (500, "DATA_LOSS"),
        16 => (401, "UNAUTHENTICATED"),
        _ => (500, "UNKNOWN"),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// A long-running recognition job.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<Value>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The failure reported by the service, if the job failed.
    ///
    /// The operation carries a gRPC status code; it is mapped to the HTTP
    /// status Google uses for the same condition so `is_not_found` and
    /// friends behave like they do for direct REST failures.
    pub fn error(&self) -> Option<GoogleError> {
        self.error.as_ref().map(|e| {
            let (code, status) = grpc_status(e.code);
            GoogleError::ApiError {
                code,
                status: status.to_string(),
                message: e.message.clone(),
            }
        })
    }

    /// Results of a finished job; empty while still running.
    pub fn results(&self) -> Result<Vec<SpeechResult>, GoogleError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        match &self.response {
            Some(value) if self.done => results_from_value(value.clone()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Speech-to-Text client.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    rest: RestClient,
}

impl SpeechClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn from_config(
        config: &SpeechConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, GoogleError> {
        Ok(Self::new(RestClient::new(&config.endpoint, tokens)?))
    }

    async fn request(
        &self,
        audio: &Audio,
        options: &RecognizeOptions,
    ) -> Result<RecognizeRequest, GoogleError> {
        audio.validate()?;
        let payload = audio.source.to_recognition_audio().await?;
        let speech_contexts = if options.phrases.is_empty() {
            Vec::new()
        } else {
            vec![SpeechContext {
                phrases: options.phrases.clone(),
            }]
        };

        Ok(RecognizeRequest {
            config: RecognitionConfig {
                encoding: audio.encoding,
                sample_rate_hertz: audio.sample_rate,
                language_code: audio.language.clone().unwrap_or_default(),
                max_alternatives: options.max_alternatives,
                profanity_filter: options.profanity_filter,
                speech_contexts,
                enable_word_time_offsets: options.words,
            },
            audio: payload,
        })
    }

    /// Recognize speech and wait for the result.
    pub async fn recognize(
        &self,
        audio: &Audio,
        options: &RecognizeOptions,
    ) -> Result<Vec<SpeechResult>, GoogleError> {
        let request = self.request(audio, options).await?;
        let response: Value = self.rest.post("v1/speech:recognize", &request).await?;
        let results = results_from_value(response)?;
        debug!(results = results.len(), "Speech recognized");
        Ok(results)
    }

    /// Start long-running recognition.
    pub async fn process(
        &self,
        audio: &Audio,
        options: &RecognizeOptions,
    ) -> Result<Operation, GoogleError> {
        let request = self.request(audio, options).await?;
        let operation: Operation = self
            .rest
            .post("v1/speech:longrunningrecognize", &request)
            .await?;
        debug!(operation = %operation.name, "Long-running recognition started");
        Ok(operation)
    }

    /// Fetch the current state of an operation.
    pub async fn operation(&self, name: &str) -> Result<Operation, GoogleError> {
        self.rest.get(&format!("v1/operations/{name}"), &[]).await
    }
}
