//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;

use super::codec;
use super::endpoint::AudioBuffer;
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT, SttProvider, http_client};
use crate::{Error, Result};

/// Response from a Whisper-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Turns a captured answer into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe the buffered audio
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be reached or rejects the call
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance against a Whisper-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "GROQ_API_KEY or OPENAI_API_KEY required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_key,
            model,
            base_url: "https://api.deepgram.com/v1".to_string(),
            provider: SttProvider::Deepgram,
        })
    }

    /// Build the provider named in `config`
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.stt_api_key().unwrap_or_default().to_string();
        let voice = &config.voice;
        let stt = match voice.stt_provider {
            SttProvider::Whisper => {
                Self::new_whisper(key, voice.stt_model.clone(), voice.stt_base_url.clone())
            }
            SttProvider::Deepgram => Self::new_deepgram(key, voice.stt_model.clone()),
        }?;
        stt.with_timeout(voice.request_timeout)
    }

    /// Give up on requests that take longer than `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    /// Transcribe WAV bytes with the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe_wav(&self, wav: &[u8]) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav).await,
            SttProvider::Deepgram => self.transcribe_deepgram(wav).await,
        }
    }

    /// Transcribe using a Whisper-compatible endpoint
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("answer.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        Ok(result.text.trim().to_string())
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "{}/listen?model={}&punctuate=true",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        Ok(first_transcript(result))
    }
}

fn first_transcript(response: DeepgramResponse) -> String {
    response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String> {
        let wav = codec::pcm16_to_wav(&audio.to_bytes(), audio.sample_rate)?;
        self.transcribe_wav(&wav).await
    }

    fn name(&self) -> &'static str {
        match self.provider {
            SttProvider::Whisper => "whisper",
            SttProvider::Deepgram => "deepgram",
        }
    }
}
