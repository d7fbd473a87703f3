//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;

use super::codec;
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT, TtsProvider, http_client};
use crate::{Error, Result};

/// Sample rate of OpenAI's raw `pcm` response format
pub const OPENAI_PCM_SAMPLE_RATE: u32 = 24_000;

/// Audio returned by a synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizedSpeech {
    /// Compressed MP3 bytes
    Mp3(Vec<u8>),
    /// Raw PCM16LE mono
    Pcm16 { sample_rate: u32, data: Vec<u8> },
}

impl SynthesizedSpeech {
    /// Decode to mono i16 samples at `target_rate`
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if decoding or resampling fails
    pub fn to_samples(&self, target_rate: u32) -> Result<Vec<i16>> {
        let (samples, source_rate) = match self {
            Self::Pcm16 { sample_rate, data } if *sample_rate == target_rate => {
                return Ok(data
                    .chunks_exact(codec::BYTES_PER_SAMPLE)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect());
            }
            Self::Pcm16 { sample_rate, data } => (codec::pcm16_to_samples(data), *sample_rate),
            Self::Mp3(data) => codec::decode_mp3(data)?,
        };

        let resampled = codec::resample(&samples, source_rate, target_rate)?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(resampled
            .iter()
            .map(|s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect())
    }
}

/// Turns text into audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` to audio
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be reached or rejects the call
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    base_url: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance against an OpenAI-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        api_key: String,
        voice: String,
        speed: f32,
        model: String,
        base_url: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_key,
            voice,
            speed,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: TtsProvider::OpenAi,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Build the provider named in `config`
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.tts_api_key().unwrap_or_default().to_string();
        let voice = &config.voice;
        let tts = match voice.tts_provider {
            TtsProvider::OpenAi => Self::new_openai(
                key,
                voice.tts_voice.clone(),
                voice.tts_speed as f32,
                voice.tts_model.clone(),
                voice.tts_base_url.clone(),
            ),
            TtsProvider::ElevenLabs => {
                Self::new_elevenlabs(key, voice.tts_voice.clone(), voice.tts_model.clone())
            }
        }?;
        tts.with_timeout(voice.request_timeout)
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

    /// Synthesize using an OpenAI-compatible `/audio/speech` endpoint
    async fn synthesize_openai(&self, text: &str) -> Result<SynthesizedSpeech> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "pcm",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(SynthesizedSpeech::Pcm16 {
            sample_rate: OPENAI_PCM_SAMPLE_RATE,
            data: audio.to_vec(),
        })
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<SynthesizedSpeech> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(SynthesizedSpeech::Mp3(audio.to_vec()))
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech> {
        tracing::debug!(provider = self.name(), chars = text.len(), "synthesizing speech");
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::OpenAi => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        }
    }
}
