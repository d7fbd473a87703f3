//! Configuration management for the interview agent

pub mod file;

use std::str::FromStr;
use std::time::Duration;

use file::InterviewConfigFile;

use crate::oracle::OracleSettings;
use crate::voice::{ListenConfig, SpeechConfig};
use crate::{Error, Result};

/// Groq's OpenAI-compatible API root
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI API root
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default per-request timeout for speech and LLM providers
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// ElevenLabs "Rachel" voice, used when no voice id is configured
const DEFAULT_ELEVENLABS_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// Interview agent configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Interview shape
    pub interview: InterviewConfig,

    /// Listening window timing
    pub listen: ListenConfig,

    /// Speech output framing
    pub speech: SpeechConfig,

    /// Voice provider configuration
    pub voice: VoiceConfig,

    /// Question/scoring LLM configuration
    pub oracle: OracleConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Interview shape
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    /// Questions per session
    pub total_questions: usize,

    /// Skill used when room metadata names none
    pub default_skill: String,

    /// Only rooms whose name starts with this are accepted
    pub room_prefix: Option<String>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            total_questions: 8,
            default_skill: "Software Engineering".to_string(),
            room_prefix: None,
        }
    }
}

/// TTS provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// STT provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier (OpenAI voice name or ElevenLabs voice id)
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0, OpenAI only)
    pub tts_speed: f64,

    /// OpenAI-compatible speech endpoint
    pub tts_base_url: String,

    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-large-v3-turbo", "nova-2")
    pub stt_model: String,

    /// Whisper-compatible transcription endpoint
    pub stt_base_url: String,

    /// Upper bound on one STT or TTS request
    pub request_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_provider: TtsProvider::OpenAi,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 0.95,
            tts_base_url: OPENAI_BASE_URL.to_string(),
            stt_provider: SttProvider::Whisper,
            stt_model: "whisper-large-v3-turbo".to_string(),
            stt_base_url: GROQ_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Question/scoring LLM configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// OpenAI-compatible endpoint
    pub base_url: String,

    /// Model identifier
    pub model: String,

    pub settings: OracleSettings,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: GROQ_BASE_URL.to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            settings: OracleSettings::default(),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `Groq` API key (oracle and Whisper)
    pub groq: Option<String>,

    /// `OpenAI` API key (TTS, or oracle/Whisper against OpenAI)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is unknown or the result is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with values from `env`
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is unknown or the result is invalid
    pub fn resolve<F>(fc: InterviewConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env_parse = |key: &str| env(key).and_then(|s| s.trim().parse::<u64>().ok());

        // Interview shape (env > toml > default)
        let interview = InterviewConfig {
            total_questions: env("INTERVIEW_TOTAL_QUESTIONS")
                .and_then(|s| s.trim().parse().ok())
                .or(fc.interview.total_questions)
                .unwrap_or(defaults.interview.total_questions),
            default_skill: env("INTERVIEW_DEFAULT_SKILL")
                .or(fc.interview.default_skill)
                .unwrap_or(defaults.interview.default_skill),
            room_prefix: env("INTERVIEW_ROOM_PREFIX")
                .or(fc.interview.room_prefix)
                .filter(|p| !p.is_empty()),
        };

        // Listening window (env > toml > default)
        let listen = ListenConfig {
            max_total_wait: env_parse("INTERVIEW_MAX_WAIT_SECS")
                .or(fc.listen.max_wait_secs)
                .map_or(defaults.listen.max_total_wait, Duration::from_secs),
            silence_timeout: env_parse("INTERVIEW_SILENCE_MS")
                .or(fc.listen.silence_ms)
                .map_or(defaults.listen.silence_timeout, Duration::from_millis),
            poll_interval: fc
                .listen
                .poll_ms
                .map_or(defaults.listen.poll_interval, Duration::from_millis),
            lead_in: fc
                .listen
                .lead_in_ms
                .map_or(defaults.listen.lead_in, Duration::from_millis),
            energy_threshold: fc.listen.energy_threshold,
        };

        // Voice providers (env > toml > default)
        let tts_provider = env("INTERVIEW_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|p| p.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or_default();
        let stt_provider = env("INTERVIEW_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|p| p.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();

        let (default_tts_model, default_tts_voice) = match tts_provider {
            TtsProvider::OpenAi => (defaults.voice.tts_model, defaults.voice.tts_voice),
            TtsProvider::ElevenLabs => (
                "eleven_monolingual_v1".to_string(),
                DEFAULT_ELEVENLABS_VOICE.to_string(),
            ),
        };
        let default_stt_model = match stt_provider {
            SttProvider::Whisper => defaults.voice.stt_model,
            SttProvider::Deepgram => "nova-2".to_string(),
        };

        let voice = VoiceConfig {
            tts_provider,
            tts_model: env("INTERVIEW_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(default_tts_model),
            tts_voice: env("TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(default_tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
            tts_base_url: env("INTERVIEW_TTS_BASE_URL")
                .or(fc.voice.tts_base_url)
                .unwrap_or(defaults.voice.tts_base_url),
            stt_provider,
            stt_model: env("GROQ_WHISPER_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(default_stt_model),
            stt_base_url: env("INTERVIEW_STT_BASE_URL")
                .or(fc.voice.stt_base_url)
                .unwrap_or(defaults.voice.stt_base_url),
            request_timeout: env_parse("INTERVIEW_VOICE_TIMEOUT_SECS")
                .or(fc.voice.timeout_secs)
                .map_or(defaults.voice.request_timeout, Duration::from_secs),
        };

        // Oracle (env > toml > default)
        let oracle = OracleConfig {
            base_url: env("INTERVIEW_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(defaults.oracle.base_url),
            model: env("GROQ_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.oracle.model),
            settings: OracleSettings {
                question_temperature: fc
                    .llm
                    .question_temperature
                    .unwrap_or(defaults.oracle.settings.question_temperature),
                scoring_temperature: fc
                    .llm
                    .scoring_temperature
                    .unwrap_or(defaults.oracle.settings.scoring_temperature),
                max_tokens: fc
                    .llm
                    .max_tokens
                    .unwrap_or(defaults.oracle.settings.max_tokens),
                request_timeout: env_parse("INTERVIEW_LLM_TIMEOUT_SECS")
                    .or(fc.llm.timeout_secs)
                    .map_or(defaults.oracle.settings.request_timeout, Duration::from_secs),
            },
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            groq: env("GROQ_API_KEY").or(fc.api_keys.groq),
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        let config = Self {
            interview,
            listen,
            speech: SpeechConfig {
                synthesis_timeout: voice.request_timeout,
                ..defaults.speech
            },
            voice,
            oracle,
            api_keys,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check timing and framing invariants
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.listen.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        if self.listen.silence_timeout >= self.listen.max_total_wait {
            return Err(Error::Config(format!(
                "silence timeout ({:?}) must be shorter than max wait ({:?})",
                self.listen.silence_timeout, self.listen.max_total_wait
            )));
        }
        if self.speech.frame_duration.is_zero() {
            return Err(Error::Config("frame duration must be non-zero".to_string()));
        }
        if self.speech.sample_rate == 0 {
            return Err(Error::Config("speech sample rate must be non-zero".to_string()));
        }
        if self.voice.request_timeout.is_zero() || self.oracle.settings.request_timeout.is_zero() {
            return Err(Error::Config("request timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Key for the oracle endpoint: Groq's key against Groq, else `OpenAI`'s
    #[must_use]
    pub fn oracle_api_key(&self) -> Option<&str> {
        self.key_for_endpoint(&self.oracle.base_url)
    }

    /// Key for the configured STT provider
    #[must_use]
    pub fn stt_api_key(&self) -> Option<&str> {
        match self.voice.stt_provider {
            SttProvider::Whisper => self.key_for_endpoint(&self.voice.stt_base_url),
            SttProvider::Deepgram => self.api_keys.deepgram.as_deref(),
        }
    }

    /// Key for the configured TTS provider
    #[must_use]
    pub fn tts_api_key(&self) -> Option<&str> {
        match self.voice.tts_provider {
            TtsProvider::OpenAi => self.key_for_endpoint(&self.voice.tts_base_url),
            TtsProvider::ElevenLabs => self.api_keys.elevenlabs.as_deref(),
        }
    }

    fn key_for_endpoint(&self, base_url: &str) -> Option<&str> {
        let groq = self.api_keys.groq.as_deref().filter(|k| !k.is_empty());
        let openai = self.api_keys.openai.as_deref().filter(|k| !k.is_empty());
        if base_url.contains("groq.com") {
            groq.or(openai)
        } else {
            openai.or(groq)
        }
    }
}

/// HTTP client whose requests give up after `timeout`
///
/// # Errors
///
/// Returns `Error::Config` if the client cannot be built
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))
}
