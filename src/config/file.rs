//! TOML configuration file loading
//!
//! Supports `~/.config/interviewer/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct InterviewConfigFile {
    /// Interview shape
    #[serde(default)]
    pub interview: InterviewFileConfig,

    /// Listening window timing
    #[serde(default)]
    pub listen: ListenFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Question/scoring LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterviewFileConfig {
    /// Questions per session
    pub total_questions: Option<usize>,

    /// Skill used when room metadata names none
    pub default_skill: Option<String>,

    /// Only rooms whose name starts with this are accepted
    pub room_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListenFileConfig {
    pub max_wait_secs: Option<u64>,
    pub silence_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub lead_in_ms: Option<u64>,

    /// Minimum PCM16 RMS for a chunk to count as speech
    pub energy_threshold: Option<f32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// OpenAI-compatible speech endpoint
    pub tts_base_url: Option<String>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-large-v3-turbo")
    pub stt_model: Option<String>,

    /// Whisper-compatible endpoint
    pub stt_base_url: Option<String>,

    /// Per-request timeout for STT and TTS calls
    pub timeout_secs: Option<u64>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible endpoint
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,

    pub question_temperature: Option<f32>,
    pub scoring_temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Per-request timeout for completions
    pub timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub groq: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `InterviewConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> InterviewConfigFile {
    config_file_path().map_or_else(InterviewConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> InterviewConfigFile {
    if !path.exists() {
        return InterviewConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                InterviewConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            InterviewConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/interviewer/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("interviewer").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml"));
        assert!(config.interview.total_questions.is_none());
        assert!(config.api_keys.groq.is_none());
    }

    #[test]
    fn partial_file_overlays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[interview]
total_questions = 3
default_skill = "Databases"

[listen]
silence_ms = 1500

[llm]
model = "llama-3.1-8b-instant"
"#
        )
        .unwrap();

        let config = load_from(file.path());
        assert_eq!(config.interview.total_questions, Some(3));
        assert_eq!(config.interview.default_skill.as_deref(), Some("Databases"));
        assert_eq!(config.listen.silence_ms, Some(1500));
        assert_eq!(config.llm.model.as_deref(), Some("llama-3.1-8b-instant"));
        assert!(config.voice.tts_provider.is_none());
    }

    #[test]
    fn invalid_toml_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        let config = load_from(file.path());
        assert!(config.interview.total_questions.is_none());
    }
}
