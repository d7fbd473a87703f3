//! Voice processing module
//!
//! Handles endpoint detection, speech output, STT/TTS clients, and local
//! audio capture and playback.

mod capture;
pub mod codec;
mod endpoint;
mod playback;
mod speaker;
mod stt;
mod tts;

pub use capture::{DEFAULT_NOISE_GATE, MicCapture, SAMPLE_RATE};
pub use endpoint::{
    AudioBuffer, AudioStream, EndReason, EndpointDetector, ListenConfig, Utterance,
};
pub use playback::{PlaybackQueue, play_samples};
pub use speaker::{SpeechConfig, Speaker};
pub use stt::{SpeechRecognizer, SpeechToText};
pub use tts::{OPENAI_PCM_SAMPLE_RATE, SpeechSynthesizer, SynthesizedSpeech, TextToSpeech};
