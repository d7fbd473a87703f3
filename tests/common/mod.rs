//! Shared test utilities
//!
//! In-memory stand-ins for every external collaborator of a session.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use interview_agent::config::Config;
use interview_agent::oracle::{CompletionPurpose, CompletionRequest, Oracle};
use interview_agent::transport::{MediaTransport, Participant, RoomInfo, TrackHandle};
use interview_agent::voice::{
    AudioBuffer, AudioStream, SpeechRecognizer, SpeechSynthesizer, SynthesizedSpeech, codec,
};
use interview_agent::{Error, Result};

/// Candidate audio sample rate used by the fake transport
pub const CANDIDATE_SAMPLE_RATE: u32 = 16_000;

/// Delay between a track being unpublished and a scripted answer arriving
pub const ANSWER_DELAY: Duration = Duration::from_secs(1);

/// A short, clearly audible PCM16 chunk
pub fn voice_chunk() -> Vec<u8> {
    codec::samples_to_pcm16(&[0.3; 320])
}

/// Config with `total_questions` and default timing
pub fn test_config(total_questions: usize) -> Config {
    let mut config = Config::default();
    config.interview.total_questions = total_questions;
    config
}

/// Oracle replying from per-purpose queues
///
/// Empty queues produce a generic question or a score of 5.
#[derive(Default)]
pub struct ScriptedOracle {
    questions: Mutex<VecDeque<Result<String>>>,
    scores: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    stalled: Mutex<Vec<CompletionPurpose>>,
}

impl ScriptedOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Oracle that scores successive answers with `scores`
    pub fn with_scores(scores: &[u8]) -> Arc<Self> {
        let oracle = Self::default();
        for score in scores {
            oracle.push_score(Ok(format!(
                r#"{{"score": {score}, "feedback": "Scored {score}."}}"#
            )));
        }
        Arc::new(oracle)
    }

    pub fn push_question(&self, reply: Result<String>) {
        self.questions.lock().unwrap().push_back(reply);
    }

    pub fn push_score(&self, reply: Result<String>) {
        self.scores.lock().unwrap().push_back(reply);
    }

    /// Never reply to `purpose` requests
    pub fn stall(&self, purpose: CompletionPurpose) {
        self.stalled.lock().unwrap().push(purpose);
    }

    /// Prompts sent for `purpose`, in order
    pub fn prompts(&self, purpose: CompletionPurpose) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.purpose == purpose)
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let purpose = request.purpose;
        let asked = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.iter().filter(|r| r.purpose == purpose).count()
        };
        if self.stalled.lock().unwrap().contains(&purpose) {
            std::future::pending::<()>().await;
        }

        match purpose {
            CompletionPurpose::Question => self
                .questions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!(r#"{{"question": "Generated question {asked}"}}"#))),
            CompletionPurpose::Scoring => self
                .scores
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"score": 5, "feedback": "Fine."}"#.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Synthesizer returning a fixed amount of 24 kHz PCM per line
pub struct FakeSynthesizer {
    spoken: Mutex<Vec<String>>,
    samples: usize,
    fail: AtomicBool,
    stall: AtomicBool,
}

impl FakeSynthesizer {
    /// 250ms of audio per line: three 100ms frames
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            samples: 6000,
            fail: AtomicBool::new(false),
            stall: AtomicBool::new(false),
        })
    }

    /// Never return from `synthesize`
    pub fn set_stalled(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every line passed to `synthesize`, in order
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Tts("synthesizer unavailable".to_string()));
        }
        Ok(SynthesizedSpeech::Pcm16 {
            sample_rate: 24_000,
            data: codec::samples_to_pcm16(&vec![0.1; self.samples]),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Recognizer replying from a queue, defaulting to a fixed transcript
#[derive(Default)]
pub struct FakeRecognizer {
    transcripts: Mutex<VecDeque<Result<String>>>,
    calls: AtomicUsize,
    stall: AtomicBool,
}

impl FakeRecognizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Result<String>) {
        self.transcripts.lock().unwrap().push_back(reply);
    }

    /// Never return from `transcribe`
    pub fn set_stalled(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String> {
        assert!(!audio.is_empty(), "recognizer called with empty audio");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("An index speeds up lookups.".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Transport call observed by [`FakeTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Join(String),
    Subscribe(String),
    Publish(String),
    Unpublish(String),
    Disconnect,
}

/// In-memory room with one scripted candidate
pub struct FakeTransport {
    metadata: Option<String>,
    events: Mutex<Vec<TransportEvent>>,
    audio: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    candidate: mpsc::Sender<Vec<u8>>,
    answers: Mutex<VecDeque<Option<Vec<u8>>>>,
    answer_delay: Mutex<Duration>,
    next_sid: AtomicUsize,
    frames: AtomicUsize,
    fail_publish: AtomicBool,
    fail_push: AtomicBool,
}

impl FakeTransport {
    pub fn new(metadata: Option<&str>) -> Arc<Self> {
        let (candidate, rx) = mpsc::channel(256);
        Arc::new(Self {
            metadata: metadata.map(str::to_string),
            events: Mutex::new(Vec::new()),
            audio: Mutex::new(Some(rx)),
            candidate,
            answers: Mutex::new(VecDeque::new()),
            answer_delay: Mutex::new(ANSWER_DELAY),
            next_sid: AtomicUsize::new(1),
            frames: AtomicUsize::new(0),
            fail_publish: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
        })
    }

    /// After each unpublish, pop the next entry and, if it is `Some`,
    /// deliver that chunk after the answer delay ([`ANSWER_DELAY`] unless
    /// changed)
    pub fn script_answers(&self, answers: Vec<Option<Vec<u8>>>) {
        *self.answers.lock().unwrap() = answers.into();
    }

    pub fn set_answer_delay(&self, delay: Duration) {
        *self.answer_delay.lock().unwrap() = delay;
    }

    /// Sender feeding the candidate audio stream
    pub fn candidate(&self) -> mpsc::Sender<Vec<u8>> {
        self.candidate.clone()
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn frames_pushed(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Published tracks that were never unpublished
    pub fn leaked_tracks(&self) -> Vec<String> {
        let events = self.events();
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Publish(sid) => Some(sid.clone()),
                _ => None,
            })
            .filter(|sid| !events.contains(&TransportEvent::Unpublish(sid.clone())))
            .collect()
    }

    fn record(&self, event: TransportEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn join(&self, room: &str) -> Result<RoomInfo> {
        self.record(TransportEvent::Join(room.to_string()));
        Ok(RoomInfo {
            name: room.to_string(),
            metadata: self.metadata.clone(),
        })
    }

    async fn wait_for_participant(&self) -> Result<Participant> {
        Ok(Participant {
            identity: "candidate".to_string(),
        })
    }

    async fn subscribe_audio(&self, participant: &Participant) -> Result<AudioStream> {
        self.record(TransportEvent::Subscribe(participant.identity.clone()));
        let rx = self
            .audio
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Transport("already subscribed".to_string()))?;
        Ok(AudioStream::new(CANDIDATE_SAMPLE_RATE, rx))
    }

    async fn publish_track(&self, name: &str, sample_rate: u32) -> Result<TrackHandle> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::Transport("publish rejected".to_string()));
        }
        let sid = format!("TR_{}", self.next_sid.fetch_add(1, Ordering::SeqCst));
        self.record(TransportEvent::Publish(sid.clone()));
        Ok(TrackHandle {
            sid,
            name: name.to_string(),
            sample_rate,
        })
    }

    async fn push_frame(&self, _track: &TrackHandle, samples: Vec<i16>) -> Result<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(Error::Transport("frame rejected".to_string()));
        }
        assert!(!samples.is_empty());
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unpublish_track(&self, track: TrackHandle) -> Result<()> {
        self.record(TransportEvent::Unpublish(track.sid));

        let answer = self.answers.lock().unwrap().pop_front().flatten();
        if let Some(chunk) = answer {
            let candidate = self.candidate.clone();
            let delay = *self.answer_delay.lock().unwrap();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = candidate.send(chunk).await;
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(TransportEvent::Disconnect);
        Ok(())
    }
}
