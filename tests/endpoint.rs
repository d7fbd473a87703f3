//! Endpoint detector integration tests
//!
//! Run on a paused clock so the listening windows complete instantly and
//! elapsed times are exact.

use std::time::Duration;

use interview_agent::shutdown::{self, Shutdown};
use interview_agent::voice::{AudioStream, EndReason, EndpointDetector, ListenConfig, codec};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

mod common;
use common::{CANDIDATE_SAMPLE_RATE, voice_chunk};

fn stream() -> (mpsc::Sender<Vec<u8>>, AudioStream) {
    let (tx, rx) = mpsc::channel(64);
    (tx, AudioStream::new(CANDIDATE_SAMPLE_RATE, rx))
}

/// Default thresholds, timed from the moment the detector is called
fn no_lead_in() -> ListenConfig {
    ListenConfig {
        lead_in: Duration::ZERO,
        ..ListenConfig::default()
    }
}

fn short_window() -> ListenConfig {
    ListenConfig {
        max_total_wait: Duration::from_secs(5),
        silence_timeout: Duration::from_secs(1),
        ..no_lead_in()
    }
}

/// Send `count` chunks, 100ms apart, starting 50ms after `start`
fn speak_for(tx: mpsc::Sender<Vec<u8>>, start: Instant, count: u64) {
    tokio::spawn(async move {
        for i in 0..count {
            sleep_until(start + Duration::from_millis(50 + i * 100)).await;
            if tx.send(voice_chunk()).await.is_err() {
                return;
            }
        }
    });
}

#[tokio::test(start_paused = true)]
async fn test_ends_after_silence_timeout() {
    let detector = EndpointDetector::new(no_lead_in());
    let (tx, mut audio) = stream();
    let start = Instant::now();
    speak_for(tx.clone(), start, 10);

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    // Last chunk at 950ms; the window cannot close before 950 + 2500
    assert_eq!(utterance.reason, EndReason::Silence);
    assert_eq!(utterance.audio.chunks.len(), 10);
    assert!(utterance.elapsed >= Duration::from_millis(3450));
    assert!(utterance.elapsed <= Duration::from_millis(3450 + 400));
    assert_eq!(utterance.audio.sample_rate, CANDIDATE_SAMPLE_RATE);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_preserves_chunk_order() {
    let detector = EndpointDetector::new(short_window());
    let (tx, mut audio) = stream();
    let start = Instant::now();

    tokio::spawn({
        let tx = tx.clone();
        async move {
            for i in 0u8..5 {
                sleep_until(start + Duration::from_millis(50 + u64::from(i) * 100)).await;
                let _ = tx.send(vec![i, i]).await;
            }
        }
    });

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::Silence);
    assert_eq!(utterance.audio.to_bytes(), vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_speech_stops_at_max_wait() {
    let detector = EndpointDetector::new(short_window());
    let (tx, mut audio) = stream();

    tokio::spawn(async move {
        while tx.send(voice_chunk()).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::MaxWait);
    assert_eq!(utterance.elapsed, Duration::from_secs(5));
    assert!(!utterance.audio.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_speech_returns_empty_at_max_wait() {
    let detector = EndpointDetector::new(short_window());
    let (tx, mut audio) = stream();

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::MaxWait);
    assert_eq!(utterance.elapsed, Duration::from_secs(5));
    assert!(utterance.audio.is_empty());
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_closed_stream_without_speech_returns_early() {
    let detector = EndpointDetector::new(no_lead_in());
    let (tx, mut audio) = stream();
    drop(tx);

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::StreamClosed);
    assert!(utterance.audio.is_empty());
    assert_eq!(utterance.elapsed, no_lead_in().poll_interval);
}

#[tokio::test(start_paused = true)]
async fn test_closed_stream_after_speech_still_waits_for_silence() {
    let detector = EndpointDetector::new(short_window());
    let (tx, mut audio) = stream();
    speak_for(tx, Instant::now(), 3);

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::Silence);
    assert_eq!(utterance.audio.chunks.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_discards_chunks_queued_before_window() {
    let detector = EndpointDetector::new(short_window());
    let (tx, mut audio) = stream();
    for _ in 0..3 {
        tx.send(voice_chunk()).await.unwrap();
    }

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    assert_eq!(utterance.reason, EndReason::MaxWait);
    assert!(utterance.audio.is_empty());
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_energy_gate_keeps_waiting_through_noise() {
    let detector = EndpointDetector::new(ListenConfig {
        energy_threshold: Some(0.1),
        ..short_window()
    });
    let (tx, mut audio) = stream();

    tokio::spawn(async move {
        let hum = codec::samples_to_pcm16(&[0.01; 320]);
        while tx.send(hum.clone()).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    // Quiet chunks are kept but never count as speech
    assert_eq!(utterance.reason, EndReason::MaxWait);
    assert_eq!(utterance.elapsed, Duration::from_secs(5));
    assert!(!utterance.audio.chunks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_listening() {
    let detector = EndpointDetector::new(no_lead_in());
    let (tx, mut audio) = stream();
    let (trigger, shutdown) = shutdown::channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1100)).await;
        trigger.trigger();
    });

    let utterance = detector.detect_end_of_speech(&mut audio, &shutdown).await;

    assert_eq!(utterance.reason, EndReason::Cancelled);
    assert_eq!(utterance.elapsed, Duration::from_millis(1100));
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_keeps_answer_that_starts_during_lead_in() {
    let detector = EndpointDetector::new(ListenConfig {
        lead_in: Duration::from_millis(500),
        ..short_window()
    });
    let (tx, mut audio) = stream();
    tx.send(vec![9, 9]).await.unwrap();

    let start = Instant::now();
    tokio::spawn({
        let tx = tx.clone();
        async move {
            sleep_until(start + Duration::from_millis(300)).await;
            let _ = tx.send(voice_chunk()).await;
        }
    });

    let utterance = detector
        .detect_end_of_speech(&mut audio, &Shutdown::never())
        .await;

    // The queued chunk is stale; the one sent mid lead-in is the answer
    assert_eq!(utterance.reason, EndReason::Silence);
    assert_eq!(utterance.audio.chunks, vec![voice_chunk()]);
    assert_eq!(start.elapsed(), Duration::from_millis(500) + utterance.elapsed);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_lead_in_cancels() {
    let detector = EndpointDetector::new(ListenConfig {
        lead_in: Duration::from_millis(500),
        ..short_window()
    });
    let (tx, mut audio) = stream();
    let (trigger, shutdown) = shutdown::channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.trigger();
    });

    let utterance = detector.detect_end_of_speech(&mut audio, &shutdown).await;

    assert_eq!(utterance.reason, EndReason::Cancelled);
    assert!(utterance.audio.is_empty());
    drop(tx);
}
