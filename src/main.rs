use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use interview_agent::interview::{SessionOrchestrator, SessionServices};
use interview_agent::oracle::build_oracle;
use interview_agent::transport::LocalTransport;
use interview_agent::voice::{
    MicCapture, SpeechSynthesizer, SpeechToText, TextToSpeech, codec, play_samples,
};
use interview_agent::{Config, shutdown};

/// Interviewer - adaptive voice interview agent
#[derive(Parser)]
#[command(name = "interviewer", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run an interview on the local microphone and speakers (default)
    Run(RunArgs),
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Room name
    #[arg(long, default_value = "interview-local")]
    room: String,

    /// Skill to interview on (written into room metadata)
    #[arg(long, conflicts_with = "metadata")]
    skill: Option<String>,

    /// Raw room metadata JSON, e.g. '{"skill": "Databases"}'
    #[arg(long)]
    metadata: Option<String>,

    /// Number of questions (overrides config)
    #[arg(long)]
    questions: Option<usize>,

    /// Print the summary as JSON instead of a text report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,interview_agent=info",
        1 => "info,interview_agent=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Run(args)) => run_interview(args).await,
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::TestSpeaker) => test_speaker().await,
        Some(Command::TestTts { text }) => test_tts(&text).await,
        None => run_interview(cli.run).await,
    }
}

async fn run_interview(args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(questions) = args.questions {
        config.interview.total_questions = questions;
    }
    tracing::debug!(?config.interview, ?config.listen, "loaded configuration");

    let metadata = args.metadata.clone().or_else(|| {
        args.skill
            .as_ref()
            .map(|skill| serde_json::json!({ "skill": skill }).to_string())
    });

    let services = SessionServices {
        transport: Arc::new(LocalTransport::new(metadata)),
        synthesizer: Arc::new(TextToSpeech::from_config(&config)?),
        recognizer: Arc::new(SpeechToText::from_config(&config)?),
        oracle: Arc::new(build_oracle(&config)?),
    };

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping interview");
            trigger.trigger();
        }
    });

    tracing::info!(
        room = %args.room,
        questions = config.interview.total_questions,
        "starting interview"
    );

    let orchestrator = SessionOrchestrator::new(config, services, shutdown);
    let summary = orchestrator.run(&args.room).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{}", summary.render_report());
    }

    Ok(())
}

async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (tx, mut rx) = mpsc::channel(1024);
    let mut capture = MicCapture::start(tx, 0.0).await?;

    println!("Sample rate: {} Hz", interview_agent::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            samples.extend(codec::pcm16_to_samples(&chunk));
        }
        let energy = codec::rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    // 2 seconds of 440Hz sine wave at 24kHz
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    play_samples(&samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config)?;
    let sample_rate = config.speech.sample_rate;

    println!("Synthesizing speech with {}...", tts.name());
    let speech = tts.synthesize(text).await?;
    let samples = speech.to_samples(sample_rate)?;
    println!("Got {} samples at {sample_rate} Hz", samples.len());

    println!("Playing audio...");
    let samples: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    play_samples(&samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
