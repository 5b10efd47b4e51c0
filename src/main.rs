use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voxquery::voice::ChunkSink;
use voxquery::{
    AudioInput, AudioPayload, Config, Conversation, CpalInput, QueryClient, SpeakerOutput,
    TerminalTranscript,
};

/// voxquery - talk or type to a spoken query service
#[derive(Parser)]
#[command(name = "voxquery", version, about)]
struct Cli {
    /// Server base URL (overrides config and `VOXQUERY_SERVER_URL`)
    #[arg(long)]
    server: Option<String>,

    /// Query endpoint path or absolute URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Don't play reply audio
    #[arg(long)]
    no_playback: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one text query
    Ask {
        /// Query text
        text: String,
    },
    /// Record from the microphone, then send the recording
    Record {
        /// Recording length in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
    /// Send an existing audio file (or base64 text) as a voice query
    SendAudio {
        /// Audio file path
        path: PathBuf,
    },
    /// Upload a .txt knowledge document to the server
    Upload {
        /// Document path
        path: PathBuf,
    },
    /// Check that the server is up
    Health,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

type TerminalConversation = Conversation<CpalInput, SpeakerOutput, TerminalTranscript>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,voxquery=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if cli.no_playback {
        config.playback.enabled = false;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        None => interactive(&config).await,
        Some(Command::Ask { text }) => ask(&config, &text).await,
        Some(Command::Record { seconds }) => record(&config, seconds).await,
        Some(Command::SendAudio { path }) => send_audio(&config, &path).await,
        Some(Command::Upload { path }) => upload(&config, &path).await,
        Some(Command::Health) => health(&config).await,
        Some(Command::TestMic { duration }) => test_mic(&config, duration).await,
        Some(Command::TestSpeaker) => test_speaker().await,
    }
}

/// Build a query client; the speaker is only probed when playback is on
fn query_client(config: &Config) -> anyhow::Result<QueryClient<SpeakerOutput>> {
    let output = if config.playback.enabled {
        SpeakerOutput::new()?
    } else {
        SpeakerOutput::default()
    };
    Ok(QueryClient::new(config.query_url()?, output))
}

fn conversation(config: &Config) -> anyhow::Result<TerminalConversation> {
    let input = CpalInput::new(config.capture.sample_rate);
    Ok(
        Conversation::new(input, query_client(config)?, TerminalTranscript)
            .with_playback(config.playback.enabled),
    )
}

/// Interactive chat: typed lines are queries, `/rec` toggles recording
#[allow(clippy::future_not_send)]
async fn interactive(config: &Config) -> anyhow::Result<()> {
    let mut conversation = conversation(config)?;

    println!("voxquery → {}", conversation.client().endpoint());
    println!("Type a question and press Enter. /rec starts or stops recording, /quit exits.\n");

    conversation.setup_microphone().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let outcome = match line.trim() {
            "/quit" | "/exit" => break,
            "/rec" | "/r" => conversation.toggle_recording().await,
            text => conversation.send_text(text).await.map(|_| ()),
        };
        if let Err(e) = outcome {
            tracing::debug!(error = %e, "exchange failed");
        }
    }

    conversation.release();
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut conversation = conversation(config)?;
    if !conversation.send_text(text).await? {
        anyhow::bail!("query is empty");
    }
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn record(config: &Config, seconds: u64) -> anyhow::Result<()> {
    let mut conversation = conversation(config)?;
    if !conversation.setup_microphone().await {
        anyhow::bail!(voxquery::Error::PermissionDenied);
    }

    conversation.toggle_recording().await?;
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    let result = conversation.toggle_recording().await;

    conversation.release();
    Ok(result?)
}

#[allow(clippy::future_not_send)]
async fn send_audio(config: &Config, path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;

    // Accept base64 text (optionally a data URL) as well as raw audio
    let payload = std::str::from_utf8(&bytes)
        .ok()
        .and_then(|text| AudioPayload::from_encoded(text).ok())
        .unwrap_or_else(|| AudioPayload::from_audio_bytes(&bytes));

    let mut conversation = conversation(config)?;
    conversation.send_audio(payload).await?;
    Ok(())
}

async fn upload(config: &Config, path: &Path) -> anyhow::Result<()> {
    let client = QueryClient::new(config.query_url()?, SpeakerOutput::default());
    let message = client.upload_document(path).await?;
    println!("{message}");
    Ok(())
}

async fn health(config: &Config) -> anyhow::Result<()> {
    let client = QueryClient::new(config.query_url()?, SpeakerOutput::default());
    let status = client.health().await?;
    println!("{}: {}", status.status, status.message);

    if !status.is_ok() {
        anyhow::bail!("server reported status {:?}", status.status);
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut input = CpalInput::new(config.capture.sample_rate);
    input.open().await?;

    let sink = ChunkSink::new();
    input.begin(sink.clone()).await?;

    println!("Sample rate: {} Hz", input.sample_rate());
    println!("---");

    let mut seen = 0;
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = input.peek_samples();
        let window = &samples[seen.min(samples.len())..];
        seen = samples.len();

        let energy = calculate_rms(window);
        let peak = window.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    input.finish().await?;
    input.close();

    let wav_bytes: usize = sink.take().iter().map(Vec::len).sum();
    println!("\n---");
    println!("Captured {wav_bytes} bytes of WAV audio.");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = SpeakerOutput::new()?;
    println!("Output device: {}", playback.device_name());

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.play_samples(samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
