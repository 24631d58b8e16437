use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use surya::planner::Planner;
use surya::voice::{AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE, TextToSpeech, rms_energy};
use surya::{Config, Daemon};

/// Surya - voice assistant with wake word activation
#[derive(Parser)]
#[command(name = "surya", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/surya/config.toml)
    #[arg(short, long, env = "SURYA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
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
    /// Send one message to the planner and print the reply
    Ask {
        /// Message text
        text: String,

        /// Replace the configured system prompt for this request
        #[arg(short, long)]
        system: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,surya=info",
        1 => "info,surya=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
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
    let config_path = cli.config.as_deref();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(config_path, &text).await,
            Command::Ask { text, system } => ask(config_path, &text, system.as_deref()).await,
        };
    }

    let config = Config::load(config_path)?;
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;
    Ok(())
}

/// Test microphone input with a live level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your mic and watch the levels\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that the mic is plugged in and not muted.");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..PLAYBACK_SAMPLE_RATE * 2)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    tokio::task::spawn_blocking(move || {
        let playback = AudioPlayback::new()?;
        playback.play_samples(samples, || false)
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test cloud TTS and playback
async fn test_tts(config_path: Option<&std::path::Path>, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(config_path)?;
    let tts = TextToSpeech::new(
        config.openai_key()?.to_string(),
        config.llm.base_url.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    )?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || {
        let playback = AudioPlayback::new()?;
        playback.play_mp3(&mp3_data, || false)
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// One planner round trip, including tool calls
async fn ask(
    config_path: Option<&std::path::Path>,
    text: &str,
    system: Option<&str>,
) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let planner = surya::daemon::build_planner(&config)?;
    if let Some(prompt) = system {
        planner.set_system_prompt(prompt).await;
    }

    let reply = planner.respond(text).await?;
    println!("{reply}");

    Ok(())
}
