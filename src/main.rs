use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use recipe_voice::voice::{AudioInput, CpalAudioInput, CpalPlayer, PLAYBACK_SAMPLE_RATE, signal_level};
use recipe_voice::{Config, ConversationOrchestrator, Error, RecipeClient, RecipeSource, platform};

/// Recipe Voice - ask for a recipe out loud and hear it read back
#[derive(Parser)]
#[command(name = "recipe-voice", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Skip the spoken welcome
    #[arg(long, env = "RECIPE_VOICE_NO_GREETING")]
    no_greeting: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Look up a recipe from typed text and print it
    Ask {
        /// What to cook
        query: String,
    },
    /// Speak text through the synthesizer
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the recipe assistant's voice.")]
        text: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,recipe_voice=info",
        1 => "info,recipe_voice=debug",
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
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { query } => ask(&query).await,
            Command::Say { text } => say(&text).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    let config = Config::load()?;
    let orchestrator = platform::assistant(&config)?;
    interactive(&orchestrator, !cli.no_greeting).await
}

/// Each Enter press is one tap of the talk button
async fn interactive(orchestrator: &ConversationOrchestrator, greet: bool) -> anyhow::Result<()> {
    let mut status_rx = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = String::new();
        while status_rx.changed().await.is_ok() {
            let message = status_rx.borrow_and_update().status_message.clone();
            if message != last {
                println!("  {message}");
                last = message;
            }
        }
    });

    let status = orchestrator.status();
    println!("{}", status.status_message);

    if greet {
        tokio::time::sleep(Duration::from_secs(1)).await;
        orchestrator.greet().await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\n[{}] (Enter to talk, q to quit)", orchestrator.status().button_text);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        // Ctrl-C stops the conversation; it then finishes with Cancelled
        let conversation = orchestrator.start_conversation();
        tokio::pin!(conversation);
        let mut interrupted = false;
        let result = loop {
            tokio::select! {
                result = &mut conversation => break result,
                Ok(()) = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    orchestrator.stop().await;
                }
            }
        };

        match result {
            Ok(Some(_)) => println!("\n{}", orchestrator.status().recipe_details),
            Ok(None) | Err(Error::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "conversation ended with an error"),
        }
    }

    printer.abort();
    Ok(())
}

/// Look up a recipe without audio
async fn ask(query: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = RecipeClient::from_config(&config)?;

    let recipe = client.get_recipe(query).await?;
    println!("{}", recipe_voice::format_recipe_details(&recipe));

    Ok(())
}

/// Speak text through the full synthesis pipeline
async fn say(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let session = platform::audio_session()?;
    let synthesizer = platform::synthesizer(&config, session.clone())?;

    synthesizer.speak(text).await?;
    session.release().await;

    Ok(())
}

/// Test microphone input levels
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let input = CpalAudioInput::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    input.install_tap(1024, tx)?;
    input.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(buffer) = rx.try_recv() {
            samples.extend(buffer);
        }
        let (peak, rms) = signal_level(&samples);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {rms:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    input.stop();
    input.remove_tap();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that your mic is plugged in and not muted.");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let player = CpalPlayer::new()?;

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());
    player.play_samples(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}
