use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use biopsy::gate::TurnGate;
use biopsy::index::{EnsureOutcome, IndexBuilder};
use biopsy::openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder};
use biopsy::provider::EmbeddingProvider;
use biopsy::voice::{
    AudioCapture, AudioPlayback, SpeechToText, TextToSpeech, VadRecorder, rms, samples_to_wav,
};
use biopsy::{Config, Dataset, Retriever, Session, TurnOutcome};

/// `BioPsy` - voice counseling assistant with retrieval-augmented replies
#[derive(Parser)]
#[command(name = "biopsy", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/biopsy/config.toml)
    #[arg(short, long, env = "BIOPSY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the retrieval index from the counseling corpus
    BuildIndex {
        /// Rebuild even if the index is up to date
        #[arg(short, long)]
        force: bool,
    },
    /// Show the examples retrieved for a query
    Search {
        query: String,
        /// Number of examples
        #[arg(short, default_value = "3")]
        k: usize,
        /// Only search one dataset (e.g. HOPE, HQC)
        #[arg(short, long)]
        dataset: Option<String>,
    },
    /// Text conversation on stdin
    Chat,
    /// Voice conversation through microphone and speakers (default)
    Voice,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speech synthesis and playback
    TestTts {
        /// Text to speak
        #[arg(default_value = "Halo, aku BioPsy. Ini tes suara.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,biopsy=info",
        1 => "info,biopsy=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli
        .config
        .as_deref()
        .map_or_else(Config::load, Config::load_from_file);
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Voice) {
        Command::BuildIndex { force } => build_index(&config, force).await,
        Command::Search { query, k, dataset } => {
            search(&config, &query, k, dataset.as_deref()).await
        }
        Command::Chat => chat(&config).await,
        Command::Voice => voice(&config).await,
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

fn embedder(config: &Config, client: &Arc<OpenAiClient>) -> Arc<dyn EmbeddingProvider> {
    Arc::new(OpenAiEmbedder::new(Arc::clone(client), &config.models.embed))
}

/// Make sure a current index exists, then open it
async fn open_retriever(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
    force: bool,
) -> anyhow::Result<Retriever> {
    let builder = IndexBuilder::new(
        config.index_paths(),
        config.corpus_paths(),
        Arc::clone(&embedder),
    );

    if let EnsureOutcome::Built(report) = builder.ensure(force).await? {
        tracing::info!(
            pairs = report.pairs,
            dimension = report.dimension,
            "index built"
        );
    }

    Ok(Retriever::open(&config.paths.index_dir, embedder)?)
}

async fn open_session(config: &Config, client: &Arc<OpenAiClient>) -> anyhow::Result<Session> {
    let retriever = open_retriever(
        config,
        embedder(config, client),
        config.retrieval.force_rebuild,
    )
    .await?;

    let chat = OpenAiChat::new(Arc::clone(client), &config.models.chat)
        .with_temperature(config.models.chat_temperature);

    Ok(
        Session::new(TurnGate::new(config.enable_safety), retriever, Arc::new(chat))
            .with_top_k(config.retrieval.top_k)
            .with_dataset_filter(config.retrieval.dataset_filter.clone()),
    )
}

async fn build_index(config: &Config, force: bool) -> anyhow::Result<()> {
    let client = Arc::new(config.openai_client()?);
    let builder = IndexBuilder::new(
        config.index_paths(),
        config.corpus_paths(),
        embedder(config, &client),
    );

    match builder.ensure(force || config.retrieval.force_rebuild).await? {
        EnsureOutcome::Fresh => {
            println!("Index is up to date: {}", config.paths.index_dir.display());
        }
        EnsureOutcome::Built(report) => {
            println!(
                "Indexed {} pairs ({} dimensions) into {}",
                report.pairs,
                report.dimension,
                config.paths.index_dir.display()
            );
        }
    }

    Ok(())
}

async fn search(
    config: &Config,
    query: &str,
    k: usize,
    dataset: Option<&str>,
) -> anyhow::Result<()> {
    let client = Arc::new(config.openai_client()?);
    let retriever = open_retriever(config, embedder(config, &client), false).await?;

    let filter = dataset.map(Dataset::from);
    let results = retriever.search(query, k, filter.as_ref()).await?;

    if results.is_empty() {
        println!("No examples found.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let dataset = result.dataset.as_ref().map_or("?", Dataset::as_str);
        let session = result.session_id.as_deref().unwrap_or("?");
        let score = result.score.unwrap_or_default();
        println!("#{} [{dataset} {session}] score={score:.3}", rank + 1);
        println!("{}\n", result.text);
    }

    Ok(())
}

fn print_reply(outcome: &TurnOutcome) {
    if let Some(mood) = outcome.mood {
        println!("[Kondisi emosional: {} ({}/10)]", mood.zone().label(), mood.score);
    }
    if let Some(reply) = &outcome.reply {
        println!("BioPsy: {reply}\n");
    }
}

async fn chat(config: &Config) -> anyhow::Result<()> {
    let client = Arc::new(config.openai_client()?);
    let session = open_session(config, &client).await?;

    println!("BioPsy text session. Ctrl+D to exit.\n");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match session.handle(&line).await {
            Ok(outcome) => {
                print_reply(&outcome);
                if outcome.ends_session() {
                    break;
                }
            }
            Err(e) => tracing::error!(error = %e, "turn failed"),
        }
    }

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn voice(config: &Config) -> anyhow::Result<()> {
    let client = Arc::new(config.openai_client()?);
    let session = open_session(config, &client).await?;
    let stt = SpeechToText::new(Arc::clone(&client), &config.models.stt);
    let tts = TextToSpeech::new(Arc::clone(&client), &config.models.tts, &config.models.tts_voice);

    std::fs::create_dir_all(&config.paths.tmp_dir)?;
    let mut capture = AudioCapture::new(config.audio.sample_rate)?;

    println!("BioPsy voice session. Ctrl+C to exit.\n");

    tokio::select! {
        result = voice_loop(config, &session, &stt, &tts, &mut capture) => result,
        _ = tokio::signal::ctrl_c() => {
            println!();
            tracing::info!("interrupted");
            Ok(())
        }
    }
}

#[allow(clippy::future_not_send)]
async fn voice_loop(
    config: &Config,
    session: &Session,
    stt: &SpeechToText,
    tts: &TextToSpeech,
    capture: &mut AudioCapture,
) -> anyhow::Result<()> {
    let user_wav = config.paths.tmp_dir.join("user.wav");
    let reply_mp3 = config.paths.tmp_dir.join("assistant.mp3");

    loop {
        println!("Listening... (speak now, recording stops when you pause)");
        let samples = VadRecorder::new(config.vad_settings())
            .record(capture)
            .await?;
        let wav = samples_to_wav(&samples, capture.sample_rate())?;
        std::fs::write(&user_wav, &wav)?;

        let transcript = match stt.transcribe(&wav).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                continue;
            }
        };

        if transcript.is_empty() {
            println!("(nothing heard) Please try again.\n");
            continue;
        }
        println!("You: {transcript}");

        let outcome = match session.handle(&transcript).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                continue;
            }
        };

        print_reply(&outcome);
        if let Some(reply) = &outcome.reply {
            if let Err(e) = speak(tts, reply, &reply_mp3).await {
                tracing::warn!(error = %e, "could not speak reply");
            }
        }

        if outcome.ends_session() {
            return Ok(());
        }
    }
}

/// Synthesize, save and play a reply
async fn speak(tts: &TextToSpeech, text: &str, out_path: &Path) -> anyhow::Result<()> {
    let mp3 = tts.synthesize(text).await?;
    std::fs::write(out_path, &mp3)?;

    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&mp3)).await??;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(config.audio.sample_rate)?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("Speech threshold: {:.4}", config.audio.rms_threshold);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let marker = if energy >= config.audio.rms_threshold {
            "speech"
        } else {
            "quiet"
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}] {marker}",
            i + 1
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

/// Test speech synthesis and playback
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let client = Arc::new(config.openai_client()?);
    let tts = TextToSpeech::new(client, &config.models.tts, &config.models.tts_voice);

    std::fs::create_dir_all(&config.paths.tmp_dir)?;
    let out_path = config.paths.tmp_dir.join("tts_test.mp3");

    println!("Synthesizing with {} ({})...", config.models.tts, config.models.tts_voice);
    speak(&tts, text, &out_path).await?;

    println!("Saved to {}", out_path.display());
    println!("If you heard the voice, speech output is working!");
    Ok(())
}
