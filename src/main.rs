use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crab_voice::voice::Synthesizer;
use crab_voice::voice::console::{ConsoleRecognizer, ConsoleSynthesizer};
use crab_voice::{
    Config, ConsoleSink, Controller, Dispatcher, EchoSuppressor, GeminiClient, LanguageModel,
    NoLookups, OfflineModel, SpeechAdapter, VoicePreset, classify,
};

/// Crab - voice conversation core for a personal assistant
#[derive(Parser)]
#[command(name = "crab", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/crab/config.toml)
    #[arg(short, long, env = "CRAB_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the voice loop in the terminal (typed lines stand in for speech)
    Run,
    /// Show which native command a phrase maps to
    Classify {
        /// Phrase to classify
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List voice presets
    Voices,
    /// Check whether an utterance would be rejected as echo or duplicate
    CheckEcho {
        /// What the recognizer heard
        utterance: String,
        /// What the assistant last said
        #[arg(short, long, default_value = "")]
        reply: String,
        /// Last committed utterance
        #[arg(short, long, default_value = "")]
        last: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,crab_voice=info",
        1 => "info,crab_voice=debug",
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
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = match &cli.config {
                Some(path) => Config::load_from(path)?,
                None => Config::load()?,
            };
            run_console(config).await
        }
        Command::Classify { text } => {
            let text = text.join(" ");
            println!("{:?}", classify(&text));
            Ok(())
        }
        Command::Voices => {
            for preset in VoicePreset::all() {
                println!(
                    "{:<8} {:?}\tpitch {:.2}\trate {:.2}\t{}",
                    preset.id,
                    preset.gender,
                    preset.pitch,
                    preset.rate,
                    preset.terms.join(", ")
                );
            }
            Ok(())
        }
        Command::CheckEcho {
            utterance,
            reply,
            last,
        } => {
            println!("{:?}", EchoSuppressor::evaluate(&utterance, &reply, &last));
            Ok(())
        }
    }
}

async fn run_console(config: Config) -> anyhow::Result<()> {
    let model: Arc<dyn LanguageModel> = match config.llm.api_key.clone() {
        Some(key) => Arc::new(GeminiClient::new(key, config.llm.model.clone())?),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, conversational replies will use the fallback");
            Arc::new(OfflineModel)
        }
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let recognizer = Arc::new(ConsoleRecognizer::new(events_tx));
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(ConsoleSynthesizer::new(&config.agent_name));
    let adapter = SpeechAdapter::new(
        recognizer.clone(),
        Some(synthesizer),
        config.timing.restart_delay,
    );

    let sink = Arc::new(ConsoleSink::new());
    let dispatcher = Dispatcher::new(model, sink.clone(), Arc::new(NoLookups));

    let (dictation_tx, mut dictation_rx) = mpsc::unbounded_channel();
    let (controller, handle) = Controller::new(
        config.state_machine()?,
        adapter,
        dispatcher,
        events_rx,
        config.voice.clone(),
    );
    let task = tokio::spawn(controller.with_dictation(dictation_tx).run());

    tracing::info!(
        agent = %config.agent_name,
        wake_phrase = %config.wake_phrase,
        voice = %config.voice,
        "starting crab"
    );
    println!(
        "Say \"{}\" to begin. Commands: /close /dictate /done /steps N /status /quit",
        config.wake_phrase
    );
    handle.activate();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" => break,
                    "/close" => handle.close(),
                    "/dictate" => handle.enter_dictation(),
                    "/done" => handle.exit_dictation(),
                    "/status" => println!("{:?}", handle.snapshot()),
                    other => match other.strip_prefix("/steps") {
                        Some(count) => match count.trim().parse() {
                            Ok(steps) => sink.set_steps(steps).await,
                            Err(_) => println!("usage: /steps N"),
                        },
                        None => recognizer.feed(&line),
                    },
                }
            }
            Some(text) = dictation_rx.recv() => println!("[dictation] {text}"),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown();
    task.await?;
    Ok(())
}
