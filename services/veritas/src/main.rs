use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use veritas_core::Command;
use veritas_core::catalogue::{ProcedureCatalogue, StaticCatalogue};
use veritas_core::completion;
use veritas_core::engine::{DecisionEngine, EngineConfig};
use veritas_core::prompt::PromptSet;
use veritas_core::session::{LiveSession, SessionConfig};
use veritas_core::state::SessionState;
use veritas_core::timefmt::format_duration;
use veritas_service::config::Config;
use veritas_service::speech::{self, ConsoleSpeech, SpeechOutput};
use veritas_service::{prompt_loader, transcript_input};

#[derive(Parser)]
#[command(version, about = "Live session assistant for the operating room")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live session, reading transcript lines from stdin.
    Run {
        /// Procedure id from the catalogue, e.g. "cholecystectomy".
        #[arg(long)]
        procedure: String,
        /// Last name of the attending surgeon, if known up front.
        #[arg(long)]
        attending: Option<String>,
    },
    /// List the procedures in the catalogue.
    Procedures,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let cli = Cli::parse();

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    // Logs go to stderr; stdout carries the assistant's speech and the final report.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting Veritas...");

    // --- 4. Load the Procedure Catalogue ---
    let catalogue = match &config.catalogue_path {
        Some(path) => StaticCatalogue::load(path)
            .with_context(|| format!("Failed to load catalogue from {}", path.display()))?,
        None => StaticCatalogue::builtin(),
    };

    match cli.command {
        Commands::Procedures => {
            list_procedures(&catalogue);
            Ok(())
        }
        Commands::Run {
            procedure,
            attending,
        } => run_session(&config, &catalogue, &procedure, attending).await,
    }
}

fn list_procedures(catalogue: &StaticCatalogue) {
    for id in catalogue.procedure_ids() {
        if let Ok(procedure) = catalogue.get_procedure(id) {
            println!("{id}\t{} ({} steps)", procedure.name, procedure.steps.len());
        }
    }
}

async fn run_session(
    config: &Config,
    catalogue: &StaticCatalogue,
    procedure_id: &str,
    attending: Option<String>,
) -> Result<()> {
    // Unknown procedures fail here, before any session exists.
    let procedure = Arc::new(
        catalogue
            .get_procedure(procedure_id)
            .context("Cannot start a session")?
            .clone(),
    );

    // --- 5. Build the Decision Engine ---
    let completion = completion::connect(
        config.provider,
        config.openai_api_key.as_ref(),
        config.gemini_api_key.as_ref(),
        &config.chat_model,
    )?;

    let mut prompts = PromptSet::builtin();
    if let Some(dir) = &config.prompts_dir {
        let overrides = prompt_loader::load_prompts(dir).context("Failed to load LLM prompts")?;
        tracing::info!("Loaded {} prompt overrides.", overrides.len());
        prompts = prompts.with_overrides(&overrides);
    }

    let engine = Arc::new(
        DecisionEngine::new(completion)
            .with_prompts(prompts)
            .with_config(EngineConfig {
                completion_timeout: config.completion_timeout,
                ..EngineConfig::default()
            }),
    );

    // --- 6. Start the Live Session ---
    let (session, mut command_rx) = LiveSession::spawn(
        engine,
        Arc::clone(&procedure),
        SessionState::with_attending(attending),
        SessionConfig {
            window: config.transcript_window,
            ..SessionConfig::default()
        },
    );
    tracing::info!(procedure = %procedure.name, "Session ready. Send SESSION_START to begin the time-out.");

    // Executes the session's side effects. Ends when the session drops its sender.
    let speech_output: Arc<dyn SpeechOutput> = Arc::new(ConsoleSpeech::stdout());
    let command_handle = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                Command::SpeakText(text) => {
                    speech::deliver(speech_output.as_ref(), &text).await;
                }
                Command::LogNote(note) => tracing::info!(%note, "Note recorded"),
                Command::SessionComplete(summary) => {
                    speech::deliver(speech_output.as_ref(), &summary).await;
                }
            }
        }
    });

    // --- 7. Feed Transcript Lines Until EOF or Ctrl-C ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read transcript from stdin")? {
                    Some(line) => {
                        if let Some(entry) = transcript_input::parse_line(&line) {
                            session.push(entry).await?;
                        }
                    }
                    None => {
                        tracing::info!("Transcript input closed.");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, ending the session.");
                break;
            }
        }
    }

    // --- 8. End the Session and Report ---
    let report = session.end().await?;
    command_handle
        .await
        .context("Command handler task failed")?;

    tracing::info!(
        "Session lasted {} with {} notes.",
        format_duration(report.state.time_elapsed_in_session),
        report.notes.len()
    );
    println!("{}", serde_json::to_string_pretty(&report.state)?);
    for note in &report.notes {
        println!("note: {note}");
    }
    Ok(())
}
