//! Discovery - interview round orchestrator
//!
//! CLI entry point: runs one round per invocation and inspects stored state.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tokio::sync::broadcast;
use tracing::{debug, info};

use discovery::cli::{CacheCommand, Cli, Command, SessionCommand, get_log_path};
use discovery::config::Config;
use discovery::domain::{Answer, DiscoverySession, InterviewResult, SelectionMode};
use discovery::engine::{DiscoveryEngine, RoundRequest};
use discovery::events::{DxEvent, ProgressKind, ProgressLevel, create_event_bus, read_session_events, spawn_event_logger};
use discovery::gate::{GateOptions, LlmGate};
use discovery::llm::create_client;
use discovery::prompts::PromptLoader;
use discovery::state::{FileSessionStore, SessionStore};
use discovery::{FileProfileStore, ProfileStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("Discovery loaded config: model={}", config.llm.model);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Round {
            goal,
            session,
            project,
            context,
            answers,
            json,
        } => {
            debug!(%goal, ?session, ?project, answers = answers.len(), json, "main: matched Round command");
            cmd_round(&config, goal, session, project, context, answers, json).await
        }
        Command::Session { command } => match command {
            SessionCommand::Show { id, events } => {
                debug!(%id, events, "main: matched SessionCommand::Show");
                cmd_session_show(&config, &id, events)
            }
            SessionCommand::List => {
                debug!("main: matched SessionCommand::List");
                cmd_session_list(&config)
            }
        },
        Command::Cache { command } => match command {
            CacheCommand::Show { project } => {
                debug!(%project, "main: matched CacheCommand::Show");
                cmd_cache_show(&config, &project)
            }
            CacheCommand::Clear { project } => {
                debug!(%project, "main: matched CacheCommand::Clear");
                cmd_cache_clear(&config, &project)
            }
        },
    }
}

/// Project identity from the flag, else the current directory's name
fn resolve_project(project: Option<String>, cwd: &std::path::Path) -> String {
    project
        .or_else(|| cwd.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default".to_string())
}

/// Run one interview round
async fn cmd_round(
    config: &Config,
    goal: String,
    session_id: Option<String>,
    project: Option<String>,
    context: Option<String>,
    answers: Vec<Answer>,
    json: bool,
) -> Result<()> {
    debug!(?session_id, "cmd_round: called");
    config.validate().context("Invalid configuration")?;

    let cwd = std::env::current_dir()?;
    let sessions = FileSessionStore::new(&config.storage.sessions_dir);

    let session = match session_id {
        Some(id) => match sessions.load(&id)? {
            Some(existing) => {
                debug!(%id, round = existing.round, "cmd_round: continuing session");
                existing
            }
            None => {
                debug!(%id, "cmd_round: unknown session, creating it");
                DiscoverySession::with_id(id, goal, resolve_project(project, &cwd))
            }
        },
        None => DiscoverySession::new(goal, resolve_project(project, &cwd)),
    };

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let gate = Arc::new(LlmGate::new(client, config.llm.max_tokens));
    let profiles = Arc::new(FileProfileStore::new(&config.storage.cache_dir));

    let engine = DiscoveryEngine::new(gate, profiles, PromptLoader::new(&cwd), config.discovery.clone())?
        .with_gate_options(GateOptions {
            model: None,
            working_directory: Some(cwd.clone()),
            max_steps: config.discovery.max_steps,
        });

    let bus = create_event_bus();
    let logger = spawn_event_logger(&bus, &config.storage.events_dir);
    let printer = tokio::spawn(print_progress(bus.subscribe()));
    let emitter = bus.emitter_for(&session.session_id);

    eprintln!(
        "{} {} (session {}, project {})",
        "Round".bold(),
        session.round + 1,
        session.session_id.cyan(),
        session.project_id.cyan()
    );

    let result = engine
        .run_round(&session, RoundRequest { context, answers }, &emitter)
        .await;

    // Close the bus so the logger and printer drain and exit
    drop(emitter);
    drop(bus);
    let _ = printer.await;
    let _ = logger.await;

    let outcome = result.context("Discovery round failed")?;
    sessions.save(&outcome.session).context("Failed to save session")?;
    debug!(session_id = %outcome.session.session_id, round = outcome.session.round, "cmd_round: session saved");

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else {
        print_result(&outcome.result);
        if !outcome.failures.is_empty() {
            println!();
            println!("{}", "Failed analyses:".yellow().bold());
            for failure in &outcome.failures {
                println!("  {} {}", "✗".red(), failure);
            }
        }
        println!();
        println!(
            "Session {} saved at round {}",
            outcome.session.session_id.cyan(),
            outcome.session.round
        );
    }
    Ok(())
}

/// Print progress events to stderr until the bus closes
async fn print_progress(mut rx: broadcast::Receiver<DxEvent>) {
    loop {
        match rx.recv().await {
            Ok(DxEvent::Progress { progress, .. }) => {
                let agent = progress.agent.map(|a| format!("[{}] ", a)).unwrap_or_default();
                let line = format!("{}{}", agent, progress.message);
                match (progress.kind, progress.level) {
                    (_, ProgressLevel::Error) => {
                        let details = progress.details.map(|d| format!(": {}", d)).unwrap_or_default();
                        eprintln!("  {} {}{}", "✗".red(), line.red(), details);
                    }
                    (ProgressKind::Status, _) => eprintln!("  {} {}", "•".green(), line),
                    (ProgressKind::Agent, _) => eprintln!("  {} {}", "›".blue(), line),
                    (ProgressKind::Log, _) => eprintln!("    {}", line.dimmed()),
                }
            }
            Ok(DxEvent::RoundStarted { .. }) | Ok(DxEvent::RoundCompleted { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("  {} {} progress events dropped", "!".yellow(), n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_result(result: &InterviewResult) {
    println!();
    println!("{} {}/100", "Readiness:".bold(), result.readiness_score);
    println!("{} {}", "Direction:".bold(), result.direction_summary);

    println!();
    println!("{}", "Questions:".bold());
    for (n, question) in result.questions.iter().enumerate() {
        let mode = match question.selection {
            SelectionMode::Single => "pick one",
            SelectionMode::Multi => "pick any",
        };
        println!("  {}. {} {}", n + 1, question.prompt, format!("({}, id: {})", mode, question.id).dimmed());
        for option in &question.options {
            if *option == question.recommended_option {
                println!("     - {} {}", option.green(), "(recommended)".green());
            } else {
                println!("     - {}", option);
            }
        }
    }

    if !result.missing_critical_info.is_empty() {
        println!();
        println!("{}", "Missing critical info:".bold());
        for item in &result.missing_critical_info {
            println!("  - {}", item);
        }
    }

    if !result.draft_specification.trim().is_empty() {
        println!();
        println!("{}", "Draft specification:".bold());
        println!("{}", result.draft_specification.trim());
    }
}

/// Print a stored session
fn cmd_session_show(config: &Config, id: &str, events: bool) -> Result<()> {
    debug!(%id, events, "cmd_session_show: called");
    let sessions = FileSessionStore::new(&config.storage.sessions_dir);
    let session = sessions.load(id)?.ok_or_else(|| eyre!("Session not found: {}", id))?;
    println!("{}", serde_json::to_string_pretty(&session)?);

    if events {
        let entries = read_session_events(&config.storage.events_dir, id)?;
        println!();
        println!("{} ({})", "Events:".bold(), entries.len());
        for entry in entries {
            println!("{}", serde_json::to_string(&entry)?);
        }
    }
    Ok(())
}

/// List stored sessions
fn cmd_session_list(config: &Config) -> Result<()> {
    debug!("cmd_session_list: called");
    let sessions = FileSessionStore::new(&config.storage.sessions_dir);
    let ids = sessions.list()?;
    if ids.is_empty() {
        println!("No sessions found");
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

/// Print a project's cached profile
fn cmd_cache_show(config: &Config, project: &str) -> Result<()> {
    debug!(%project, "cmd_cache_show: called");
    let store = FileProfileStore::new(&config.storage.cache_dir);
    match store.read(project) {
        Some(artifact) => println!("{}", serde_json::to_string_pretty(&artifact)?),
        None => println!("No cached profile for {}", project),
    }
    Ok(())
}

/// Delete a project's cached profile
fn cmd_cache_clear(config: &Config, project: &str) -> Result<()> {
    debug!(%project, "cmd_cache_clear: called");
    let store = FileProfileStore::new(&config.storage.cache_dir);
    let path: PathBuf = store.path_for(project);
    if store.clear(project) {
        println!("Cleared cached profile {}", path.display());
    } else {
        println!("No cached profile for {}", project);
    }
    Ok(())
}
