//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::Answer;

/// Discovery - structured interview rounds for a product goal
#[derive(Parser)]
#[command(
    name = "dx",
    about = "Run discovery interview rounds against a product goal",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one interview round
    Round {
        /// Product goal (used when the session is new)
        #[arg(short, long)]
        goal: String,

        /// Session to continue; a new one is created when absent or unknown
        #[arg(short, long)]
        session: Option<String>,

        /// Project identity for the profile cache (defaults to the current directory name)
        #[arg(short, long)]
        project: Option<String>,

        /// Additional free-text context for this round
        #[arg(long)]
        context: Option<String>,

        /// Answer to a previous question, as QUESTION_ID=TEXT (repeatable)
        #[arg(short, long = "answer", value_name = "QID=TEXT", value_parser = parse_answer)]
        answers: Vec<Answer>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect stored sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Inspect or clear cached project profiles
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Print a stored session as JSON
    Show {
        /// Session ID
        id: String,

        /// Also print the session's logged progress events
        #[arg(short, long)]
        events: bool,
    },

    /// List stored session IDs
    List,
}

/// Profile cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Print a project's cached profile
    Show {
        /// Project ID
        project: String,
    },

    /// Delete a project's cached profile
    Clear {
        /// Project ID
        project: String,
    },
}

/// Parse `QUESTION_ID=TEXT`
pub fn parse_answer(raw: &str) -> Result<Answer, String> {
    debug!(%raw, "parse_answer: called");
    match raw.split_once('=') {
        Some((qid, text)) if !qid.trim().is_empty() && !text.trim().is_empty() => {
            Ok(Answer::new(qid.trim(), text.trim()))
        }
        _ => Err(format!("expected QUESTION_ID=TEXT, got '{}'", raw)),
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("discovery")
        .join("logs")
        .join("dx.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_answer() {
        let answer = parse_answer("primary-users = Dentists and their front desk").unwrap();
        assert_eq!(answer.question_id, "primary-users");
        assert_eq!(answer.answer, "Dentists and their front desk");

        // Only the first '=' splits
        assert_eq!(parse_answer("q=a=b").unwrap().answer, "a=b");

        assert!(parse_answer("no-separator").is_err());
        assert!(parse_answer("=text").is_err());
        assert!(parse_answer("q=  ").is_err());
    }

    #[test]
    fn test_round_args() {
        let cli = Cli::try_parse_from([
            "dx", "round", "--goal", "Build a CRM", "-a", "q1=yes", "-a", "q2=no", "--json",
        ])
        .unwrap();

        match cli.command {
            Command::Round { goal, answers, json, session, .. } => {
                assert_eq!(goal, "Build a CRM");
                assert_eq!(answers.len(), 2);
                assert!(json);
                assert!(session.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
