//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::{Profile, Sex};

/// triage-rs: symptom triage dialogue engine.
///
/// Asks retrieval-grounded follow-up questions, commits to a bounded
/// diagnosis and explains the advice, optionally through an
/// OpenAI-compatible model.
#[derive(Parser, Debug)]
#[command(name = "triage-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a knowledge JSON file.
    ///
    /// Defaults to the bundled knowledge base.
    #[arg(short, long, env = "TRIAGE_KNOWLEDGE", global = true)]
    pub knowledge: Option<PathBuf>,

    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Ignore configured API keys and the embedding model.
    #[arg(long, global = true)]
    pub offline: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Patient profile flags shared by session commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Patient age in years.
    #[arg(long)]
    pub age: Option<u32>,

    /// Patient sex (female, male, unspecified).
    #[arg(long)]
    pub sex: Option<String>,

    /// Known pre-existing condition (repeatable or comma separated).
    #[arg(long = "known-condition", value_delimiter = ',')]
    pub known_conditions: Vec<String>,
}

impl ProfileArgs {
    /// Builds the profile.
    #[must_use]
    pub fn to_profile(&self) -> Profile {
        let base = Profile {
            age: self.age,
            sex: self.sex.as_deref().map(Sex::parse).unwrap_or_default(),
            known_conditions: Vec::new(),
        };
        self.known_conditions
            .iter()
            .fold(base, |p, c| p.known_condition(c))
    }
}

/// Dialogue flags shared by session commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Follow-up cap before a diagnosis is forced.
    #[arg(long, env = "TRIAGE_MAX_FOLLOW_UPS")]
    pub max_follow_ups: Option<u32>,

    /// Directory with prompt template overrides.
    #[arg(long, env = "TRIAGE_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// Explanation model.
    #[arg(long, env = "TRIAGE_MODEL")]
    pub model: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate the knowledge base.
    #[command(after_help = r#"Examples:
  triage-rs check                          # Validate the bundled knowledge
  triage-rs --knowledge kb.json check      # Validate a custom file
"#)]
    Check,

    /// Rank knowledge-base symptoms against free text.
    #[command(after_help = r#"Examples:
  triage-rs search "hot and coughing"
  triage-rs search "headache" --exclude 7,8
  triage-rs --format json search "rash" --known-condition asthma
"#)]
    Search {
        /// Symptom description.
        text: String,

        /// Symptom ids to exclude (comma separated).
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<u32>,

        /// Patient profile.
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Run a scripted session, one argument per user turn.
    #[command(after_help = r#"Examples:
  triage-rs ask "I have a fever" "yes" "no"
  triage-rs --offline --format ndjson ask "chest pain" "yes" --age 70
"#)]
    Ask {
        /// User turns, in order.
        #[arg(required = true, num_args = 1..)]
        turns: Vec<String>,

        /// Patient profile.
        #[command(flatten)]
        profile: ProfileArgs,

        /// Dialogue settings.
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Interactive session on stdin.
    ///
    /// Type `quit` or send EOF to stop.
    Chat {
        /// Patient profile.
        #[command(flatten)]
        profile: ProfileArgs,

        /// Dialogue settings.
        #[command(flatten)]
        session: SessionArgs,

        /// Write the transcript here when the session ends.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Write the default prompt templates for customization.
    #[command(after_help = r#"Examples:
  triage-rs init-prompts                  # ~/.config/triage-rs/prompts
  triage-rs init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "triage-rs",
            "search",
            "fever",
            "--exclude",
            "1,2",
            "--age",
            "70",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                text,
                exclude,
                profile,
            } => {
                assert_eq!(text, "fever");
                assert_eq!(exclude, vec![1, 2]);
                assert_eq!(profile.age, Some(70));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_ask_with_globals() {
        let cli = Cli::try_parse_from([
            "triage-rs",
            "ask",
            "I have a fever",
            "yes",
            "--offline",
            "--format",
            "json",
            "--known-condition",
            "Asthma,diabetes",
        ])
        .unwrap();
        assert!(cli.offline);
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Ask { turns, profile, .. } => {
                assert_eq!(turns, vec!["I have a fever", "yes"]);
                let p = profile.to_profile();
                assert_eq!(p.known_conditions.len(), 2);
                assert!(p.has_condition(&"asthma".into()));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ask_requires_turns() {
        assert!(Cli::try_parse_from(["triage-rs", "ask"]).is_err());
    }

    #[test]
    fn test_profile_sex() {
        let args = ProfileArgs {
            sex: Some("F".to_string()),
            ..ProfileArgs::default()
        };
        assert_eq!(args.to_profile().sex, Sex::Female);
        assert_eq!(ProfileArgs::default().to_profile(), Profile::default());
    }
}
