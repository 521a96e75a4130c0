//! CLI command implementations.
//!
//! Each command returns its output as a string; `chat` also writes each
//! reply to stdout as the dialogue progresses.

use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use std::io::{self, BufRead, Write as IoWrite};
use std::path::Path;
use std::sync::Arc;

use crate::agent::{
    BundleKind, EngineConfig, Orchestrator, PromptSet, SessionStore, create_completion,
};
use crate::cli::output::{OutputFormat, SearchHit, format_bundle, format_search_results};
use crate::cli::parser::{Cli, Commands, ProfileArgs, SessionArgs};
use crate::core::{SessionId, SymptomId};
use crate::embedding::create_embedder;
use crate::error::{CommandError, Result};
use crate::knowledge::KnowledgeBase;
use crate::search::IndexConfig;

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Check => cmd_check(cli, format),
        Commands::Search {
            text,
            exclude,
            profile,
        } => cmd_search(cli, text, exclude, profile, format),
        Commands::Ask {
            turns,
            profile,
            session,
        } => cmd_ask(cli, turns, profile, session, format),
        Commands::Chat {
            profile,
            session,
            transcript,
        } => cmd_chat(cli, profile, session, transcript.as_deref(), format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Resolves engine configuration: CLI flags, then environment, then defaults.
fn engine_config(cli: &Cli, session: Option<&SessionArgs>) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder();
    if let Some(session) = session {
        if let Some(n) = session.max_follow_ups {
            builder = builder.max_follow_ups(n);
        }
        if let Some(dir) = &session.prompt_dir {
            builder = builder.prompt_dir(dir);
        }
        if let Some(model) = &session.model {
            builder = builder.model(model);
        }
    }
    if cli.offline {
        builder = builder.offline();
    }
    Ok(builder.from_env().build()?)
}

fn load_knowledge(cli: &Cli, index: IndexConfig) -> Result<KnowledgeBase> {
    let embedder = if cli.offline {
        None
    } else {
        create_embedder()
    };
    KnowledgeBase::load(cli.knowledge.as_deref(), embedder, index)
}

fn knowledge_source(cli: &Cli) -> String {
    cli.knowledge
        .as_ref()
        .map_or_else(|| "bundled".to_string(), |p| p.display().to_string())
}

fn build_orchestrator(cli: &Cli, session: &SessionArgs) -> Result<Orchestrator> {
    let config = engine_config(cli, Some(session))?;
    let knowledge = load_knowledge(cli, config.index)?;
    let completion = create_completion(&config)?;
    Ok(Orchestrator::new(Arc::new(knowledge), completion, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    // Create tokio runtime as sync/async bridge
    Ok(tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?)
}

fn cmd_check(cli: &Cli, format: OutputFormat) -> Result<String> {
    let config = engine_config(cli, None)?;
    let kb = load_knowledge(cli, config.index)?;
    let source = knowledge_source(cli);
    let completion = if config.has_credentials() {
        format!("credential pool ({} key(s))", config.api_keys.len())
    } else {
        "deterministic".to_string()
    };

    match format {
        OutputFormat::Text => Ok(format!(
            "Knowledge base OK: {source}\n\
             \x20 symptoms: {}\n\
             \x20 conditions: {}\n\
             \x20 advice entries: {}\n\
             \x20 generic questions: {}\n\
             \x20 scoring: {}\n\
             \x20 completion: {completion}\n",
            kb.index.len(),
            kb.index.conditions().len(),
            kb.advice.len(),
            kb.generic_questions.len(),
            kb.index.mode(),
        )),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "source": source,
                "symptoms": kb.index.len(),
                "conditions": kb.index.conditions().len(),
                "advice_entries": kb.advice.len(),
                "generic_questions": kb.generic_questions.len(),
                "scoring": kb.index.mode().as_str(),
                "credentials": config.api_keys.len(),
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_search(
    cli: &Cli,
    text: &str,
    exclude: &[u32],
    profile: &ProfileArgs,
    format: OutputFormat,
) -> Result<String> {
    if text.trim().is_empty() {
        return Err(CommandError::InvalidArgument("search text cannot be empty".to_string()).into());
    }
    let config = engine_config(cli, None)?;
    let kb = load_knowledge(cli, config.index)?;
    let exclude: BTreeSet<SymptomId> = exclude.iter().copied().map(SymptomId).collect();
    let results = kb.index.query(text, &profile.to_profile(), &exclude);
    let mode = kb.index.mode();

    match format {
        OutputFormat::Text => Ok(format_search_results(&results, mode.as_str())),
        OutputFormat::Json => {
            let hits: Vec<SearchHit<'_>> = results.iter().map(SearchHit::from).collect();
            let json = serde_json::json!({
                "mode": mode.as_str(),
                "count": hits.len(),
                "results": hits,
            });
            Ok(format.to_json(&json))
        }
        OutputFormat::Ndjson => Ok(results
            .iter()
            .map(|s| format.to_json(&SearchHit::from(s)))
            .collect()),
    }
}

fn cmd_ask(
    cli: &Cli,
    turns: &[String],
    profile: &ProfileArgs,
    session: &SessionArgs,
    format: OutputFormat,
) -> Result<String> {
    let orchestrator = build_orchestrator(cli, session)?;
    let mut state = crate::core::SessionState::new(profile.to_profile());
    let rt = runtime()?;

    let mut exchanges = Vec::with_capacity(turns.len());
    for turn in turns {
        let bundle = rt.block_on(orchestrator.step(&mut state, turn))?;
        exchanges.push((turn.as_str(), bundle));
    }

    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for (turn, bundle) in &exchanges {
                let _ = writeln!(out, "You: {turn}");
                out.push_str(&format_bundle(bundle));
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "session_id": state.session_id,
                "diagnosed": state.is_diagnosed(),
                "turns": exchanges
                    .iter()
                    .map(|(turn, bundle)| serde_json::json!({ "user": turn, "response": bundle }))
                    .collect::<Vec<_>>(),
            });
            Ok(format.to_json(&json))
        }
        OutputFormat::Ndjson => Ok(exchanges
            .iter()
            .map(|(turn, bundle)| {
                format.to_json(&serde_json::json!({ "user": turn, "response": bundle }))
            })
            .collect()),
    }
}

fn cmd_chat(
    cli: &Cli,
    profile: &ProfileArgs,
    session: &SessionArgs,
    transcript: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let orchestrator = build_orchestrator(cli, session)?;
    let store = SessionStore::new(Arc::new(orchestrator));
    let id = store.start(profile.to_profile());
    let rt = runtime()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let diagnosed = chat_loop(&rt, &store, id, stdin.lock(), &mut stdout, format)?;

    let state = store
        .end(id)
        .ok_or_else(|| CommandError::ExecutionFailed(format!("session {id} vanished")))?;
    if let Some(path) = transcript {
        std::fs::write(path, state.transcript()).map_err(|e| {
            CommandError::ExecutionFailed(format!(
                "Failed to write transcript to {}: {e}",
                path.display()
            ))
        })?;
    }

    match format {
        OutputFormat::Text => Ok(transcript.map_or_else(String::new, |p| {
            format!("Transcript written to: {}\n", p.display())
        })),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "session_id": id,
                "diagnosed": diagnosed,
                "turns": state.turn_history.len(),
                "transcript": transcript.map(|p| p.to_string_lossy().into_owned()),
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Reads user turns from `input` until EOF, `quit`, or a diagnosis.
///
/// Returns whether the session was diagnosed.
fn chat_loop<R: BufRead, W: IoWrite>(
    rt: &tokio::runtime::Runtime,
    store: &SessionStore,
    id: SessionId,
    input: R,
    output: &mut W,
    format: OutputFormat,
) -> Result<bool> {
    if format == OutputFormat::Text {
        writeln!(output, "Describe your symptoms. Type 'quit' to stop.")?;
        write!(output, "> ")?;
        output.flush()?;
    }

    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            break;
        }
        if text.is_empty() {
            if format == OutputFormat::Text {
                write!(output, "> ")?;
                output.flush()?;
            }
            continue;
        }

        let bundle = rt.block_on(store.handle_turn(id, text))?;
        match format {
            OutputFormat::Text => write!(output, "{}", format_bundle(&bundle))?,
            OutputFormat::Json | OutputFormat::Ndjson => {
                write!(output, "{}", OutputFormat::Ndjson.to_json(&bundle))?;
            }
        }
        if bundle.kind != BundleKind::FollowUp {
            return Ok(true);
        }
        if format == OutputFormat::Text {
            write!(output, "> ")?;
        }
        output.flush()?;
    }
    Ok(false)
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(std::path::PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    let _ = writeln!(
                        output,
                        "  {}",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    );
                }
                output.push_str("\nEdit these files to customize the explanation prompt.\n");
                Ok(output)
            }
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len(),
            });
            Ok(format.to_json(&json))
        }
    }
}
