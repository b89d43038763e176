use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use coordination::debate::{DebateOrchestrator, Roster};
use coordination::memory::{Reflection, ReflectionMemory};
use coordination::trust::{JsonTrustStore, TrustStore};
use tracing::{error, info};

use glassbox_agents::debate_backend::LlmAgentBackend;
use glassbox_agents::llm::OpenAiClient;
use glassbox_agents::tracker::{GhCliHost, IssueHost};
use glassbox_agents::workspace::{GitWorkingTree, SourceFilter};
use glassbox_agents::{RetryPipeline, Settings};

/// Autonomous issue fixing and multi-agent debate.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML settings file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify, fix, test and open a PR for one issue
    Fix {
        issue: u64,
    },
    /// Ask every agent once and pick the highest-trust answer
    Consensus {
        task: String,
        /// Comma-separated agent ids (default: all)
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
    },
    /// Three-round debate followed by a persuasion judgment
    Debate {
        task: String,
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
    },
    /// Inspect or edit trust scores
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },
    /// List past failure reflections, newest first
    Reflections {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TrustAction {
    /// All scores, highest first
    Show,
    /// Counters and accuracy for one agent
    Stats { agent: String },
    /// Restore one agent, or every agent, to the default score
    Reset { agent: Option<String> },
    /// Record one outcome by hand
    #[command(group(ArgGroup::new("outcome").required(true).args(["correct", "incorrect"])))]
    Record {
        agent: String,
        #[arg(long)]
        correct: bool,
        #[arg(long)]
        incorrect: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Command::Fix { issue } => run_fix(settings, issue).await,
        Command::Consensus { task, agents } => run_consensus(&settings, &task, agents).await,
        Command::Debate { task, agents } => run_debate(&settings, &task, agents).await,
        Command::Trust { action } => run_trust(&settings, action),
        Command::Reflections { keyword, limit } => run_reflections(&settings, keyword, limit),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn llm_client(settings: &Settings) -> Arc<OpenAiClient> {
    Arc::new(OpenAiClient::new(
        &settings.api_base,
        settings.api_key.clone(),
        settings.request_timeout(),
    ))
}

async fn run_fix(settings: Settings, issue: u64) -> Result<()> {
    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    let host = Arc::new(GhCliHost::new(&settings.repo, &root)?);

    let outcome = match fix_issue(&settings, host.clone(), root, issue).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let note = format!("**Manager**\n\nAgent crashed: `{:.300}`", format!("{e:#}"));
            if let Err(post_err) = host.post_comment(issue, &note) {
                error!(issue, error = %post_err, "Could not report the crash");
            }
            return Err(e);
        }
    };

    info!(issue, status = ?outcome.status, attempts = outcome.attempts, "Fix run complete");
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
    );
    Ok(())
}

async fn fix_issue(
    settings: &Settings,
    host: Arc<GhCliHost>,
    root: PathBuf,
    issue: u64,
) -> Result<glassbox_agents::RunOutcome> {
    let templates = settings.load_templates()?;
    let memory = ReflectionMemory::open(&settings.reflections_path).with_context(|| {
        format!(
            "Failed to open reflections at {}",
            settings.reflections_path.display()
        )
    })?;
    let tree = Arc::new(GitWorkingTree::new(&root, SourceFilter::from_settings(settings))?);

    let mut pipeline = RetryPipeline::new(
        settings.clone(),
        llm_client(settings),
        host,
        tree,
        templates,
        memory,
    );
    Ok(pipeline.run(issue).await?)
}

fn orchestrator(settings: &Settings) -> Result<DebateOrchestrator> {
    let trust = open_trust(settings)?;
    let backend = Arc::new(LlmAgentBackend::new(llm_client(settings)));
    Ok(DebateOrchestrator::new(trust, backend, Roster::default()))
}

async fn run_consensus(settings: &Settings, task: &str, agents: Option<Vec<String>>) -> Result<()> {
    let report = orchestrator(settings)?
        .consensus(task, agents.as_deref())
        .await?;
    println!("{}", report.render());
    Ok(())
}

async fn run_debate(settings: &Settings, task: &str, agents: Option<Vec<String>>) -> Result<()> {
    let report = orchestrator(settings)?.debate(task, agents.as_deref()).await?;
    println!("{}", report.render());
    Ok(())
}

fn open_trust(settings: &Settings) -> Result<Arc<JsonTrustStore>> {
    let store = JsonTrustStore::open(&settings.trust_path).with_context(|| {
        format!(
            "Failed to open trust store at {}",
            settings.trust_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

fn run_trust(settings: &Settings, action: TrustAction) -> Result<()> {
    let store = open_trust(settings)?;
    match action {
        TrustAction::Show => {
            for (agent, score) in store.all() {
                println!("{agent:<16} {score:.3}");
            }
        }
        TrustAction::Stats { agent } => match store.stats(&agent) {
            Some(stats) => println!(
                "{}: score {:.3}, {}/{} correct ({:.0}%)",
                stats.agent_id,
                stats.score,
                stats.correct_count,
                stats.total_count,
                stats.accuracy
            ),
            None => println!(
                "{agent}: no record (default score {:.3})",
                store.get(&agent)
            ),
        },
        TrustAction::Reset { agent } => {
            store.reset(agent.as_deref())?;
            println!("reset {}", agent.as_deref().unwrap_or("all agents"));
        }
        TrustAction::Record { agent, correct, .. } => {
            let before = store.get(&agent);
            let after = store.update(&agent, correct)?;
            println!("{agent}: {before:.3} -> {after:.3}");
        }
    }
    Ok(())
}

fn run_reflections(settings: &Settings, keyword: Option<String>, limit: usize) -> Result<()> {
    let memory = ReflectionMemory::open(&settings.reflections_path)?;
    let entries: Vec<&Reflection> = match keyword.as_deref() {
        Some(k) => memory.query(k, limit),
        None => memory.all().iter().rev().take(limit).collect(),
    };
    if entries.is_empty() {
        println!("no reflections");
    }
    for r in entries {
        println!(
            "#{} {} [{}] {}",
            r.issue_number,
            r.issue_title,
            r.template_id.as_deref().unwrap_or("unknown"),
            stamp(r.recorded_at)
        );
        if !r.failure_modes.is_empty() {
            println!("  failed at: {}", r.failure_modes.join(", "));
        }
        println!("  {}", r.reflection.replace('\n', "\n  "));
    }
    Ok(())
}

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}
