//! Local CLI for running a policy document against a proposal/context
//! pair without standing up a host process.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dataguard_core::{GuardianDecision, PolicySpec, ToolCallContext, ToolCallProposal};
use dataguard_orchestrator::DecisionOrchestrator;
use dataguard_risk::HeuristicScorer;
use dataguard_telemetry::TracingObserver;

#[derive(Parser, Debug)]
#[command(name = "dataguard", about = "Evaluate a tool call proposal against a policy")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a proposal/context pair against a policy document and
    /// print the resulting decision as JSON.
    Evaluate {
        #[arg(short, long)]
        policy: PathBuf,
        #[arg(short = 'r', long)]
        proposal: PathBuf,
        #[arg(short, long)]
        context: PathBuf,
        /// Log every decision via `tracing` in addition to printing it.
        #[arg(long, default_value_t = false)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Evaluate { policy, proposal, context, trace } => {
            let decision = cmd_evaluate(&policy, &proposal, &context, trace).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
    }
    Ok(())
}

async fn cmd_evaluate(
    policy_path: &Path,
    proposal_path: &Path,
    context_path: &Path,
    trace: bool,
) -> Result<GuardianDecision> {
    let policy = load_policy(policy_path)?;
    let proposal = load_json::<ToolCallProposal>(proposal_path)?;
    let context = load_json::<ToolCallContext>(context_path)?;

    let orchestrator = DecisionOrchestrator::new(policy, HeuristicScorer::new());
    let orchestrator = if trace {
        orchestrator.with_observer(Box::new(TracingObserver))
    } else {
        orchestrator
    };

    Ok(orchestrator.evaluate(&proposal, &context).await)
}

fn load_policy(path: &Path) -> Result<PolicySpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    PolicySpec::from_json_str(&raw).with_context(|| "failed to parse policy document")
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
