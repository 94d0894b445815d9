//! Interactive session runner

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::style::Stylize;
use flagsolve_core::agents::{Orchestrator, Prompts, TurnOutcome};
use flagsolve_core::config::SolverConfig;
use flagsolve_core::providers::create_provider;
use flagsolve_core::sandbox::DockerSandbox;
use flagsolve_core::state::{MetricsTracker, SqliteStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::args::Args;
use crate::console::{self, ConsoleSink};

/// Run the interactive solve loop to completion
pub async fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let session_id = session_id(&args, &config);

    let prompts = Prompts::default();
    let metrics = MetricsTracker::new();
    let provider =
        create_provider(&config.provider, metrics).context("failed to build LLM provider")?;
    let driver = Arc::new(
        DockerSandbox::connect(config.sandbox.clone())
            .await
            .context("failed to connect to Docker; is the daemon running?")?,
    );
    let store = Arc::new(
        SqliteStore::open(config.output.session_dir.join("flagsolve.db"))
            .context("failed to open session store")?,
    );

    let mut orchestrator = Orchestrator::new(
        session_id.as_str(),
        &config,
        &prompts,
        provider,
        driver,
        store,
        Arc::new(ConsoleSink::new()),
    )?;

    console::print_welcome(&session_id, config.budgets.coordinator_steps);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n{} ", "user>".blue().bold());
        std::io::stdout().flush()?;

        // Ctrl-C at the prompt ends the session; cleanup still runs below
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let input = compose_input(&orchestrator, &config, input);

        // Ctrl-C during a turn cancels it without ending the session
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let outcome = orchestrator.run_turn(&input, &cancel).await;
        watcher.abort();

        match outcome {
            Ok(TurnOutcome::Completed { .. }) => {}
            Ok(TurnOutcome::BudgetExhausted { partial }) => {
                console::print_info("Partial progress:");
                println!("{}", partial.dim());
            }
            Ok(TurnOutcome::Cancelled) => {
                console::print_info("Turn interrupted; session state preserved.");
            }
            Err(e) => {
                eprintln!("{}", format!("error: {}", e).red().bold());
            }
        }
    }

    // Mandatory cleanup: tear down the sandbox before the process exits.
    // Failures are logged inside release and never block shutdown.
    console::print_info("Cleaning up sandbox...");
    orchestrator.shutdown().await;

    let metrics = orchestrator.metrics();
    info!(
        "Session '{}' finished: {} model calls, {} tool calls, {} in / {} out tokens",
        session_id,
        metrics.model_calls,
        metrics.tool_calls,
        metrics.input_tokens,
        metrics.output_tokens
    );

    Ok(())
}

/// Load config from disk and apply CLI overrides
fn build_config(args: &Args) -> Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SolverConfig::load_default(),
    };
    config.expand_env_vars();

    if let Some(target) = &args.target {
        config.target.host = target.clone();
    }
    if let Some(model) = &args.model {
        config.provider.model = model.clone();
    }
    if let Some(steps) = args.steps {
        config.budgets.coordinator_steps = steps;
    }
    if args.no_delegation {
        config.budgets.coordinator_tools.retain(|t| t != "delegate");
    }

    Ok(config)
}

/// Session id: explicit --session wins, else date + target
fn session_id(args: &Args, config: &SolverConfig) -> String {
    if let Some(session) = &args.session {
        return session.clone();
    }
    let date = Utc::now().format("%Y-%m-%d");
    if config.target.host.is_empty() {
        format!("{}-interactive", date)
    } else {
        format!("{}-{}", date, config.target.host.replace(['.', '/', ':'], "-"))
    }
}

/// Prepend the configured target to the first message of a fresh session
fn compose_input(orchestrator: &Orchestrator, config: &SolverConfig, input: &str) -> String {
    if orchestrator.history().is_empty() && !config.target.host.is_empty() {
        format!("Target: {}\n\n{}", config.target.host, input)
    } else {
        input.to_string()
    }
}
