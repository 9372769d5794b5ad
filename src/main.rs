use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lobbyflow_core::config::{AppConfig, BackendConfig};
use lobbyflow_core::execution::{ExecutionContext, HistoryStatus};
use lobbyflow_core::traits::WorkflowBackend;
use lobbyflow_core::workflow::{TriggerType, Workflow};
use lobbyflow_engine::{dispatch, Executor, HttpBackend};

#[derive(Parser)]
#[command(name = "lobbyflow", version, about = "Run visitor-management workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "lobbyflow.toml")]
    config: PathBuf,

    /// Backend URL, overriding [backend].server_url
    #[arg(long, env = "LOBBYFLOW_SERVER_URL")]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single workflow definition
    Run {
        /// Workflow JSON file
        workflow: PathBuf,
        /// Execution context JSON file ({formData, variables, triggeredBy})
        #[arg(long)]
        context: Option<PathBuf>,
        /// Do not persist the execution record
        #[arg(long)]
        no_save: bool,
    },
    /// Check a workflow definition without running it
    Validate {
        /// Workflow JSON file
        workflow: PathBuf,
    },
    /// Run every active workflow listening for a trigger
    Dispatch {
        /// JSON file holding an array of workflows
        workflows: PathBuf,
        /// Trigger type (visitor_checkin, visitor_checkout, form_submission, manual, schedule, api)
        #[arg(long)]
        trigger: TriggerType,
        /// Execution context JSON file
        #[arg(long)]
        context: Option<PathBuf>,
        /// Do not persist the execution records
        #[arg(long)]
        no_save: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lobbyflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "lobbyflow", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    if let Commands::Validate { workflow } = &cli.command {
        let workflow = read_workflow(workflow)?;
        return match workflow.validate() {
            Ok(()) => {
                println!(
                    "{}: ok ({} nodes, {} connections, start '{}')",
                    workflow.id,
                    workflow.nodes.len(),
                    workflow.connections.len(),
                    workflow.start_node_id
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{}: {}", workflow.id, e);
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            let mut shown = config.clone();
            if let Some(backend) = shown.backend.as_mut() {
                if backend.auth_token.is_some() {
                    backend.auth_token = Some("********".into());
                }
            }
            println!("{}", toml::to_string_pretty(&shown)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            workflow,
            context,
            no_save,
        } => {
            let backend = build_backend(&config, cli.server_url)?;
            let workflow = read_workflow(&workflow)?;
            let context = read_context(context.as_deref())?;
            run_one(workflow, context, backend, &config, !no_save).await
        }
        Commands::Dispatch {
            workflows,
            trigger,
            context,
            no_save,
        } => {
            let backend = build_backend(&config, cli.server_url)?;
            let raw = std::fs::read_to_string(&workflows)
                .with_context(|| format!("reading {}", workflows.display()))?;
            let workflows: Vec<Workflow> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", workflows.display()))?;
            let context = read_context(context.as_deref())?;

            let outcomes = dispatch(
                &workflows,
                trigger,
                &context,
                backend,
                config.engine.max_node_visits,
                config.engine.save_executions && !no_save,
            )
            .await;

            if outcomes.is_empty() {
                println!("No active workflows for trigger {}", trigger);
            }
            let mut failed = false;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(exec) => println!(
                        "{}: {} ({} nodes)",
                        outcome.workflow_id,
                        exec.status,
                        exec.history.len()
                    ),
                    Err(e) => {
                        failed = true;
                        eprintln!("{}: {}", outcome.workflow_id, e);
                    }
                }
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Validate { .. } | Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn run_one(
    workflow: Workflow,
    context: ExecutionContext,
    backend: Arc<dyn WorkflowBackend>,
    config: &AppConfig,
    save: bool,
) -> anyhow::Result<ExitCode> {
    let executor = Executor::with_backend(workflow, context, backend)?
        .with_max_node_visits(config.engine.max_node_visits)
        .on_node_completed(|node, _| {
            println!("  [ok] {} ({})", node.id, node.type_name());
        });

    let result = executor.start().await;

    if save && config.engine.save_executions {
        executor.save_execution().await;
    }

    match result {
        Ok(exec) => {
            println!("{}", serde_json::to_string_pretty(&exec)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let exec = executor.execution().await;
            for entry in exec.history.iter().filter(|h| h.status != HistoryStatus::Success) {
                eprintln!(
                    "  [{:?}] {}: {}",
                    entry.status,
                    entry.node_id,
                    entry.error.as_deref().unwrap_or("")
                );
            }
            eprintln!("Workflow {}: {}", exec.status, e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    let home_config = std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".lobbyflow").join("config.toml"));
    match home_config {
        Some(p) if p.exists() => {
            info!(path = %p.display(), "Using config from home directory");
            Ok(AppConfig::load(&p)?)
        }
        _ => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn build_backend(
    config: &AppConfig,
    server_url: Option<String>,
) -> anyhow::Result<Arc<dyn WorkflowBackend>> {
    let backend_config = match (server_url, config.backend.clone()) {
        (Some(url), Some(existing)) => BackendConfig {
            server_url: url,
            ..existing
        },
        (Some(url), None) => BackendConfig::new(url),
        (None, Some(existing)) => existing,
        (None, None) => bail!("No backend configured: set [backend].server_url or --server-url"),
    };
    Ok(Arc::new(HttpBackend::new(&backend_config)?))
}

fn read_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn read_context(path: Option<&Path>) -> anyhow::Result<ExecutionContext> {
    let mut context = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ExecutionContext::default(),
    };
    if context.triggered_by.is_empty() {
        context.triggered_by = "cli".into();
    }
    Ok(context)
}
