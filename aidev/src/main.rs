//! `aidev` command line.

use std::path::{Path, PathBuf};

use aidev::engine::{RunRequest, WorkflowEngine};
use aidev::error::WorkflowError;
use aidev::exit_codes;
use aidev::handoff::{HandoffController, SystemLauncher};
use aidev::io::catalog::{CatalogLoad, WorkflowCatalog};
use aidev::io::config::{EngineConfig, load_config};
use aidev::io::env::ProcessEnv;
use aidev::io::init::{ProjectPaths, init_project};
use aidev::io::manifest_store::{ManifestStore, load_manifest};
use aidev::io::prompts::BundledPrompts;
use aidev::io::step_runner::AssistantStepRunner;
use aidev::io::tools::{ProbeAvailability, SystemProbe, ToolProbe};
use aidev::logging;
use aidev::status::StatusReport;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aidev", version, about = "Ticket-driven workflows for AI coding assistants")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage and run workflows.
    #[command(subcommand)]
    Workflow(WorkflowCommand),
    /// Show which assistant tools are installed.
    Tools {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// List available workflows.
    List,
    /// Create `.aidev/` with a workflows file and default config.
    Init,
    /// Build a run manifest for a workflow.
    Run(RunArgs),
    /// Execute a manifest's remaining steps headlessly.
    Execute { manifest: String },
    /// Show progress of a manifest.
    Status { manifest: String },
    /// Exit 0 when every step ran, 2 when steps are pending, 3 when a step failed.
    Validate { manifest: String },
    /// Mark pending steps complete by hand.
    MarkComplete {
        manifest: String,
        /// Only this step.
        #[arg(long)]
        step: Option<String>,
    },
    /// Hand a manifest to an interactive assistant.
    Handoff {
        manifest: String,
        /// Assistant to use instead of the next pending step's.
        #[arg(long)]
        tool: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Workflow name.
    name: String,
    /// Ticket key, URL or text.
    #[arg(long)]
    ticket: Option<String>,
    /// Read the ticket from a file.
    #[arg(long)]
    ticket_file: Option<PathBuf>,
    /// Free-form instructions for every step.
    #[arg(long)]
    prompt: Option<String>,
    /// Assistant for every step.
    #[arg(long)]
    tool: Option<String>,
    /// Start at this step.
    #[arg(long)]
    from_step: Option<String>,
    /// Run only one step.
    #[arg(long)]
    step_only: bool,
    /// Execute the manifest headlessly after writing it.
    #[arg(long, conflicts_with = "handoff")]
    execute: bool,
    /// Hand the manifest to an assistant after writing it.
    #[arg(long)]
    handoff: bool,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    let paths = ProjectPaths::new(root);
    match cli.command {
        Command::Tools { json } => cmd_tools(json),
        Command::Workflow(command) => match command {
            WorkflowCommand::List => cmd_list(&paths),
            WorkflowCommand::Init => cmd_init(&paths),
            WorkflowCommand::Run(args) => cmd_run(&paths, &args),
            WorkflowCommand::Execute { manifest } => {
                cmd_execute(&paths, &paths.resolve_manifest(&manifest))
            }
            WorkflowCommand::Status { manifest } => cmd_status(&paths.resolve_manifest(&manifest)),
            WorkflowCommand::Validate { manifest } => {
                cmd_validate(&paths.resolve_manifest(&manifest))
            }
            WorkflowCommand::MarkComplete { manifest, step } => {
                cmd_mark_complete(&paths.resolve_manifest(&manifest), step.as_deref())
            }
            WorkflowCommand::Handoff { manifest, tool } => {
                cmd_handoff(&paths, &paths.resolve_manifest(&manifest), tool.as_deref())
            }
        },
    }
}

fn load_catalog(paths: &ProjectPaths) -> CatalogLoad {
    let load = WorkflowCatalog::new(&paths.workflows_path).load_workflows();
    for warning in &load.warnings {
        eprintln!("warning: {warning}");
    }
    load
}

fn cmd_init(paths: &ProjectPaths) -> Result<i32> {
    let paths = init_project(&paths.root)?;
    println!("Initialized {}", paths.aidev_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_list(paths: &ProjectPaths) -> Result<i32> {
    let load = load_catalog(paths);
    for (name, workflow) in &load.workflows {
        println!("{name}\t{} step(s)\t{}", workflow.steps.len(), workflow.description);
    }
    Ok(exit_codes::OK)
}

fn cmd_run(paths: &ProjectPaths, args: &RunArgs) -> Result<i32> {
    WorkflowCatalog::new(&paths.workflows_path).ensure_workflows_file()?;
    let load = load_catalog(paths);
    let workflow = load
        .workflows
        .get(&args.name)
        .ok_or_else(|| WorkflowError::UnknownWorkflow {
            name: args.name.clone(),
            available: load.names().join(", "),
        })?;
    let config = load_config(&paths.config_path)?;

    let probe = SystemProbe;
    let availability = ProbeAvailability(&probe);
    let runner = AssistantStepRunner::new(&probe, &config.ollama_model, config.output_limit_bytes);
    let engine = WorkflowEngine::new(
        &paths.runs_dir,
        config.clone(),
        &BundledPrompts,
        &availability,
        &ProcessEnv,
        &runner,
    );
    let manifest_path = engine.run_workflow(
        workflow,
        &RunRequest {
            ticket: args.ticket.as_deref(),
            ticket_file: args.ticket_file.as_deref(),
            user_prompt: args.prompt.as_deref(),
            tool_override: args.tool.as_deref(),
            project_default_assistant: None,
            from_step: args.from_step.as_deref(),
            step_only: args.step_only,
        },
    )?;
    println!("{}", manifest_path.display());

    if args.execute {
        return execute_with(&engine, &manifest_path);
    }
    if args.handoff {
        return handoff_with(&config, &manifest_path, args.tool.as_deref());
    }
    Ok(exit_codes::OK)
}

fn cmd_execute(paths: &ProjectPaths, manifest_path: &Path) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    let probe = SystemProbe;
    let availability = ProbeAvailability(&probe);
    let runner = AssistantStepRunner::new(&probe, &config.ollama_model, config.output_limit_bytes);
    let engine = WorkflowEngine::new(
        &paths.runs_dir,
        config.clone(),
        &BundledPrompts,
        &availability,
        &ProcessEnv,
        &runner,
    );
    execute_with(&engine, manifest_path)
}

fn execute_with(engine: &WorkflowEngine<'_>, manifest_path: &Path) -> Result<i32> {
    let report = engine.execute_manifest(manifest_path)?;
    for step in &report.steps {
        println!("{}\t{}\t{} attempt(s)", step.name, step.status, step.attempts);
    }
    let failed = report.failed();
    if failed.is_empty() {
        return Ok(exit_codes::OK);
    }
    eprintln!(
        "failed steps: {}. Manifest: {}",
        failed.join(", "),
        manifest_path.display()
    );
    Ok(exit_codes::FAILED)
}

fn cmd_status(manifest_path: &Path) -> Result<i32> {
    let manifest = load_manifest(manifest_path)?;
    print!("{}", StatusReport::from_manifest(&manifest).render());
    Ok(exit_codes::OK)
}

fn cmd_validate(manifest_path: &Path) -> Result<i32> {
    let mut store = ManifestStore::open(manifest_path)?;
    let pending = store.validate()?;
    let failed = store.failed_steps();
    if !failed.is_empty() {
        println!("failed: {}", failed.join(", "));
        return Ok(exit_codes::FAILED);
    }
    if !pending.is_empty() {
        println!("pending: {}", pending.join(", "));
        return Ok(exit_codes::PENDING);
    }
    println!("all steps ran");
    Ok(exit_codes::OK)
}

fn cmd_mark_complete(manifest_path: &Path, step: Option<&str>) -> Result<i32> {
    let mut store = ManifestStore::open(manifest_path)?;
    let marked = store.mark_pending_complete(step)?;
    if marked.is_empty() {
        println!("No pending steps to mark as complete");
    } else {
        println!("Marked complete: {}", marked.join(", "));
    }
    Ok(exit_codes::OK)
}

fn cmd_handoff(paths: &ProjectPaths, manifest_path: &Path, tool: Option<&str>) -> Result<i32> {
    let config = load_config(&paths.config_path)?;
    handoff_with(&config, manifest_path, tool)
}

fn handoff_with(config: &EngineConfig, manifest_path: &Path, tool: Option<&str>) -> Result<i32> {
    let manifest = load_manifest(manifest_path)?;
    let probe = SystemProbe;
    let launcher = SystemLauncher;
    let controller = HandoffController::new(&probe, &launcher, &config.ollama_model);
    let assistant = controller.pick_assistant(&manifest, tool);
    let report = controller.handoff(manifest_path, &assistant)?;
    println!("{}", report.message());
    Ok(if report.is_success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_tools(json: bool) -> Result<i32> {
    let tools = SystemProbe.detect_all();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tools).context("serialize tools")?
        );
        return Ok(exit_codes::OK);
    }
    for tool in &tools {
        let state = if tool.installed { "installed" } else { "missing" };
        let version = tool.version.as_deref().unwrap_or("-");
        println!("{:<8} {:<10} {:<24} {}", tool.id, state, version, tool.install_url);
    }
    Ok(exit_codes::OK)
}
