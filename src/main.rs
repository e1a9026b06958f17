//! Stratoform CLI entrypoint.
//!
//! This is the main entrypoint for the stratoform command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use stratoform::cli::{Cli, Commands, OutputFormatter, StateCommands};
use stratoform::error::{ApplyError, Result, StratoformError};
use stratoform::graph::ResourceGraph;
use stratoform::module::{
    find_module_file, load_var_file, parse_var, AttrMap, BoundModule, ModuleParser, ModuleSpec,
    ModuleValidator,
};
use stratoform::planner::{resolve_outputs, DiffEngine, Plan, PlanExecutor};
use stratoform::provider::{HttpProvider, Provider};
use stratoform::state::{generate_holder_id, open_store, StateDocument, StateStore};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let inputs = collect_inputs(&cli.vars, cli.var_file.as_ref())?;

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.module.as_ref(), warnings),
        Commands::Plan { detailed } => {
            cmd_plan(cli.module.as_ref(), &inputs, detailed, &formatter).await
        }
        Commands::Apply { yes, parallelism } => {
            cmd_apply(cli.module.as_ref(), &inputs, yes, parallelism, &formatter).await
        }
        Commands::Destroy { yes } => cmd_destroy(cli.module.as_ref(), yes, &formatter).await,
        Commands::Outputs => cmd_outputs(cli.module.as_ref(), &formatter).await,
        Commands::State { command } => cmd_state(cli.module.as_ref(), command, &formatter).await,
    }
}

/// Initialize a new module.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing new Stratoform module in: {}", path.display());

    let module_path = path.join("stratoform.module.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && module_path.exists() {
        eprintln!("Module file already exists: {}", module_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let module_template = include_str!("../templates/stratoform.module.yaml");
    std::fs::write(&module_path, module_template)?;
    eprintln!("Created: {}", module_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    let gitignore_content = ".env\n.stratoform/\n";
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") || !existing.contains(".stratoform") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Stratoform")?;
            if !existing.contains(".env") {
                writeln!(file, ".env")?;
            }
            if !existing.contains(".stratoform") {
                writeln!(file, ".stratoform/")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, gitignore_content)?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nModule initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your provider token");
    eprintln!("  2. Edit stratoform.module.yaml with your resource topology");
    eprintln!("  3. Run 'stratoform validate' to check the module");
    eprintln!("  4. Run 'stratoform plan' to see what will change");
    eprintln!("  5. Run 'stratoform apply' to provision the resources");

    Ok(())
}

/// Validate the module definition.
fn cmd_validate(module_path: Option<&PathBuf>, show_warnings: bool) -> Result<()> {
    let module_file = resolve_module_path(module_path)?;
    info!("Validating module: {}", module_file.display());

    let module = load_module(&module_file)?;

    let validator = ModuleValidator::new();
    let result = validator.validate(&module)?;

    eprintln!("Module is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    eprintln!("\nModule summary:");
    eprintln!("  Name: {}", module.module.name);
    eprintln!("  Environment: {}", module.module.environment);
    eprintln!("  Inputs: {}", module.inputs.len());
    eprintln!("  Resources: {}", module.resources.len());
    eprintln!("  Outputs: {}", module.outputs.len());

    Ok(())
}

/// Show the change plan.
async fn cmd_plan(
    module_path: Option<&PathBuf>,
    inputs: &AttrMap,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (module, graph, store) = load_module_and_graph(module_path, inputs).await?;

    let state = store
        .load()
        .await?
        .unwrap_or_else(|| StateDocument::new(&module.module.name, &module.module.environment));

    let diff = DiffEngine::new().compute_diff(&graph, &state);
    let plan = Plan::from_diff(&diff, &graph, &state);

    let output = formatter.format_plan(&plan, detailed);
    eprintln!("{output}");

    Ok(())
}

/// Apply the change plan.
async fn cmd_apply(
    module_path: Option<&PathBuf>,
    inputs: &AttrMap,
    auto_approve: bool,
    parallelism: Option<usize>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (module, graph, store) = load_module_and_graph(module_path, inputs).await?;
    let provider = create_provider(&module)?;

    let state = store
        .load()
        .await?
        .unwrap_or_else(|| StateDocument::new(&module.module.name, &module.module.environment));

    let diff = DiffEngine::new().compute_diff(&graph, &state);
    let plan = Plan::from_diff(&diff, &graph, &state);

    if plan.is_empty() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    let output = formatter.format_plan(&plan, false);
    eprintln!("{output}");

    if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let mut report = execute_locked(&store, provider, &plan, state, parallelism).await?;
    report.unchanged = diff.unchanged;

    eprintln!("\n{}", formatter.format_report(&report));

    if !report.success {
        return Err(StratoformError::Apply(ApplyError::Incomplete {
            failed: report.failed,
            blocked: report.blocked,
        }));
    }

    if !module.outputs.is_empty()
        && let Some(applied) = store.load().await?
    {
        let resolved = resolve_outputs(&module.outputs, &applied)?;
        eprintln!("Outputs:\n{}", formatter.format_outputs(&resolved));
    }

    Ok(())
}

/// Destroy every resource recorded in state.
async fn cmd_destroy(
    module_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let module_file = resolve_module_path(module_path)?;
    let module = load_module(&module_file)?;
    let store = open_store(&module).await?;
    let provider = create_provider(&module)?;

    let Some(state) = store.load().await? else {
        eprintln!("No state found, nothing to destroy.");
        return Ok(());
    };

    if state.is_empty() {
        eprintln!("State is empty, nothing to destroy.");
        return Ok(());
    }

    let plan = Plan::destroy_all(&state);

    eprintln!("The following resources will be destroyed:");
    for change in &plan.changes {
        let id = change.prior_id.as_deref().unwrap_or("(no id)");
        eprintln!("  - {} ({id})", change.key);
    }

    if !auto_approve
        && !confirm(
            "\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ",
            "destroy",
        )?
    {
        eprintln!("Destruction cancelled.");
        return Ok(());
    }

    let report = execute_locked(&store, provider, &plan, state, None).await?;

    eprintln!("\n{}", formatter.format_report(&report));

    if report.success {
        Ok(())
    } else {
        Err(StratoformError::Apply(ApplyError::Incomplete {
            failed: report.failed,
            blocked: report.blocked,
        }))
    }
}

/// Show resolved module outputs.
async fn cmd_outputs(module_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let module_file = resolve_module_path(module_path)?;
    let module = load_module(&module_file)?;
    let store = open_store(&module).await?;

    let Some(state) = store.load().await? else {
        eprintln!("No state found. Run 'stratoform apply' first.");
        return Ok(());
    };

    let resolved = resolve_outputs(&module.outputs, &state)?;
    let output = formatter.format_outputs(&resolved);
    eprintln!("{output}");

    Ok(())
}

/// State management commands.
async fn cmd_state(
    module_path: Option<&PathBuf>,
    command: StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let module_file = resolve_module_path(module_path)?;
    let module = load_module(&module_file)?;
    let store = open_store(&module).await?;

    match command {
        StateCommands::Show => {
            if let Some(state) = store.load().await? {
                let output = formatter.format_state(&state);
                eprintln!("{output}");
            } else {
                eprintln!("No state found.");
            }
        }
        StateCommands::Lock { holder } => {
            let holder = holder.unwrap_or_else(generate_holder_id);
            let lock = store.acquire_lock(&holder).await?;
            eprintln!("State locked: {}", lock.lock_id);
        }
        StateCommands::Unlock { lock_id, force } => {
            if force {
                if let Some(lock_info) = store.get_lock_info().await? {
                    store.release_lock(&lock_info.lock_id).await?;
                    eprintln!("State forcefully unlocked.");
                } else {
                    eprintln!("State is not locked.");
                }
            } else if let Some(id) = lock_id {
                store.release_lock(&id).await?;
                eprintln!("State unlocked.");
            } else {
                eprintln!("Please provide --lock-id or use --force");
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the module file path.
fn resolve_module_path(module_path: Option<&PathBuf>) -> Result<PathBuf> {
    module_path.map_or_else(|| find_module_file("."), |path| Ok(path.clone()))
}

/// Loads and validates the module definition.
fn load_module(module_file: &Path) -> Result<ModuleSpec> {
    debug!("Loading module from: {}", module_file.display());

    let parser = ModuleParser::new()
        .with_base_path(module_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;

    let module = parser.load_with_env(module_file)?;

    let validator = ModuleValidator::new();
    validator.validate(&module)?;

    Ok(module)
}

/// Loads the module, binds inputs, builds the graph, and opens the store.
async fn load_module_and_graph(
    module_path: Option<&PathBuf>,
    inputs: &AttrMap,
) -> Result<(ModuleSpec, ResourceGraph, Arc<dyn StateStore>)> {
    let module_file = resolve_module_path(module_path)?;
    let module = load_module(&module_file)?;

    let bound = BoundModule::bind(&module, inputs)?;
    let graph = ResourceGraph::from_bound(&bound)?;

    let store = open_store(&module).await?;
    Ok((module, graph, store))
}

/// Collects input values from the var file and `--var` overrides.
fn collect_inputs(vars: &[String], var_file: Option<&PathBuf>) -> Result<AttrMap> {
    let mut inputs = var_file.map_or_else(|| Ok(AttrMap::new()), load_var_file)?;

    for var in vars {
        let (name, value) = parse_var(var)?;
        inputs.insert(name, value);
    }

    Ok(inputs)
}

/// Creates the HTTP provider from the module's provider configuration.
fn create_provider(module: &ModuleSpec) -> Result<Arc<dyn Provider>> {
    let endpoint = module.provider.endpoint.as_deref().ok_or_else(|| {
        StratoformError::internal(
            "Provider endpoint not configured. Set provider.endpoint or STRATOFORM_PROVIDER_ENDPOINT.",
        )
    })?;
    let token = ModuleParser::get_provider_token()?;

    let provider = match module.provider.timeout_secs {
        Some(timeout) => HttpProvider::with_timeout(endpoint, &token, timeout)?,
        None => HttpProvider::new(endpoint, &token)?,
    };

    Ok(Arc::new(provider))
}

/// Executes a plan while holding the state lock.
async fn execute_locked(
    store: &Arc<dyn StateStore>,
    provider: Arc<dyn Provider>,
    plan: &Plan,
    state: StateDocument,
    parallelism: Option<usize>,
) -> Result<stratoform::planner::ApplyReport> {
    let lock = store.acquire_lock(&generate_holder_id()).await?;

    let mut executor = PlanExecutor::new(provider, Arc::clone(store));
    if let Some(parallelism) = parallelism {
        executor = executor.with_parallelism(parallelism);
    }

    // Stop dispatching new work on Ctrl-C; in-flight calls finish and persist.
    let cancel = executor.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight changes");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = executor.execute(plan, state).await;

    if let Err(e) = store.release_lock(&lock.lock_id).await {
        warn!("Failed to release state lock: {e}");
    }

    result
}

/// Prompts for confirmation on stderr.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case(expected))
}
