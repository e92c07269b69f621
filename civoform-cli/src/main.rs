use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use civoform_core::interpreter::{Interpreter, InterpreterConfig};
use civoform_core::plan::Plan;
use civoform_core::provider::Provider;
use civoform_core::resource::ResourceId;
use civoform_core::schema::ResourceSchema;
use civoform_provider::{CivoProvider, all_schemas};
use civoform_state::{StateBackend, StateFile};

mod display;
mod workflow;
mod workspace;

use display::{display_value, print_outcomes, print_plan, print_schema};
use workspace::{Workspace, resource_schema_map};

#[derive(Parser)]
#[command(name = "civoform")]
#[command(about = "Declarative infrastructure management for the Civo cloud", long_about = None)]
struct Cli {
    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every resource recorded in state
    Destroy {
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Adopt an existing Civo object into state
    Import {
        /// Path to .cvf file
        file: PathBuf,
        /// State address, e.g. network.main
        address: String,
        /// Civo ID of the existing object
        id: String,
    },
    /// Inspect and edit recorded state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Remove a lock left behind by an interrupted run
    ForceUnlock {
        /// Path to .cvf file
        file: PathBuf,
        /// ID printed in the lock error
        lock_id: String,
    },
    /// Describe resource and data source schemas
    Schema {
        /// Resource type, e.g. instance (lists all types when omitted)
        resource_type: Option<String>,

        /// Only show the data source of that name
        #[arg(long)]
        data_source: bool,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List {
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Show recorded attributes of one resource
    Show {
        address: String,
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Forget a resource without deleting it
    Rm {
        address: String,
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Refuse to delete a resource on destroy or removal from configuration
    Protect {
        address: String,
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
    /// Lift protection from a resource
    Unprotect {
        address: String,
        /// Path to .cvf file
        #[arg(default_value = "main.cvf")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, auto_approve } => run_apply(&file, auto_approve).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Import { file, address, id } => run_import(&file, &address, &id).await,
        Commands::State { command } => run_state_command(command).await,
        Commands::ForceUnlock { file, lock_id } => run_force_unlock(&file, &lock_id).await,
        Commands::Schema {
            resource_type,
            data_source,
        } => run_schema(resource_type.as_deref(), data_source),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,civoform=debug,civoform_core=debug,civoform_provider=debug,civoform_state=debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Load the file and check it against every schema
fn load_validated(file: &Path) -> Result<(Workspace, Vec<ResourceSchema>), String> {
    let workspace = Workspace::load(file)?;
    let schemas = all_schemas();
    workspace.validate(&schemas)?;
    Ok((workspace, schemas))
}

async fn read_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn save_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend.write_state(state).await.map_err(|e| e.to_string())
}

/// Run `work` while holding the state lock, releasing it whatever the outcome
async fn with_lock<T, F>(backend: &dyn StateBackend, operation: &str, work: F) -> Result<T, String>
where
    F: Future<Output = Result<T, String>>,
{
    let lock = backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())?;
    debug!("Acquired lock {} for {}", lock.id, operation);

    let result = work.await;

    if let Err(e) = backend.release_lock(&lock).await {
        eprintln!(
            "{} failed to release lock {}: {}",
            "Warning:".yellow().bold(),
            lock.id,
            e
        );
    }
    result
}

fn confirm(question: &str, detail: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", detail.yellow());
    print!("\n  Enter a value: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

fn run_validate(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    println!("{}", "Validating...".cyan());
    workspace.validate(&all_schemas())?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            workspace.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &workspace.resources {
        let kind = if resource.is_data_source() {
            " (data source)"
        } else {
            ""
        };
        println!("  • {}{}", resource.id, kind.dimmed());
    }
    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let (workspace, schemas) = load_validated(file)?;
    let provider = workspace.provider()?;
    let backend = workspace.backend().await?;
    let mut state = read_state(backend.as_ref()).await?;

    let schemas = resource_schema_map(&schemas);
    let planned = workflow::plan(&provider, &workspace, &mut state, &schemas).await?;
    print_plan(&planned.plan, &schemas);
    Ok(())
}

async fn run_apply(file: &Path, auto_approve: bool) -> Result<(), String> {
    let (workspace, schemas) = load_validated(file)?;
    let provider = workspace.provider()?;
    let backend = workspace.backend().await?;
    backend.init().await.map_err(|e| e.to_string())?;

    let backend = backend.as_ref();
    with_lock(
        backend,
        "apply",
        apply_locked(&workspace, &schemas, provider, backend, auto_approve),
    )
    .await
}

async fn apply_locked(
    workspace: &Workspace,
    schemas: &[ResourceSchema],
    provider: CivoProvider,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let schemas = resource_schema_map(schemas);
    let planned = workflow::plan(&provider, workspace, &mut state, &schemas).await?;

    print_plan(&planned.plan, &schemas);
    if planned.plan.is_empty() {
        return save_state(backend, &mut state).await;
    }
    println!();

    if !auto_approve
        && !confirm(
            "Do you want to apply these changes?",
            "Only 'yes' will be accepted to approve.",
        )?
    {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_bindings(planned.bindings);
    let result = interpreter.apply(&planned.plan).await;
    print_outcomes(&planned.plan, &result);

    workflow::record_outcomes(&mut state, workspace, &result);
    save_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    // The configuration only supplies credentials and the backend here
    let workspace = Workspace::load(file)?;
    let provider = workspace.provider()?;
    let backend = workspace.backend().await?;

    let backend = backend.as_ref();
    with_lock(
        backend,
        "destroy",
        destroy_locked(provider, backend, auto_approve),
    )
    .await
}

async fn destroy_locked(
    provider: CivoProvider,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let targets = workflow::destroy_order(state.resources.clone());
    let effects = workflow::delete_effects(&provider, targets, &mut state).await?;

    if effects.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return save_state(backend, &mut state).await;
    }

    let mut plan = Plan::new();
    for effect in effects {
        plan.add(effect);
    }
    print_plan(&plan, &resource_schema_map(&all_schemas()));
    println!();

    if !auto_approve
        && !confirm(
            "Do you really want to destroy all resources?",
            "This action cannot be undone. Type 'yes' to confirm.",
        )?
    {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        continue_on_error: true,
        ..Default::default()
    });
    let result = interpreter.apply(&plan).await;
    print_outcomes(&plan, &result);

    for applied in &result.outcomes {
        if applied.result.is_ok() {
            state.remove_resource(&applied.id.resource_type, &applied.id.name);
        }
    }
    save_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "Destroy complete! {} resources destroyed.",
                result.success_count
            )
            .green()
            .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_import(file: &Path, address: &str, identifier: &str) -> Result<(), String> {
    let (workspace, schemas) = load_validated(file)?;
    let id = ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid address '{}', expected TYPE.NAME", address))?;
    if !schemas
        .iter()
        .any(|s| !s.is_data_source() && s.resource_type == id.resource_type)
    {
        return Err(format!("Unknown resource type '{}'", id.resource_type));
    }

    let provider = workspace.provider()?;
    let backend = workspace.backend().await?;
    backend.init().await.map_err(|e| e.to_string())?;

    let backend = backend.as_ref();
    with_lock(backend, "import", async {
        let mut state = read_state(backend).await?;
        if let Some(existing) = state.find_resource(&id.resource_type, &id.name) {
            return Err(format!(
                "{} is already managed (id {})",
                address,
                existing.identifier.as_deref().unwrap_or("unknown")
            ));
        }

        let current = provider
            .read(&id, Some(identifier))
            .await
            .map_err(|e| e.to_string())?;
        if !current.exists {
            return Err(format!(
                "No {} found with id '{}'",
                id.resource_type, identifier
            ));
        }
        let current = if current.identifier.is_some() {
            current
        } else {
            current.with_identifier(identifier)
        };

        let dependencies = workspace
            .managed()
            .find(|r| r.id == id)
            .map(|r| workspace.dependency_addresses(r))
            .unwrap_or_default();
        workflow::record(&mut state, &current, dependencies);
        save_state(backend, &mut state).await?;

        println!(
            "{}",
            format!("✓ Imported {} ({})", address, identifier).green().bold()
        );
        if !workspace.is_declared(address) {
            println!(
                "{}",
                format!(
                    "{} is not declared in {}; the next apply will destroy it.",
                    address,
                    file.display()
                )
                .yellow()
            );
        }
        Ok(())
    })
    .await
}

async fn run_state_command(command: StateCommands) -> Result<(), String> {
    match command {
        StateCommands::List { file } => run_state_list(&file).await,
        StateCommands::Show { address, file } => run_state_show(&file, &address).await,
        StateCommands::Rm { address, file } => {
            edit_state(&file, &address, "state rm", |state, id| {
                state.remove_resource(&id.resource_type, &id.name);
                format!("✓ Removed {} from state", id)
            })
            .await
        }
        StateCommands::Protect { address, file } => {
            set_protected(&file, &address, true).await
        }
        StateCommands::Unprotect { address, file } => {
            set_protected(&file, &address, false).await
        }
    }
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let backend = Workspace::load(file)?.backend().await?;
    let Some(state) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state recorded.".dimmed());
        return Ok(());
    };

    println!(
        "{}",
        format!("serial {} lineage {}", state.serial, state.lineage).dimmed()
    );
    let mut resources: Vec<_> = state.resources.iter().collect();
    resources.sort_by_key(|r| r.resource_id().address());
    for resource in resources {
        let protected = if resource.protected {
            " [protected]"
        } else {
            ""
        };
        println!(
            "  {}  {}{}",
            resource.resource_id().address().bold(),
            resource.identifier.as_deref().unwrap_or("-"),
            protected.yellow()
        );
    }
    Ok(())
}

async fn run_state_show(file: &Path, address: &str) -> Result<(), String> {
    let backend = Workspace::load(file)?.backend().await?;
    let state = read_state(backend.as_ref()).await?;
    let id = parse_address(address)?;
    let resource = state
        .find_resource(&id.resource_type, &id.name)
        .ok_or_else(|| format!("{} is not in state", address))?;

    let schemas = resource_schema_map(&all_schemas());
    let schema = schemas.get(&id.resource_type);

    println!("{}", address.cyan().bold());
    println!(
        "  {}: {}",
        "id".bold(),
        resource.identifier.as_deref().unwrap_or("-")
    );
    if resource.protected {
        println!("  {}", "protected".yellow());
    }
    if !resource.dependencies.is_empty() {
        println!(
            "  {}: {}",
            "depends on".bold(),
            resource.dependencies.join(", ")
        );
    }

    let values = resource.values();
    let mut keys: Vec<_> = values.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {}: {}", key, display_value(schema, key, &values[key]));
    }
    Ok(())
}

fn parse_address(address: &str) -> Result<ResourceId, String> {
    ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid address '{}', expected TYPE.NAME", address))
}

/// Apply `edit` to one recorded resource under the state lock
async fn edit_state<F>(file: &Path, address: &str, operation: &str, edit: F) -> Result<(), String>
where
    F: FnOnce(&mut StateFile, &ResourceId) -> String,
{
    let id = parse_address(address)?;
    let backend = Workspace::load(file)?.backend().await?;
    let backend = backend.as_ref();

    with_lock(backend, operation, async {
        let mut state = read_state(backend).await?;
        if state.find_resource(&id.resource_type, &id.name).is_none() {
            return Err(format!("{} is not in state", address));
        }
        let message = edit(&mut state, &id);
        save_state(backend, &mut state).await?;
        println!("{}", message.green());
        Ok(())
    })
    .await
}

async fn set_protected(file: &Path, address: &str, protected: bool) -> Result<(), String> {
    let operation = if protected {
        "state protect"
    } else {
        "state unprotect"
    };
    edit_state(file, address, operation, |state, id| {
        if let Some(resource) = state.find_resource_mut(&id.resource_type, &id.name) {
            resource.protected = protected;
        }
        if protected {
            format!("✓ {} is protected", id)
        } else {
            format!("✓ {} is no longer protected", id)
        }
    })
    .await
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let backend = Workspace::load(file)?.backend().await?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("✓ Lock {} released", lock_id).green());
    Ok(())
}

fn run_schema(resource_type: Option<&str>, data_source: bool) -> Result<(), String> {
    let schemas = all_schemas();

    let Some(resource_type) = resource_type else {
        for (title, data_sources) in [("Resources:", false), ("Data sources:", true)] {
            println!("{}", title.cyan().bold());
            for schema in schemas
                .iter()
                .filter(|s| s.is_data_source() == data_sources)
            {
                println!(
                    "  civo.{}  {}",
                    schema.resource_type,
                    schema.description.as_deref().unwrap_or("").dimmed()
                );
            }
            println!();
        }
        return Ok(());
    };

    let matching: Vec<_> = schemas
        .iter()
        .filter(|s| s.resource_type == resource_type && (!data_source || s.is_data_source()))
        .collect();
    if matching.is_empty() {
        return Err(format!("Unknown type '{}'", resource_type));
    }
    for (i, schema) in matching.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_schema(schema);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_state_subcommands() {
        let cli = Cli::try_parse_from(["civoform", "state", "protect", "network.main"]).unwrap();
        match cli.command {
            Commands::State {
                command: StateCommands::Protect { address, file },
            } => {
                assert_eq!(address, "network.main");
                assert_eq!(file, PathBuf::from("main.cvf"));
            }
            _ => panic!("expected state protect"),
        }
    }

    #[test]
    fn import_takes_file_address_and_id() {
        let cli = Cli::try_parse_from([
            "civoform",
            "import",
            "prod.cvf",
            "volume.data",
            "d1b7-44",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Import { ref address, ref id, .. } if address == "volume.data" && id == "d1b7-44"
        ));
    }

    #[tokio::test]
    async fn lock_is_released_when_work_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = civoform_state::BackendConfig {
            backend_type: "local".to_string(),
            attributes: [(
                "path".to_string(),
                civoform_core::resource::Value::from(
                    dir.path().join("s.json").to_string_lossy().to_string(),
                ),
            )]
            .into_iter()
            .collect(),
        };
        let backend = civoform_state::create_backend(&config).await.unwrap();

        let result: Result<(), String> =
            with_lock(backend.as_ref(), "apply", async { Err("boom".to_string()) }).await;
        assert_eq!(result.unwrap_err(), "boom");

        // A second acquire succeeds because the first lock was released
        let lock = backend.acquire_lock("apply").await.unwrap();
        backend.release_lock(&lock).await.unwrap();
    }
}
