//! entity-migrate CLI - migrate records of one entity type between environments.

use clap::{Parser, Subcommand};
use entity_migrate::{
    batch_count, AutoMappingResult, Config, Environment, IdentityKind, MemoryStore, MigrateError,
    MigrationEngine, MigrationReport, QueryRequest, RecordAccess,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the run finished but some records failed.
const EXIT_RECORDS_FAILED: u8 = 4;

#[derive(Parser)]
#[command(name = "entity-migrate")]
#[command(about = "Migrate entity records between environments")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the configured entity's records into the target
    Run {
        /// Dry run: validate and show plan without writing records
        #[arg(long)]
        dry_run: bool,
    },

    /// Match users, teams and business units across environments
    AutoMap {
        /// Map users
        #[arg(long)]
        users: bool,

        /// Map teams
        #[arg(long)]
        teams: bool,

        /// Map business units
        #[arg(long)]
        business_units: bool,
    },

    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Validate => {
            let migration = &config.migration;
            if cli.output_json {
                let summary = serde_json::json!({
                    "valid": true,
                    "entity": migration.entity,
                    "config_hash": migration.hash(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Configuration is valid");
                println!("  Entity: {}", migration.entity);
                println!(
                    "  Fields: {} ({} enabled)",
                    migration.field_mappings.len(),
                    migration.enabled_fields().count()
                );
                println!("  Lookups: {}", migration.lookup_mappings.len());
                println!("  Operations: {}", join(&migration.operations));
                println!("  Batch size: {}", migration.batch_size);
            }
        }

        Commands::AutoMap {
            users,
            teams,
            business_units,
        } => {
            let mut kinds = Vec::new();
            if users {
                kinds.push(IdentityKind::User);
            }
            if teams {
                kinds.push(IdentityKind::Team);
            }
            if business_units {
                kinds.push(IdentityKind::BusinessUnit);
            }
            if kinds.is_empty() {
                kinds = config.auto_map.kinds();
            }
            if kinds.is_empty() {
                kinds = vec![
                    IdentityKind::User,
                    IdentityKind::Team,
                    IdentityKind::BusinessUnit,
                ];
            }

            let store = Arc::new(MemoryStore::load(
                &config.source.snapshot,
                &config.target.snapshot,
            )?);
            let mut engine = MigrationEngine::new(store.clone(), store);

            let mut all = Vec::new();
            for kind in kinds {
                let results = engine.auto_map(kind).await?;
                all.push((kind, results));
            }

            if cli.output_json {
                let json: Vec<_> = all
                    .iter()
                    .map(|(kind, results)| serde_json::json!({ "kind": kind, "matches": results }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                for (kind, results) in &all {
                    print_matches(*kind, results);
                }
            }
        }

        Commands::Run { dry_run } => {
            let store = Arc::new(MemoryStore::load(
                &config.source.snapshot,
                &config.target.snapshot,
            )?);
            let mut engine = MigrationEngine::new(store.clone(), store.clone());
            let migration = &config.migration;

            let keys = engine.source_keys(&migration.entity).await?;
            let request = QueryRequest::new(migration.entity.as_str())
                .select(migration.source_select_fields(&keys.id_field))
                .filter(migration.source_filter.clone());
            let records = store.query(Environment::Source, &request).await?;
            info!(
                "{}: {} candidate records in {}",
                migration.entity,
                records.len(),
                config.source.name
            );

            if dry_run {
                let batches = batch_count(records.len(), migration.batch_size);
                if cli.output_json {
                    let plan = serde_json::json!({
                        "entity": migration.entity,
                        "records": records.len(),
                        "batches": batches,
                        "operations": migration.operations,
                    });
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    println!("\nDry run completed!");
                    println!("  Entity: {}", migration.entity);
                    println!("  Records: {}", records.len());
                    println!("  Batches: {}", batches);
                    println!("  Operations: {}", join(&migration.operations));
                }
                return Ok(ExitCode::SUCCESS);
            }

            let kinds = config.auto_map.kinds();
            for kind in &kinds {
                engine.auto_map(*kind).await?;
            }
            if !kinds.is_empty() && engine.identities().is_empty() {
                warn!("Auto-mapping found no identity matches; references keep source ids");
            }

            let progress = cli.progress;
            let report = engine
                .migrate_records(migration, &records, |snapshot| {
                    if progress {
                        if let Ok(line) = serde_json::to_string(&snapshot) {
                            eprintln!("{}", line);
                        }
                    }
                })
                .await?;

            store
                .save(Environment::Target, &config.target.snapshot)
                .await?;
            info!("Saved {} to {:?}", config.target.name, config.target.snapshot);

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }

            if report.has_failures() {
                return Ok(ExitCode::from(EXIT_RECORDS_FAILED));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &MigrationReport) {
    let progress = &report.progress;
    println!("\nMigration completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Entity: {}", report.entity);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Records: {}/{} succeeded, {} failed, {} skipped",
        progress.successful, progress.total, progress.failed, progress.skipped
    );
    for record in progress.failures() {
        println!(
            "  Failed: {} ({}): {}",
            record.display_name,
            record.source_id,
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn print_matches(kind: IdentityKind, results: &[AutoMappingResult]) {
    println!("\n{} ({} matched)", kind, results.len());
    for r in results {
        println!(
            "  {} -> {}  {}  [{:?}, {}]",
            r.source_id, r.target_id, r.display_name, r.confidence, r.matched_by
        );
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    // RUST_LOG takes precedence over --verbosity
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
