//! Dataimport CLI - dispatch processing contexts through profile trees
//!
//! # Main Commands
//!
//! ```bash
//! dataimport serve                          # Start HTTP server (port 3000)
//! dataimport dispatch context.json          # Dispatch one context
//! dataimport dispatch template.json -r rows.csv   # One context per CSV row
//! dataimport reference list                 # Manage per-tenant reference data
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! dataimport map context.json               # Run the mapping step only
//! dataimport match context.json -e existing.json  # Run the matching step only
//! dataimport parse rows.csv                 # Parse a delimited file to JSON
//! dataimport validate context.json          # Schema-validate a context
//! dataimport operations                     # Show available rule operations
//! ```

use clap::{Parser, Subcommand};
use dataimport::{
    config::load_routes, operations_description, parse_delimited, parse_file_auto,
    rows_to_contexts, validate_processing_context, validate_profile_snapshot, Dispatcher,
    EngineConfig, InMemoryLoader, MappingEngine, MatchingEngine, ProcessingContext,
    ReferenceDataStore, Registry,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "dataimport")]
#[command(about = "Map, match and dispatch library records through import profiles", long_about = None)]
struct Cli {
    /// Reference data directory (overrides DI_REFERENCE_DATA_DIR)
    #[arg(long, global = true)]
    reference_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a processing context until it completes or fails
    Dispatch {
        /// Context JSON file
        context: PathBuf,

        /// Delimited file; the context becomes a template, one dispatch per row
        #[arg(short, long)]
        rows: Option<PathBuf>,

        /// Delimiter for --rows (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Handler routes file (overrides DI_ROUTES)
        #[arg(long)]
        routes: Option<PathBuf>,

        /// Timeout in seconds (overrides DI_DISPATCH_TIMEOUT_SECS)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply the current node's mapping profile
    Map {
        /// Context JSON file
        context: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the current node's match profile
    Match {
        /// Context JSON file
        context: PathBuf,

        /// JSON array of existing records to match against, instead of storage
        #[arg(short, long)]
        existing: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a delimited file and output JSON rows
    Parse {
        /// Input file
        input: PathBuf,

        /// Delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a processing context (or a profile snapshot) against its schema
    Validate {
        /// Input JSON file
        input: PathBuf,

        /// Validate as a profile snapshot instead of a context
        #[arg(long)]
        snapshot: bool,
    },

    /// Show available mapping rule operations
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides DI_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Handler routes file (overrides DI_ROUTES)
        #[arg(long)]
        routes: Option<PathBuf>,
    },

    /// Manage per-tenant reference data
    Reference {
        #[command(subcommand)]
        action: ReferenceAction,
    },
}

#[derive(Subcommand)]
enum ReferenceAction {
    /// List tenants with stored reference data
    List,

    /// Import a mapping parameters JSON file
    Import {
        /// Mapping parameters JSON file
        file: PathBuf,
        /// Tenant (default: file name)
        #[arg(short, long)]
        tenant: Option<String>,
    },

    /// Show a tenant's reference data
    Show {
        tenant: String,
    },

    /// Delete a tenant's reference data
    Delete {
        tenant: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match EngineConfig::from_env() {
        Ok(mut config) => {
            if let Some(dir) = cli.reference_dir {
                config.reference_data_dir = dir;
            }
            run(cli.command, config).await
        }
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, mut config: EngineConfig) -> CliResult {
    match command {
        Commands::Dispatch {
            context,
            rows,
            delimiter,
            routes,
            timeout,
            output,
        } => {
            if let Some(routes) = routes {
                config.routes = load_routes(routes)?;
            }
            if let Some(secs) = timeout {
                config.dispatch_timeout = Duration::from_secs(secs);
            }
            cmd_dispatch(&config, &context, rows.as_deref(), delimiter, output.as_deref()).await
        }

        Commands::Map { context, output } => cmd_map(&config, &context, output.as_deref()),

        Commands::Match {
            context,
            existing,
            output,
        } => cmd_match(&config, &context, existing.as_deref(), output.as_deref()).await,

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Validate { input, snapshot } => cmd_validate(&input, snapshot),

        Commands::Operations => {
            println!("{}", operations_description());
            Ok(())
        }

        Commands::Serve { port, routes } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(routes) = routes {
                config.routes = load_routes(routes)?;
            }
            dataimport::server::start_server(&config).await?;
            Ok(())
        }

        Commands::Reference { action } => cmd_reference(&config, action),
    }
}

/// Read a context file, filling reference data from the store when absent.
fn read_context(config: &EngineConfig, path: &Path) -> Result<ProcessingContext, Box<dyn std::error::Error>> {
    let raw: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    if let Err(errors) = validate_processing_context(&raw) {
        return Err(format!("Invalid context {}:\n  {}", path.display(), errors.join("\n  ")).into());
    }
    let mut ctx: ProcessingContext = serde_json::from_value(raw)?;

    let store = ReferenceDataStore::with_dir(&config.reference_data_dir);
    if store.apply(&mut ctx) {
        eprintln!("Reference data loaded for tenant {}", ctx.connection.tenant.as_deref().unwrap_or_default());
    }
    Ok(ctx)
}

async fn cmd_dispatch(
    config: &EngineConfig,
    context: &Path,
    rows: Option<&Path>,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> CliResult {
    let template = read_context(config, context)?;
    let dispatcher = Dispatcher::new(Arc::new(Registry::from_config(config)?));
    eprintln!("Dispatching {} ({} route(s))", template.event_type, config.routes.len());

    let Some(rows) = rows else {
        let ctx = dispatcher.dispatch_with_timeout(template, config.dispatch_timeout).await?;
        eprintln!("   Result: {}", ctx.event_type);
        eprintln!("   Chain: {}", ctx.event_chain.join(" -> "));
        if let Some(error) = ctx.error() {
            eprintln!("   Error: {}", error);
        }
        return write_output(&serde_json::to_string_pretty(&ctx)?, output);
    };

    let records = match delimiter {
        Some(d) => parse_delimited(&fs::read_to_string(rows)?, d)?.1,
        None => parse_file_auto(rows)?.records,
    };
    let contexts = rows_to_contexts(&records, &template);
    eprintln!("   {} row(s) from {}", contexts.len(), rows.display());

    let outcome = tokio::time::timeout(config.dispatch_timeout, dispatcher.dispatch_batch(contexts))
        .await
        .map_err(|_| format!("Batch did not finish within {:?}", config.dispatch_timeout))??;

    eprintln!("   Completed: {}", outcome.completed.len());
    eprintln!("   Errors: {}", outcome.errors.len());
    for partial in outcome.errors.iter().take(5) {
        eprintln!("     - {}: {}", partial.id, partial.error);
    }
    write_output(&serde_json::to_string_pretty(&outcome)?, output)
}

fn cmd_map(config: &EngineConfig, context: &Path, output: Option<&Path>) -> CliResult {
    let mut ctx = read_context(config, context)?;
    MappingEngine::map(&mut ctx, &Registry::with_defaults())?;
    write_output(&serde_json::to_string_pretty(&ctx.objects)?, output)
}

async fn cmd_match(
    config: &EngineConfig,
    context: &Path,
    existing: Option<&Path>,
    output: Option<&Path>,
) -> CliResult {
    let mut ctx = read_context(config, context)?;

    let registry = match existing {
        Some(path) => {
            let profile = ctx
                .current_node
                .as_ref()
                .and_then(|node| node.match_profile())
                .ok_or("Current node is not a match profile")??;
            let records: Vec<Value> = serde_json::from_str(&fs::read_to_string(path)?)?;
            eprintln!("Matching against {} local record(s)", records.len());

            let mut registry = Registry::with_defaults();
            registry.register_match_value_loader(InMemoryLoader::new(profile.existing_record_type, records))?;
            registry
        }
        None => Registry::from_routes(&[])?,
    };

    let matched = MatchingEngine::match_record(&mut ctx, &registry).await?;
    eprintln!("   {}", if matched { "MATCH" } else { "NON_MATCH" });
    write_output(&serde_json::to_string_pretty(&ctx.objects)?, output)
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    eprintln!("Parsing: {}", input.display());

    let result = parse_file_auto(input)?;
    let records = match delimiter {
        Some(d) if d != result.delimiter => parse_delimited(&fs::read_to_string(input)?, d)?.1,
        _ => result.records,
    };

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(delimiter.unwrap_or(result.delimiter)),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("   Parsed {} rows", records.len());

    write_output(&serde_json::to_string_pretty(&records)?, output)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_validate(input: &Path, snapshot: bool) -> CliResult {
    let data: Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    let result = if snapshot {
        validate_profile_snapshot(&data)
    } else {
        validate_processing_context(&data)
    };

    match result {
        Ok(()) => {
            eprintln!("{}: valid", input.display());
            Ok(())
        }
        Err(errors) => {
            for err in errors.iter().take(10) {
                eprintln!("   - {}", err);
            }
            Err(format!("{}: {} schema error(s)", input.display(), errors.len()).into())
        }
    }
}

fn cmd_reference(config: &EngineConfig, action: ReferenceAction) -> CliResult {
    let mut store = ReferenceDataStore::with_dir(&config.reference_data_dir);

    match action {
        ReferenceAction::List => {
            let entries = store.list();
            if entries.is_empty() {
                eprintln!("No reference data stored in {}", store.dir().display());
                eprintln!("   Use 'dataimport reference import <file>' to add some.");
                return Ok(());
            }
            for entry in entries {
                println!("{}  {} rows  (imported {})", entry.tenant, entry.row_count(), entry.imported_at);
            }
        }

        ReferenceAction::Import { file, tenant } => {
            let tenant = store.import(&file, tenant.as_deref())?;
            eprintln!("Reference data saved for tenant: {}", tenant);
        }

        ReferenceAction::Show { tenant } => {
            let entry = store.get(&tenant).ok_or_else(|| format!("No reference data for tenant: {}", tenant))?;
            println!("{}", serde_json::to_string_pretty(entry)?);
        }

        ReferenceAction::Delete { tenant } => {
            store.delete(&tenant)?;
            eprintln!("Reference data deleted: {}", tenant);
        }
    }
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
