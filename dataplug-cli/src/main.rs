//! dataplug CLI - Stream JSON records between collections
//!
//! This binary provides command-line interfaces for:
//! - filter: pass records valid against the collection schema
//! - scan: count valid and invalid records
//! - flatten: expand nested records into flat entity rows
//! - schema / flat-metadata: describe a collection without reading records
//! - source / target: read a collection to stdout, write stdin into one
//! - collections: list the catalog

mod catalog;
mod error;
mod logging;

use catalog::Catalog;
use clap::{ArgAction, Parser, Subcommand};
use dataplug_format::constants::{DEFAULT_CATALOG, EXIT_OK, EXIT_USAGE, PROGRESS_INTERVAL};
use dataplug_format::RunOptions;
use dataplug_io::{cancel_on_interrupt, plan_operation, Endpoints, Operation, ProgressReporter};
use dataplug_transform::{flat_json_schema, flat_metadata, FlattenPlan};
use error::CliError;
use indicatif::ProgressDrawTarget;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dataplug")]
#[command(about = "Stream JSON records between collections")]
#[command(version)]
struct Cli {
    /// Collection catalog
    #[arg(long, global = true, env = "DATAPLUG_COLLECTIONS", default_value = DEFAULT_CATALOG)]
    collections: PathBuf,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pass stdin records that are valid against the schema to stdout
    Filter {
        /// Collection name
        collection: String,
        /// Pretty-print output with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Show progress counters on stderr
        #[arg(short, long)]
        progress: bool,
        /// Pass invalid records instead of valid ones
        #[arg(short = 'r', long)]
        invert: bool,
        /// Stop with a data error at the first invalid record
        #[arg(short, long)]
        fail: bool,
        /// Stop at the first record-level error
        #[arg(short, long)]
        abort: bool,
    },
    /// Validate stdin records and count them
    Scan {
        /// Collection name
        collection: String,
        /// Pretty-print results with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Show progress counters on stderr
        #[arg(short, long)]
        progress: bool,
        /// Count invalid records as valid and vice versa
        #[arg(short = 'r', long)]
        invert: bool,
        /// Stop with a data error at the first invalid record
        #[arg(short, long)]
        fail: bool,
        /// Print final counters as JSON on stdout
        #[arg(short = 'o', long)]
        results: bool,
    },
    /// Expand nested stdin records into flat entity rows
    Flatten {
        /// Collection name
        collection: String,
        /// Pretty-print output with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Show progress counters on stderr
        #[arg(short, long)]
        progress: bool,
        /// Stop at the first record that does not match the schema
        #[arg(short, long)]
        abort: bool,
        /// Wrap rows with entity name and array positions
        #[arg(short, long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
        metadata: bool,
        /// Root entity name (defaults to the collection name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print the collection schema
    Schema {
        /// Collection name
        collection: String,
        /// Pretty-print output with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Root entity name for --flat (defaults to the collection name)
        #[arg(short, long)]
        name: Option<String>,
        /// Print the schema of flattened rows instead
        #[arg(long)]
        flat: bool,
    },
    /// Print entity and column metadata of flattened rows
    #[command(name = "flat-metadata", alias = "metadata")]
    FlatMetadata {
        /// Collection name
        collection: String,
        /// Pretty-print output with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Root entity name (defaults to the collection name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Read the collection source to stdout
    Source {
        /// Collection name
        collection: String,
        /// Pretty-print output with this many spaces
        #[arg(short, long)]
        indent: Option<usize>,
        /// Show progress counters on stderr
        #[arg(short, long)]
        progress: bool,
        /// Stop when stdout goes away instead of ending quietly
        #[arg(short, long)]
        abort: bool,
        /// Source option
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Write stdin records into the collection target
    Target {
        /// Collection name
        collection: String,
        /// Show progress counters on stderr
        #[arg(short, long)]
        progress: bool,
        /// Stop at the first record-level error
        #[arg(short, long)]
        abort: bool,
        /// Target option
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// List catalog collections and their capabilities
    Collections,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::from(EXIT_OK)
            };
        }
    };
    logging::init(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let err = CliError::Runtime(err);
            error!("{}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    let result = runtime.block_on(run(cli));
    // A read of stdin may still be pending after an interrupt; do not wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let catalog = Catalog::load(&cli.collections)?;

    match cli.command {
        Commands::Filter {
            collection,
            indent,
            progress,
            invert,
            fail,
            abort,
        } => {
            let options = RunOptions {
                indent,
                progress,
                invert,
                fail,
                abort,
                ..RunOptions::default()
            };
            handle_pipeline(&catalog, Operation::Filter, &collection, options, &[]).await
        }
        Commands::Scan {
            collection,
            indent,
            progress,
            invert,
            fail,
            results,
        } => {
            let options = RunOptions {
                indent,
                progress,
                invert,
                fail,
                results,
                ..RunOptions::default()
            };
            handle_pipeline(&catalog, Operation::Scan, &collection, options, &[]).await
        }
        Commands::Flatten {
            collection,
            indent,
            progress,
            abort,
            metadata,
            name,
        } => {
            let options = RunOptions {
                indent,
                progress,
                abort,
                metadata,
                name,
                ..RunOptions::default()
            };
            handle_pipeline(&catalog, Operation::Flatten, &collection, options, &[]).await
        }
        Commands::Source {
            collection,
            indent,
            progress,
            abort,
            set,
        } => {
            let options = RunOptions {
                indent,
                progress,
                abort,
                ..RunOptions::default()
            };
            handle_pipeline(&catalog, Operation::Source, &collection, options, &set).await
        }
        Commands::Target {
            collection,
            progress,
            abort,
            set,
        } => {
            let options = RunOptions {
                progress,
                abort,
                ..RunOptions::default()
            };
            handle_pipeline(&catalog, Operation::Target, &collection, options, &set).await
        }
        Commands::Schema {
            collection,
            indent,
            name,
            flat,
        } => handle_schema(&catalog, &collection, indent, name, flat),
        Commands::FlatMetadata {
            collection,
            indent,
            name,
        } => handle_flat_metadata(&catalog, &collection, indent, name),
        Commands::Collections => handle_collections(&catalog),
    }
}

async fn handle_pipeline(
    catalog: &Catalog,
    operation: Operation,
    collection: &str,
    options: RunOptions,
    params: &[String],
) -> Result<(), CliError> {
    let collection = catalog.get(collection)?;
    let planned = plan_operation(operation, collection, &options, params, Endpoints::stdio()).await?;

    let reporter = options.progress.then(|| {
        ProgressReporter::start(
            &planned.counters,
            &planned.styles,
            ProgressDrawTarget::stderr(),
            PROGRESS_INTERVAL,
        )
    });

    let result = planned.pipeline.run(cancel_on_interrupt()).await;

    if let Some(reporter) = reporter {
        reporter.stop().await;
    }
    if options.results {
        print_json(&Value::Object(planned.counters.snapshot()), options.indent)?;
    }

    let summary = result?;
    if summary.cancelled {
        info!(records = summary.records_written, "Interrupted, output closed");
    }
    Ok(())
}

fn plan_for(
    catalog: &Catalog,
    collection: &str,
    name: Option<String>,
) -> Result<FlattenPlan, CliError> {
    let collection = catalog.get(collection)?;
    let schema = collection.require_schema()?;
    let name = name.as_deref().unwrap_or(&collection.name);
    Ok(FlattenPlan::from_schema(schema.document(), name)?)
}

fn handle_schema(
    catalog: &Catalog,
    collection: &str,
    indent: Option<usize>,
    name: Option<String>,
    flat: bool,
) -> Result<(), CliError> {
    if flat {
        let plan = plan_for(catalog, collection, name)?;
        return print_json(&flat_json_schema(&plan), indent);
    }
    let schema = catalog.get(collection)?.require_schema()?;
    print_json(schema.document(), indent)
}

fn handle_flat_metadata(
    catalog: &Catalog,
    collection: &str,
    indent: Option<usize>,
    name: Option<String>,
) -> Result<(), CliError> {
    let plan = plan_for(catalog, collection, name)?;
    print_json(&flat_metadata(&plan), indent)
}

fn handle_collections(catalog: &Catalog) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for collection in catalog.iter() {
        let capabilities: Vec<String> = collection
            .capabilities()
            .into_iter()
            .map(|capability| {
                let kind = match capability {
                    "source" => collection.source.as_ref().map(|source| source.kind()),
                    "target" => collection.target.as_ref().map(|target| target.kind()),
                    _ => None,
                };
                match kind {
                    Some(kind) => format!("{} ({})", capability, kind),
                    None => capability.to_string(),
                }
            })
            .collect();
        writeln!(out, "{}\t{}", collection.name, capabilities.join(", "))?;
    }
    info!(catalog = %catalog.path().display(), "Listed collections");
    Ok(())
}

fn print_json(value: &Value, indent: Option<usize>) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match indent.filter(|width| *width > 0) {
        Some(width) => {
            let indent = vec![b' '; width];
            let mut serializer =
                Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
            value.serialize(&mut serializer)?;
        }
        None => serde_json::to_writer(&mut out, value)?,
    }
    writeln!(out)?;
    Ok(())
}
