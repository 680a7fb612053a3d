//! rrdp - round-robin time-series persistence
//!
//! Command-line access to a persistence engine's data directory:
//! - Recording samples and querying history
//! - Store inventory
//! - Export, import and deletion of stores

use clap::{Args, Parser, Subcommand};
use rrdp_common::{
    tick_to_datetime, Clock, Error, HistoricRecord, ItemInfoRecord, Ordering, OutputFormat,
    QuerySpec, SystemClock,
};
use rrdp_core::config::{load_config, ConfigError, ConfigOptions, ResolvedConfig};
use rrdp_core::exit_codes::ExitCode;
use rrdp_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use rrdp_core::{PersistenceEngine, StaticRegistry, TransferEncoding, WriteOutcome};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// rrdp - Round-robin time-series persistence
#[derive(Parser)]
#[command(name = "rrdp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (overrides RRDP_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides the config file and RRDP_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one sample
    Store(StoreArgs),

    /// Query an entity's history
    Query(QueryArgs),

    /// List every store with its primary archive span
    Info,

    /// Export one store, or all of them as a bundle
    Export(ExportArgs),

    /// Import one store, or a bundle of them
    Import(ImportArgs),

    /// Delete one store or all of them
    Delete(DeleteArgs),

    /// Print the resolved configuration
    Config,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct StoreArgs {
    /// Entity name
    name: String,

    /// Sample value
    #[arg(allow_negative_numbers = true)]
    value: f64,

    /// Sample time in seconds since the epoch (default: now)
    #[arg(long)]
    at: Option<u64>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Entity name
    name: String,

    /// Range start (seconds since the epoch); omit for the latest value
    #[arg(long)]
    begin: Option<u64>,

    /// Range end (default: now)
    #[arg(long)]
    end: Option<u64>,

    /// Page number
    #[arg(long, default_value = "0")]
    page: u32,

    /// Page size
    #[arg(long, default_value = "1")]
    size: u32,

    /// Ordering (asc or desc)
    #[arg(long, default_value = "desc")]
    order: Ordering,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Entity to export (default: all stores as a bundle)
    name: Option<String>,

    /// Base64 output for text-only transports
    #[arg(long)]
    base64: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// `FILE` for a bundle, or `NAME FILE` for one store ("-" reads stdin)
    #[arg(num_args = 1..=2, required = true)]
    targets: Vec<String>,

    /// Input is base64 text
    #[arg(long)]
    base64: bool,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Entity whose store to delete
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    name: Option<String>,

    /// Delete every store
    #[arg(long)]
    all: bool,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let options = ConfigOptions {
        config_path: cli.global.config.clone(),
        data_dir: cli.global.data_dir.clone(),
    };
    let resolved = match load_config(&options) {
        Ok(resolved) => resolved,
        Err(e) => {
            let code = config_error_exit(&e);
            report_error(&cli.global, code, &e.to_string(), None);
            std::process::exit(code.as_i32());
        }
    };

    let exit_code = match &cli.command {
        Commands::Config => run_config(&cli.global, &resolved),
        command => match open_engine(&resolved) {
            Ok(engine) => {
                let result = match command {
                    Commands::Store(args) => run_store(&cli.global, &engine, args),
                    Commands::Query(args) => run_query(&cli.global, &engine, args),
                    Commands::Info => run_info(&cli.global, &engine),
                    Commands::Export(args) => run_export(&engine, args),
                    Commands::Import(args) => run_import(&cli.global, &engine, args),
                    Commands::Delete(args) => run_delete(&cli.global, &engine, args),
                    Commands::Config => Ok(ExitCode::Clean),
                };
                engine.close();
                result.unwrap_or_else(|e| fail(&cli.global, &e))
            }
            Err(e) => fail(&cli.global, &e),
        },
    };

    std::process::exit(exit_code.as_i32());
}

fn open_engine(resolved: &ResolvedConfig) -> rrdp_common::Result<PersistenceEngine> {
    let mut config = resolved.config.clone();
    // One-shot commands never live long enough for a cleanup to come due.
    config.cleanup.enabled = false;
    PersistenceEngine::open(
        config,
        Arc::new(SystemClock),
        Arc::new(StaticRegistry::new()),
    )
}

// ============================================================================
// Commands
// ============================================================================

fn run_config(global: &GlobalOpts, resolved: &ResolvedConfig) -> ExitCode {
    match global.format {
        OutputFormat::Json => print_json(resolved),
        OutputFormat::Text => {
            let config = &resolved.config;
            let source = resolved
                .config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string());
            println!("source\t{source}");
            println!("data_dir\t{}", config.data_dir.display());
            println!("consolidation\t{}", config.consolidation);
            println!("cleanup.enabled\t{}", config.cleanup.enabled);
            println!("cleanup.delay_secs\t{}", config.cleanup.delay_secs);
            println!("cleanup.poll_interval_ms\t{}", config.cleanup.poll_interval_ms);
            for warning in &resolved.warnings {
                println!("warning\t{warning}");
            }
        }
    }
    ExitCode::Clean
}

fn run_store(
    global: &GlobalOpts,
    engine: &PersistenceEngine,
    args: &StoreArgs,
) -> rrdp_common::Result<ExitCode> {
    let time = args.at.unwrap_or_else(|| SystemClock.now());
    let outcome = engine.try_store(&args.name, args.value, time)?;
    match global.format {
        OutputFormat::Json => print_json(&StoreResponse {
            entity: &args.name,
            value: args.value,
            outcome,
        }),
        OutputFormat::Text => {
            println!("{}\t{}\t{}", args.name, outcome.recorded_at, args.value);
        }
    }
    Ok(ExitCode::Clean)
}

#[derive(Serialize)]
struct StoreResponse<'a> {
    entity: &'a str,
    value: f64,
    #[serde(flatten)]
    outcome: WriteOutcome,
}

fn run_query(
    global: &GlobalOpts,
    engine: &PersistenceEngine,
    args: &QueryArgs,
) -> rrdp_common::Result<ExitCode> {
    let mut spec = QuerySpec::for_entity(&args.name)
        .with_page(args.page, args.size)
        .with_ordering(args.order);
    spec.begin = args.begin;
    spec.end = args.end;

    let records = engine.query(&spec)?;
    match global.format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => records.iter().for_each(print_record),
    }
    Ok(if records.is_empty() {
        ExitCode::NoData
    } else {
        ExitCode::Clean
    })
}

fn print_record(record: &HistoricRecord) {
    println!("{}\t{}", record.time().to_rfc3339(), record.value);
}

fn run_info(global: &GlobalOpts, engine: &PersistenceEngine) -> rrdp_common::Result<ExitCode> {
    let records = engine.get_info()?;
    match global.format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => records.iter().for_each(print_info),
    }
    Ok(if records.is_empty() {
        ExitCode::NoData
    } else {
        ExitCode::Clean
    })
}

fn print_info(info: &ItemInfoRecord) {
    println!(
        "{}\t{}\t{}\t{}",
        info.name,
        info.count,
        tick_to_datetime(info.earliest).to_rfc3339(),
        tick_to_datetime(info.latest).to_rfc3339()
    );
}

fn encoding(base64: bool) -> TransferEncoding {
    if base64 {
        TransferEncoding::Base64
    } else {
        TransferEncoding::Binary
    }
}

fn run_export(engine: &PersistenceEngine, args: &ExportArgs) -> rrdp_common::Result<ExitCode> {
    let encoding = encoding(args.base64);
    let bytes = match &args.name {
        Some(name) => engine.export_one(name, encoding)?,
        None => engine.export_all(encoding)?,
    };
    match &args.output {
        Some(path) => std::fs::write(path, &bytes).map_err(|e| Error::io(path, e))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| Error::io("<stdout>", e))?;
        }
    }
    Ok(ExitCode::Clean)
}

fn read_input(source: &str) -> rrdp_common::Result<Vec<u8>> {
    if source == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| Error::io("<stdin>", e))?;
        Ok(bytes)
    } else {
        std::fs::read(source).map_err(|e| Error::io(source, e))
    }
}

#[derive(Serialize)]
struct ImportResponse {
    imported: Vec<String>,
}

fn run_import(
    global: &GlobalOpts,
    engine: &PersistenceEngine,
    args: &ImportArgs,
) -> rrdp_common::Result<ExitCode> {
    let encoding = encoding(args.base64);
    let imported = match args.targets.as_slice() {
        [name, file] => {
            engine.import_one(name, &read_input(file)?, encoding)?;
            vec![name.clone()]
        }
        [file] => engine.import_all(&read_input(file)?, encoding)?,
        _ => return Ok(ExitCode::ArgsError),
    };
    match global.format {
        OutputFormat::Json => print_json(&ImportResponse { imported }),
        OutputFormat::Text => imported.iter().for_each(|name| println!("{name}")),
    }
    Ok(ExitCode::Clean)
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: usize,
}

fn run_delete(
    global: &GlobalOpts,
    engine: &PersistenceEngine,
    args: &DeleteArgs,
) -> rrdp_common::Result<ExitCode> {
    let deleted = match (&args.name, args.all) {
        (_, true) => engine.delete_all()?,
        (Some(name), false) => {
            if !engine.delete_one(name)? {
                return Err(Error::StoreNotFound(name.clone()));
            }
            1
        }
        (None, false) => return Ok(ExitCode::ArgsError),
    };
    match global.format {
        OutputFormat::Json => print_json(&DeleteResponse { deleted }),
        OutputFormat::Text => println!("{deleted}"),
    }
    Ok(ExitCode::Clean)
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn config_error_exit(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::IoError { .. } => ExitCode::IoError,
        ConfigError::NotFound { .. }
        | ConfigError::ParseError { .. }
        | ConfigError::VersionMismatch { .. } => ExitCode::ConfigError,
    }
}

fn fail(global: &GlobalOpts, error: &Error) -> ExitCode {
    let code = ExitCode::from(error);
    report_error(global, code, &error.to_string(), Some(error));
    code
}

fn report_error(global: &GlobalOpts, code: ExitCode, message: &str, error: Option<&Error>) {
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "status": "error",
                "error": {
                    "exit_code": code.as_i32(),
                    "code_name": code.code_name(),
                    "category": error.map(|e| e.category().to_string()),
                    "message": message,
                    "remediation": error.map(|e| e.remediation()),
                }
            });
            match serde_json::to_string_pretty(&response) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("error: {message}"),
            }
        }
        OutputFormat::Text => eprintln!("error: {message}"),
    }
}
