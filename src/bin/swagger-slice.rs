//! Swagger Slice CLI
//!
//! Command-line interface for extracting one operation from a Swagger/OpenAPI
//! document, or dereferencing a whole document.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use swagger_slice::{
    dereference, dereference_at, load_document, load_document_auto, repair_refs, DocUrl,
    ExtractError, ExtractOptions, Extractor, StaticSource,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swagger-slice")]
#[command(about = "Extract one dereferenced operation from a Swagger/OpenAPI document")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the operation addressed by a doc.html URL
    Extract {
        /// Viewer URL, e.g. https://host/api/doc.html#/group/tag/operationId
        doc_url: String,

        /// Read the API listing from this file instead of fetching it
        #[arg(long)]
        document: Option<PathBuf>,

        /// Print the full report (narrowed paths, summary, diagnostics)
        #[arg(long)]
        full: bool,

        /// Viewer page stripped from the URL path
        #[arg(long, default_value = "doc.html")]
        viewer_page: String,

        /// API listing path appended to the URL path
        #[arg(long, default_value = "/v2/api-docs")]
        api_docs_path: String,

        /// Fetch timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Repair and dereference a whole document (or one subtree)
    Deref {
        /// Document source: file path or URL (http:// or https://)
        source: String,

        /// Only dereference the subtree at this JSON Pointer (e.g. /paths)
        #[arg(long)]
        pointer: Option<String>,

        /// Leave dangling refs as they are
        #[arg(long)]
        no_repair: bool,

        /// Fetch timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            doc_url,
            document,
            full,
            viewer_page,
            api_docs_path,
            timeout,
            output,
            pretty,
        } => {
            let options = ExtractOptions::new()
                .viewer_page(viewer_page)
                .api_docs_path(api_docs_path)
                .timeout(Duration::from_secs(timeout));
            run_extract(&doc_url, document, options, full)
                .and_then(|value| write_output(&value, output, pretty))
        }

        Commands::Deref {
            source,
            pointer,
            no_repair,
            timeout,
            output,
            pretty,
        } => run_deref(&source, pointer.as_deref(), !no_repair, timeout)
            .and_then(|value| write_output(&value, output, pretty)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,swagger_slice=info".to_string(),
            _ => "info,swagger_slice=debug".to_string(),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: ExtractError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn run_extract(
    doc_url: &str,
    document: Option<PathBuf>,
    options: ExtractOptions,
    full: bool,
) -> Result<Value, u8> {
    let extraction = match document {
        Some(path) => {
            // Still parse the URL first so a bad URL fails before any IO
            DocUrl::parse_with(doc_url, &options).map_err(fail)?;
            let document = load_document(&path).map_err(fail)?;
            Extractor::new(StaticSource::new(document), options).extract(doc_url)
        }
        None => fetch_and_extract(doc_url, options),
    }
    .map_err(fail)?;

    for warning in &extraction.warnings {
        eprintln!("Warning: {}", warning);
    }

    let value = if full {
        extraction.to_report()
    } else {
        serde_json::to_value(&extraction.definition).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?
    };
    Ok(value)
}

#[cfg(feature = "remote")]
fn fetch_and_extract(
    doc_url: &str,
    options: ExtractOptions,
) -> Result<swagger_slice::Extraction, ExtractError> {
    Extractor::http(options).extract(doc_url)
}

#[cfg(not(feature = "remote"))]
fn fetch_and_extract(
    doc_url: &str,
    _options: ExtractOptions,
) -> Result<swagger_slice::Extraction, ExtractError> {
    Err(ExtractError::FetchFailed {
        url: doc_url.to_string(),
        source: "built without the `remote` feature; use --document".into(),
    })
}

fn run_deref(source: &str, pointer: Option<&str>, repair: bool, timeout: u64) -> Result<Value, u8> {
    let mut document =
        load_document_auto(source, Duration::from_secs(timeout)).map_err(fail)?;

    if repair {
        repair_refs(&mut document);
    }

    let result = match pointer {
        Some(pointer) => dereference_at(&document, pointer).ok_or_else(|| {
            eprintln!("Error: pointer not found: {}", pointer);
            2u8
        })?,
        None => dereference(&document),
    };

    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(result.value)
}

fn write_output(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
