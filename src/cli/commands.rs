use crate::app::App;
use crate::config::AppConfig;
use crate::demo;
use crate::format::FormatRegistry;
use crate::server::{spec_endpoint, HttpServer};
use crate::spec::{build_spec, load_base_document, SpecError, SpecIssue};
use crate::validator::Validator;
use crate::validator_cache::ValidatorCache;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for swaggerware
#[derive(Parser)]
#[command(name = "swaggerware")]
#[command(about = "Swagger-validated demo service and spec tooling", long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true, default_value = "config/config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo API
    Serve {
        /// Address and port to bind, overriding the configuration
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the merged specification as JSON
    Spec {
        /// Value for the document's `host` field
        #[arg(long, default_value = "localhost")]
        host: String,
    },
    /// Build the specification and compile every schema
    Check,
}

/// Print spec issues to stderr, one per line.
pub fn print_issues(issues: &[SpecIssue]) {
    if issues.is_empty() {
        eprintln!("No issues found");
        return;
    }
    eprintln!("{} issue(s):", issues.len());
    for issue in issues {
        eprintln!("  {issue}");
    }
}

/// The configured base document, or the built-in demo document when the
/// configured file does not exist.
fn base_document(config: &AppConfig) -> Result<Value> {
    let path = &config.spec.base_document;
    if path.exists() {
        return load_base_document(path)
            .with_context(|| format!("Failed to load base document {}", path.display()));
    }
    info!(path = %path.display(), "Base document not found, using built-in document");
    demo::base_document().context("Built-in base document is invalid")
}

/// Collect every documentation and schema issue of the demo routes.
pub(crate) fn check(config: &AppConfig) -> Result<Vec<SpecIssue>> {
    let registry = demo::registry(&config.spec.base_path);
    let spec = match build_spec(base_document(config)?, &registry, &config.spec.base_path) {
        Ok(spec) => Arc::new(spec),
        Err(SpecError::Issues(issues)) => return Ok(issues),
        Err(e) => return Err(e.into()),
    };
    let validator = match Validator::new(
        spec,
        FormatRegistry::with_defaults(),
        ValidatorCache::new(config.validation.schema_cache),
    ) {
        Ok(validator) => validator,
        Err(e) => return Ok(vec![SpecIssue::new("definitions", "schema", e.to_string())]),
    };
    match validator.precompile() {
        Ok(_) => Ok(Vec::new()),
        Err(SpecError::Issues(issues)) => Ok(issues),
        Err(e) => Err(e.into()),
    }
}

/// Execute a parsed command line.
///
/// # Errors
///
/// Returns an error if the configuration or specification cannot be loaded,
/// if `check` finds issues, or if the server fails to start.
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(&cli.config)?;
    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            may::config().set_stack_size(config.server.stack_size);

            let registry = demo::registry(&config.spec.base_path);
            let mut app = App::build(base_document(&config)?, &registry, &config)?;
            demo::register_handlers(app.dispatcher_mut(), Arc::new(demo::Store::seeded()));

            let handle = HttpServer(app.into_service())
                .start(config.server.addr.as_str())
                .with_context(|| format!("Failed to bind {}", config.server.addr))?;
            info!(
                addr = %handle.addr(),
                spec_endpoint = %config.server.spec_endpoint,
                "Serving demo API"
            );
            handle
                .join()
                .map_err(|e| anyhow!("Server coroutine panicked: {e:?}"))?;
            Ok(())
        }
        Commands::Spec { host } => {
            let registry = demo::registry(&config.spec.base_path);
            let spec = build_spec(base_document(&config)?, &registry, &config.spec.base_path)?;
            let response = spec_endpoint(&spec, Some(&host));
            println!("{}", String::from_utf8_lossy(&response.body));
            Ok(())
        }
        Commands::Check => {
            let issues = check(&config)?;
            print_issues(&issues);
            if issues.is_empty() {
                Ok(())
            } else {
                Err(anyhow!("{} issue(s) found", issues.len()))
            }
        }
    }
}
