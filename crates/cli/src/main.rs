mod console;
mod controllers;
mod routes;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use resthost_server::{read_host_config, ConfigError, HostError, ProvisionError, ServiceHost};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Configuration-driven REST service host.
#[derive(Parser)]
#[command(name = "resthost", version, about = "Configuration-driven REST service host")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the configured services and serve until Ctrl+C
    Serve {
        /// Path to the host configuration TOML file
        #[arg(long)]
        config: PathBuf,
        /// Start only this service
        #[arg(long)]
        service: Option<String>,
    },

    /// List every service's controllers and operations
    Routes {
        /// Path to the host configuration TOML file
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Telemetry(#[from] console::TelemetryError),
    #[error("failed to create tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        report_error(&e.to_string(), cli.output);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Serve { config, service } => {
            console::initialise(&cli.log_filter)?;
            let rt = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
            rt.block_on(serve::run(config, service.as_deref()))
        }
        Commands::Routes { config } => {
            let config = read_host_config(config)?;
            let host = ServiceHost::new(&config, &controllers::provisioner()?, Vec::new())?;
            print!("{}", routes::render(&host, cli.output));
            Ok(())
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
