//! pilot-discovery
//!
//! # Process Flow
//!
//! ```text
//!   argv ──▶ clap ──▶ RuntimeConfiguration::from_args (all errors at once)
//!                              │
//!                              ▼
//!                        init_logging
//!                              │
//!                              ▼
//!   lifecycle::run:  construct ──▶ start (bind all or nothing) ──▶ wait
//!                                                                  │
//!                         SIGINT / SIGTERM / listener failure ─────┤
//!                                                                  ▼
//!                                                                stop
//! ```

use std::process::ExitCode;

use clap::Parser;

use pilot_discovery::config::{Cli, Command};
use pilot_discovery::observability::logging::init_logging;
use pilot_discovery::{lifecycle, PilotError, RuntimeConfiguration};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let args = match cli.command {
        Command::Version => {
            println!("pilot-discovery {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Command::Discovery(args) => args,
    };

    match discovery(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn discovery(args: pilot_discovery::config::DiscoveryArgs) -> Result<(), PilotError> {
    let config = RuntimeConfiguration::from_args(args)?;
    init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        registries = ?config.registries,
        namespace = %config.namespace,
        "pilot-discovery starting"
    );

    lifecycle::run(config).await
}

/// Fatal errors always reach stderr, whatever the log filter says.
fn report(error: &PilotError) {
    if tracing::dispatcher::has_been_set() {
        tracing::error!(error = %error, "pilot-discovery failed");
    }
    match error {
        PilotError::Config(config) => {
            eprintln!("Error: invalid configuration");
            for problem in config.errors() {
                eprintln!("  {}", problem);
            }
        }
        other => eprintln!("Error: {}", other),
    }
}
