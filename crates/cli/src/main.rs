//! Marula CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending database migrations
//! marula-cli migrate
//!
//! # Verify the configured database is reachable
//! marula-cli check
//!
//! # Print the optimized connection string
//! marula-cli uri optimize
//! marula-cli uri optimize --raw postgres://u:p@ep-foo.neon.tech/db
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations against the direct endpoint
//! - `check` - Build the configured transport and ping the database
//! - `uri optimize` - Show what the connection-string optimizer produces

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "marula-cli")]
#[command(author, version, about = "Marula CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Verify database connectivity over the configured transport
    Check,
    /// Connection-string tools
    Uri {
        #[command(subcommand)]
        action: UriAction,
    },
}

#[derive(Subcommand)]
enum UriAction {
    /// Print the optimized connection string
    Optimize {
        /// Optimize this URI instead of reading `DATABASE_URI`
        #[arg(long)]
        raw: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Check => commands::check::run().await?,
        Commands::Uri { action } => match action {
            UriAction::Optimize { raw } => commands::uri::optimize(raw.as_deref())?,
        },
    }
    Ok(())
}
