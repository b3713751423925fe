//! Live Commerce CLI - Database migrations and merchant management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lc-cli migrate
//!
//! # Create a merchant with its storefront
//! lc-cli merchant create -e owner@example.com -n "Ana" -s acme --store-name "Acme"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `merchant create` - Create a merchant account and storefront

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lc-cli")]
#[command(author, version, about = "Live Commerce CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage merchants
    Merchant {
        #[command(subcommand)]
        action: MerchantAction,
    },
}

#[derive(Subcommand)]
enum MerchantAction {
    /// Create a merchant and its storefront
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Merchant display name
        #[arg(short, long)]
        name: String,

        /// Storefront slug (derived from the store name when omitted)
        #[arg(short, long)]
        slug: Option<String>,

        /// Storefront name (defaults to the merchant name)
        #[arg(long)]
        store_name: Option<String>,

        /// Login password (a random one is generated and printed when omitted)
        #[arg(long)]
        password: Option<String>,
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
        Commands::Merchant { action } => match action {
            MerchantAction::Create {
                email,
                name,
                slug,
                store_name,
                password,
            } => {
                let args = commands::merchant::CreateArgs {
                    email,
                    name,
                    slug,
                    store_name,
                    password,
                };
                commands::merchant::create(args).await?;
            }
        },
    }
    Ok(())
}
