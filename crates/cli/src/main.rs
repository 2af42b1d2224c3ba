//! Storecart CLI - drive a cart session from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Offline: lines go to the profile's local cart
//! storecart add 42 --quantity 2
//! storecart show
//!
//! # Sign in: the offline cart is replayed into the server cart
//! storecart login --token "$TOKEN"
//!
//! # Check out the server cart
//! storecart checkout
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` / `update` / `remove` / `clear` - Mutate the cart
//! - `checkout` - Submit the cart as an order
//! - `login` / `logout` - Store or forget the bearer credential
//! - `sync` - Retry lines kept in the offline cart after a partial drain
//!
//! # Environment Variables
//!
//! - `STORECART_API_URL` - Base URL of the cart service (required)
//! - `STORECART_PROFILE_DIR` - Profile directory (default: `.storecart`)
//! - `STORECART_MUTATION_POLICY` - `queue` or `reject`
//! - `STORECART_SYNC_POLICY` - `discard` or `keep`
//! - `STORECART_SYNC_RETRIES` - Extra attempts per drained line
//! - `STORECART_TOKEN` - Bearer credential to sign in with
//! - `RUST_LOG` - Log filter (default: `storecart_client=info,storecart=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "storecart")]
#[command(author, version, about = "Storecart cart session tools")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a product to the cart
    Add {
        /// Catalog product ID
        product_id: i64,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes it)
    Update {
        /// Line ID as shown by `show`
        line_id: String,

        /// New quantity
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Line ID as shown by `show`
        line_id: String,
    },
    /// Empty the cart
    Clear,
    /// Submit the cart as an order
    Checkout,
    /// Store a bearer credential and sync the offline cart
    Login {
        /// Bearer token issued by the authentication service
        #[arg(short, long, env = "STORECART_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Forget the stored credential
    Logout,
    /// Replay the offline cart into the server cart
    Sync,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storecart_client=info,storecart=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let ctx = commands::Context::open().await?;

    let result = match cli.command {
        Commands::Show => {
            commands::cart::show(&ctx);
            Ok(())
        }
        Commands::Add {
            product_id,
            quantity,
        } => commands::cart::add(&ctx, product_id, quantity).await,
        Commands::Update { line_id, quantity } => {
            commands::cart::update(&ctx, &line_id, quantity).await
        }
        Commands::Remove { line_id } => commands::cart::remove(&ctx, &line_id).await,
        Commands::Clear => commands::cart::clear(&ctx).await,
        Commands::Checkout => commands::cart::checkout(&ctx).await,
        Commands::Login { token } => commands::auth::login(&ctx, token).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Sync => commands::cart::sync(&ctx).await,
    };

    ctx.close().await;
    result
}
