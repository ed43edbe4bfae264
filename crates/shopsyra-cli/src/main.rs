//! Shopsyra - a command-line seller client for Shopsyra storefronts.
//!
//! Every run restores the saved session once, then asks the navigation gate
//! whether the requested screen is reachable before running it.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shopsyra_core::auth::{FileStore, KeyValueStore, KeyringStore};
use shopsyra_core::config::StoreBackend;
use shopsyra_core::{ApiClient, ApiError, Config, NavigationGate, RequestAuth, Route, SessionManager};

use commands::Client;

/// Environment variable naming a directory for log files
const LOG_DIR_ENV: &str = "SHOPSYRA_LOG_DIR";

/// Log file name inside the log directory
const LOG_FILE: &str = "shopsyra.log";

#[derive(Parser)]
#[command(name = "shopsyra", version, about = "Manage your Shopsyra storefront")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether this device is signed in
    Status,
    /// Sign in with a one-time code sent to your mobile
    Signin {
        /// Mobile number (10 digits, +91 is added)
        #[arg(long)]
        mobile: Option<String>,
        /// One-time code; prompted for when omitted
        #[arg(long)]
        otp: Option<String>,
    },
    /// Create a seller account
    Signup {
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// List your products with stock and sales totals
    Products {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show your seller profile
    Profile {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish a new product
    AddProduct {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = shopsyra_core::models::product::DEFAULT_CATEGORY)]
        category: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stock: i64,
        #[arg(long)]
        size: Option<String>,
        /// Image files to upload (up to 6)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Sign out of this device
    Logout,
}

impl Command {
    /// Screen this command runs on
    fn route(&self) -> Route {
        match self {
            Command::Status | Command::Products { .. } => Route::Home,
            Command::Signin { .. } => Route::SignIn,
            Command::Signup { .. } => Route::SignUp,
            Command::AddProduct { .. } => Route::AddProduct,
            Command::Profile { .. } | Command::Logout => Route::Profile,
        }
    }
}

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr, or to a file when `SHOPSYRA_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn open_store(config: &Config) -> Result<Box<dyn KeyValueStore>> {
    Ok(match config.store_backend {
        StoreBackend::File => Box::new(FileStore::new(config.store_path()?)),
        StoreBackend::Keyring => Box::new(KeyringStore::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("Shopsyra starting");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    debug!(api = %config.api_base_url(), backend = ?config.store_backend, "Config loaded");

    let auth = RequestAuth::new();
    let api = ApiClient::new(&config, auth.clone())?;
    let store = open_store(&config)?;

    let (session, restore) = SessionManager::start(store, api.clone(), auth);
    let outcome = restore.await?;
    debug!(?outcome, "Session restore finished");

    let mut gate = NavigationGate::new(cli.command.route());
    if let Some(redirect) = gate.evaluate(&session.session()) {
        commands::report_redirect(cli.command.route(), redirect);
        return Ok(());
    }

    let mut client = Client {
        api,
        session,
        gate,
        config,
    };

    let result = match cli.command {
        Command::Status => client.status(),
        Command::Signin { mobile, otp } => client.sign_in(mobile, otp).await,
        Command::Signup {
            mobile,
            name,
            email,
            address,
        } => client.sign_up(&mobile, &name, email.as_deref(), address.as_deref()).await,
        Command::Products { json } => client.products(json).await,
        Command::Profile { json } => client.profile(json).await,
        Command::AddProduct {
            name,
            description,
            category,
            price,
            stock,
            size,
            images,
        } => {
            let form = commands::ProductForm {
                name,
                description,
                category,
                price,
                stock,
                size,
                images,
            };
            client.add_product(form).await
        }
        Command::Logout => client.logout(),
    };

    if let Err(ref e) = result {
        if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth_failure) {
            warn!("Server rejected the session, signing out locally");
            if let Err(err) = client.logout_expired() {
                warn!(error = %err, "Failed to clear expired session");
            }
        }
    }

    info!("Shopsyra exiting");
    result
}
