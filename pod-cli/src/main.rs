//! # podsync
//!
//! Maintenance CLI for podsync accounts.
//!
//! ## Commands
//!
//! - `user add`: Create a user
//! - `device add|list|remove`: Manage a user's devices
//! - `sync`: Record that two devices share state
//! - `groups`: Show a user's sync groups
//! - `targets`: Show devices a device can still sync with
//! - `subscribe` / `unsubscribe` / `subscriptions`: Manage subscriptions
//! - `merge`: Merge duplicate podcasts into the first one
//!
//! ## Example
//!
//! ```bash
//! podsync user add alice
//! podsync device add alice phone
//! podsync device add alice laptop
//! podsync sync alice phone laptop
//! podsync groups alice
//!
//! podsync subscribe alice phone http://example.com/feed.rss
//! podsync merge http://example.com/feed.rss https://example.com/feed.rss
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pod_store::SqliteStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{device, groups, merge, subscriptions, user};

/// Maintenance CLI for podsync accounts.
#[derive(Parser, Debug)]
#[command(name = "podsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./podsync.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage devices
    #[command(subcommand)]
    Device(DeviceCommand),

    /// Record that two devices of a user share synchronized state
    Sync {
        /// Owner of both devices
        user: String,
        /// First device label
        a: String,
        /// Second device label
        b: String,
    },

    /// Show a user's sync groups, ungrouped devices first
    Groups {
        /// Username
        user: String,
    },

    /// Show devices a device is not yet synced with
    Targets {
        /// Username
        user: String,
        /// Device label
        uid: String,
    },

    /// Subscribe a user to a feed
    Subscribe {
        /// Username
        user: String,
        /// Subscribing device label
        uid: String,
        /// Feed URL
        url: String,
    },

    /// Unsubscribe a user from a feed
    Unsubscribe {
        /// Username
        user: String,
        /// Device label
        uid: String,
        /// Feed URL, any alias of the podcast
        url: String,
    },

    /// List a user's subscriptions
    Subscriptions {
        /// Username
        user: String,
    },

    /// Merge duplicate podcasts into the one owning the target URL
    Merge {
        /// URL of the podcast that survives
        target: String,
        /// URLs of the podcasts to absorb
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a user
    Add {
        /// Unique username
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Register a device (no-op if it exists)
    Add {
        /// Owner
        user: String,
        /// Device label
        uid: String,
    },
    /// List a user's devices in creation order
    List {
        /// Owner
        user: String,
    },
    /// Remove a device and its sync edges; its subscriptions move to another device
    Remove {
        /// Owner
        user: String,
        /// Device label
        uid: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database = database;
    }

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SqliteStore::open(&config.storage)
        .await
        .with_context(|| {
            format!(
                "Failed to open database {}",
                config.storage.database.display()
            )
        })?;
    tracing::debug!("Using database {}", config.storage.database.display());

    match cli.command {
        Commands::User(UserCommand::Add { name }) => {
            user::add(&store, &name).await?;
        }
        Commands::Device(DeviceCommand::Add { user, uid }) => {
            device::add(&store, &user, &uid).await?;
        }
        Commands::Device(DeviceCommand::List { user }) => {
            device::list(&store, &user).await?;
        }
        Commands::Device(DeviceCommand::Remove { user, uid }) => {
            device::remove(&store, &user, &uid).await?;
        }
        Commands::Sync { user, a, b } => {
            groups::sync(&store, &user, &a, &b).await?;
        }
        Commands::Groups { user } => {
            groups::show(&store, &user).await?;
        }
        Commands::Targets { user, uid } => {
            groups::targets(&store, &user, &uid).await?;
        }
        Commands::Subscribe { user, uid, url } => {
            subscriptions::subscribe(&store, &user, &uid, &url).await?;
        }
        Commands::Unsubscribe { user, uid, url } => {
            subscriptions::unsubscribe(&store, &user, &uid, &url).await?;
        }
        Commands::Subscriptions { user } => {
            subscriptions::list(&store, &user).await?;
        }
        Commands::Merge { target, sources } => {
            merge::run(store, config.merge, &target, &sources).await?;
        }
    }

    Ok(())
}
