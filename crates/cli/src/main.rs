//! Stash command-line client.
//!
//! Thin front end over the `stash-client` core: one subcommand per
//! API operation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stash_client::{AccessAction, ApiClient, ClientConfig, SessionStore};

/// Stash - client for the Stash file storage service.
#[derive(Parser, Debug)]
#[command(name = "stash")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides the config file)
    #[arg(short, long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create an account and log in
    Register {
        /// Username for the new account
        username: String,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Log in and store the session
    Login {
        /// Username to log in as
        username: String,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Invalidate the session and clear it locally
    Logout,

    /// Work with stored files
    #[command(subcommand)]
    Files(FilesCommands),

    /// Grant or revoke a user's access to a file (admin)
    #[command(subcommand)]
    Access(AccessCommands),

    /// Promote a user to admin (admin)
    GrantAdmin {
        /// Username to promote
        username: String,
    },

    /// Show per-user download statistics (admin)
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the current session
    Whoami,
}

/// Subcommands for file management.
#[derive(Subcommand, Debug, Clone)]
pub enum FilesCommands {
    /// List stored files
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Upload a file (admin)
    Upload {
        /// Path of the file to upload
        path: PathBuf,
    },

    /// Download a file
    Download {
        /// File ID to download
        id: u64,

        /// Output path (defaults to the server-suggested name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete a file (admin)
    Delete {
        /// File ID to delete
        id: u64,
    },
}

/// Subcommands for file access management.
#[derive(Subcommand, Debug, Clone)]
pub enum AccessCommands {
    /// Grant a user access to a file
    Grant {
        /// Username to grant access to
        username: String,

        /// File ID
        file_id: u64,
    },

    /// Revoke a user's access to a file
    Revoke {
        /// Username to revoke access from
        username: String,

        /// File ID
        file_id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = match cli.config {
        Some(path) => path,
        None => ClientConfig::default_path().context("no config directory available")?,
    };
    let mut config = ClientConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    tracing::debug!(server_url = %config.server_url, "using server");

    let store = Arc::new(
        SessionStore::open_default().context("failed to open the session store")?,
    );
    let client = ApiClient::new(&config, store).context("failed to build the API client")?;

    match cli.command {
        Commands::Register { username, password } => {
            let password = resolve_password(password)?;
            let session = client.register(&username, &password).await?;
            println!(
                "registered and logged in as {}",
                session.username.as_deref().unwrap_or(&username)
            );
        }

        Commands::Login { username, password } => {
            let password = resolve_password(password)?;
            let session = client.login(&username, &password).await?;
            let role = if session.is_admin() { "admin" } else { "standard" };
            println!(
                "logged in as {} ({role})",
                session.username.as_deref().unwrap_or(&username)
            );
        }

        Commands::Logout => {
            client.logout().await?;
            println!("logged out");
        }

        Commands::Files(command) => run_files_command(&client, command).await?,

        Commands::Access(command) => {
            let (username, file_id, action) = match command {
                AccessCommands::Grant { username, file_id } => {
                    (username, file_id, AccessAction::Grant)
                }
                AccessCommands::Revoke { username, file_id } => {
                    (username, file_id, AccessAction::Revoke)
                }
            };
            let message = client.manage_file_access(&username, file_id, action).await?;
            println!("{message}");
        }

        Commands::GrantAdmin { username } => {
            let message = client.grant_admin(&username).await?;
            println!("{message}");
        }

        Commands::Stats { json } => {
            let stats = client.user_statistics().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{:<24} {:>8} {:>12}", "USERNAME", "ADMIN", "DOWNLOADS");
                for user in stats {
                    println!(
                        "{:<24} {:>8} {:>12}",
                        user.username,
                        if user.is_admin { "yes" } else { "no" },
                        user.download_count
                    );
                }
            }
        }

        Commands::Whoami => {
            let session = client.session();
            match session.username {
                Some(ref username) => {
                    let role = if session.is_admin() { "admin" } else { "standard" };
                    println!("{username} ({role})");
                }
                None => println!("not logged in"),
            }
        }
    }

    Ok(())
}

async fn run_files_command(client: &ApiClient, command: FilesCommands) -> anyhow::Result<()> {
    match command {
        FilesCommands::List { json } => {
            let files = client.list_files().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                println!("no files");
            } else {
                println!("{:<8} {:<40} {:<16} {:>10}", "ID", "NAME", "OWNER", "DOWNLOADS");
                for file in files {
                    println!(
                        "{:<8} {:<40} {:<16} {:>10}",
                        file.id,
                        file.filename,
                        file.owner_username.as_deref().unwrap_or("-"),
                        file.download_count
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
        }

        FilesCommands::Upload { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .context("path has no usable file name")?;
            let message = client.upload_file(file_name, bytes).await?;
            println!("{message}");
        }

        FilesCommands::Download { id, output } => {
            let download = client.download_file(id).await?;
            let target = output.unwrap_or_else(|| {
                PathBuf::from(
                    download
                        .file_name
                        .clone()
                        .unwrap_or_else(|| format!("file_{id}")),
                )
            });
            std::fs::write(&target, &download.bytes)
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!("saved {} ({} bytes)", target.display(), download.bytes.len());
        }

        FilesCommands::Delete { id } => {
            let message = client.delete_file(id).await?;
            println!("{message}");
        }
    }

    Ok(())
}

/// Use the provided password or prompt for one on stdin.
fn resolve_password(provided: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }

    eprint!("password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    Ok(password)
}
