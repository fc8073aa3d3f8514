mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stowage_client::{BlobClient, ClientOptions};
use stowage_core::config::StowageConfig;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Provision containers and move files to and from blob storage")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ~/.stowage/stowage.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Connection descriptor (or set STOWAGE_CONNECTION env var).
    /// Overrides the `connection` entry of the config file.
    #[arg(long, global = true, env = "STOWAGE_CONNECTION", hide_env_values = true)]
    connection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a container if needed and make its blobs publicly readable
    Ensure {
        /// Container name
        container: String,
    },

    /// List every blob in a container
    List {
        /// Container name (default: from config)
        container: Option<String>,
        /// Print items as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Upload a local file
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Target container (default: from config)
        #[arg(long)]
        container: Option<String>,
        /// Blob name (default: the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a blob
    Download {
        /// Blob name
        blob: String,
        /// Source container (default: from config)
        #[arg(long)]
        container: Option<String>,
        /// Write here instead of `<blob stem>_DOWNLOADED.<ext>`
        #[arg(long)]
        to: Option<PathBuf>,
    },

    /// Show current configuration
    Config,
}

/// Settings shared by every command once the CLI and config file are merged.
pub struct Context {
    pub config_path: PathBuf,
    pub config: StowageConfig,
    pub connection: Option<String>,
}

impl Context {
    /// Build a client from the effective connection descriptor.
    pub fn client(&self) -> anyhow::Result<BlobClient> {
        let descriptor = self
            .connection
            .as_deref()
            .or(self.config.stowage.connection.as_deref())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no connection descriptor: pass --connection, set STOWAGE_CONNECTION, or add `connection` to {}",
                    self.config_path.display()
                )
            })?;
        let client =
            BlobClient::connect_with_options(descriptor, ClientOptions::from_config(&self.config))?;
        Ok(client)
    }

    /// Explicit container, falling back to the configured default.
    pub fn container_name(&self, explicit: Option<String>) -> anyhow::Result<String> {
        explicit
            .or_else(|| self.config.stowage.container.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no container given and no default `container` in {}",
                    self.config_path.display()
                )
            })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stowage=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => StowageConfig::default_path(&StowageConfig::default_base_dir()?),
    };
    let ctx = Context {
        config: StowageConfig::load_or_default(&config_path)?,
        config_path,
        connection: cli.connection.clone(),
    };

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Ensure { ref container } => rt.block_on(commands::ensure::run(&ctx, container)),
        Commands::List { container, json } => {
            rt.block_on(commands::list::run(&ctx, container, json))
        }
        Commands::Upload {
            ref file,
            container,
            name,
        } => rt.block_on(commands::upload::run(&ctx, file, container, name)),
        Commands::Download {
            ref blob,
            container,
            ref to,
        } => rt.block_on(commands::download::run(&ctx, blob, container, to.as_deref())),
        Commands::Config => commands::config::run(&ctx),
    }
}
