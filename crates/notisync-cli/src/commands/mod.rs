//! CLI command definitions and dispatch.

pub mod config;
pub mod notification;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::types::token::SessionToken;
use notisync_source::{NotificationSource, SourceManager};

/// Notisync: notification inbox from the command line
#[derive(Debug, Parser)]
#[command(name = "notisync", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file layered over config/default.toml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Session token; overrides auth.token from configuration
    #[arg(long)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List notifications
    List(notification::ListArgs),
    /// Mark one notification read
    Read {
        /// Notification ID
        id: String,
    },
    /// Mark every notification read
    ReadAll,
    /// Delete a notification
    Delete {
        /// Notification ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Config(args) => config::execute(args, self.config.as_deref(), self.format),
            Commands::List(args) => {
                let (config, source) = self.connect()?;
                notification::list(source.as_ref(), &config, args, self.format).await
            }
            Commands::Read { id } => {
                let (_, source) = self.connect()?;
                notification::mark_read(source.as_ref(), id).await
            }
            Commands::ReadAll => {
                let (_, source) = self.connect()?;
                notification::mark_all_read(source.as_ref()).await
            }
            Commands::Delete { id, yes } => {
                let (_, source) = self.connect()?;
                notification::delete(source.as_ref(), id, *yes).await
            }
        }
    }

    /// Load configuration and build the notification source.
    fn connect(&self) -> Result<(AppConfig, Arc<dyn NotificationSource>), AppError> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(token) = &self.token {
            config.auth.token = token.clone();
        }
        let token = SessionToken::new(config.auth.token.clone());
        let source = SourceManager::new(&config, token)?.source();
        Ok((config, source))
    }
}

/// Helper: load configuration, layering `path` over the defaults
pub fn load_config(path: Option<&str>) -> Result<AppConfig, AppError> {
    AppConfig::load(path)
}
