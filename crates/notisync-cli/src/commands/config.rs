//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use notisync_core::config::AppConfig;
use notisync_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration, token masked
    Show,
    /// Validate configuration
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = masked(super::load_config(config_path)?);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                output::print_success("Configuration is valid");
                output::print_kv("Source", &config.source.provider);
                output::print_kv("API", &config.api.base_url);
                output::print_kv("Channel", &config.api.ws_url);
                output::print_kv("Transport", &config.realtime.transport);
                output::print_kv(
                    "Polling",
                    &if config.polling.enabled {
                        format!("every {}s", config.polling.interval_seconds)
                    } else {
                        "disabled".to_string()
                    },
                );
                output::print_kv("Token", mask_token(&config.auth.token));
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

fn masked(mut config: AppConfig) -> AppConfig {
    config.auth.token = mask_token(&config.auth.token).to_string();
    config
}

/// Mask a token for display
fn mask_token(token: &str) -> &'static str {
    if token.trim().is_empty() {
        "(not set)"
    } else {
        "****"
    }
}
