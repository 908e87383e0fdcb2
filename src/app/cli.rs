//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Widget Scout - image-based widget recording and replay engine
#[derive(Parser, Debug)]
#[command(name = "widget-scout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration and the template directory
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Overlay key/value settings and print the effective configuration
    Check {
        /// Properties file with key=value lines
        #[arg(short, long)]
        properties: Option<PathBuf>,

        /// Individual key=value overrides, applied after the file
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "recognition.min_match_percent")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "timing.retry_settle_ms")
        key: String,

        /// Value to set
        value: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Config path chosen on the command line, or the default one
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(super::config::Config::default_path)
    }
}

/// Split `key=value` overrides given on the command line
pub fn parse_overrides(overrides: &[String]) -> Result<Vec<(String, String)>, crate::Error> {
    overrides
        .iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| crate::Error::Config(format!("expected KEY=VALUE, got {item:?}")))
        })
        .collect()
}
