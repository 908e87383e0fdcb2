//! Widget Scout - image-based widget recording and replay engine
//!
//! Command-line front end for the engine's configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use widget_scout::app::cli::{parse_overrides, Cli, Commands, ConfigAction};
use widget_scout::app::config::{parse_properties, Config};
use widget_scout::session::KeyMap;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config_path();
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Init { force } => {
            run_init(force, &config, &config_path)?;
        }
        Commands::Config { action } => {
            run_config(action, &config, &config_path)?;
        }
        Commands::Check {
            properties,
            overrides,
        } => {
            run_check(config, properties.as_deref(), &overrides)?;
        }
    }

    Ok(())
}

fn run_init(force: bool, config: &Config, config_path: &PathBuf) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    std::fs::create_dir_all(&config.capture.template_dir)?;
    println!("\nTemplate directory: {:?}", config.capture.template_dir);

    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, config_path: &PathBuf) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => match config.get_value(&key)? {
            Some(value) => println!("{} = {}", key, value),
            None => anyhow::bail!("Configuration key '{}' not found", key),
        },
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'widget-scout init' first.");
            }

            let mut updated = Config::load(config_path)?;
            updated.set_value(&key, &value)?;
            updated.save(config_path)?;
            info!(%key, %value, "Configuration updated");
            println!("Set {} = {}", key, value);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save(config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}

fn run_check(mut config: Config, properties: Option<&Path>, overrides: &[String]) -> anyhow::Result<()> {
    let mut settings = HashMap::new();

    if let Some(path) = properties {
        let content = std::fs::read_to_string(path)?;
        let parsed = parse_properties(&content);
        info!(path = %path.display(), entries = parsed.len(), "Loaded properties");
        settings.extend(parsed);
    }
    settings.extend(parse_overrides(overrides)?);

    config.apply_properties(&settings);
    if let Err(e) = config.validate() {
        warn!(error = %e, "Effective configuration is invalid");
        anyhow::bail!("Invalid configuration: {}", e);
    }

    println!("Effective configuration:\n\n{}", config.to_toml()?);

    let keymap = KeyMap::new(&config.keybindings);
    println!("Control-key commands:");
    for (name, key) in config.keybindings.entries() {
        let command = keymap.command_for(widget_scout::session::Key::Char(key));
        println!("  Ctrl+{}  {:<15} {:?}", key, name, command);
    }

    Ok(())
}
