use crate::error::MonitorError;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "tracelog-monitor", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long, default_value = "./config.toml")]
    pub config: PathBuf,

    /// Override device service URL
    #[clap(long)]
    pub server_url: Option<String>,

    /// Override report feed path
    #[clap(long)]
    pub report_path: Option<String>,

    /// Start capturing immediately instead of paused
    #[clap(long)]
    pub run: bool,

    /// Override log level (error, warn, info, debug, trace)
    #[clap(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub report_path: String,
    pub start_running: bool,
    pub log_level: String,
    /// Minimum number of rows printed for a view
    pub table_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8888".to_string(),
            report_path: "/webds/report".to_string(),
            start_running: false,
            log_level: "info".to_string(),
            table_rows: 13,
        }
    }
}

impl Config {
    pub fn log_level(&self) -> Result<log::LevelFilter, MonitorError> {
        self.log_level
            .parse()
            .map_err(|_| MonitorError::ConfigError(format!("invalid log level: {}", self.log_level)))
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config: Config = if cli.config.exists() {
        let config_content = fs::read_to_string(&cli.config)
            .with_context(|| format!("Failed to read config file: {:?}", cli.config))?;

        toml::from_str(&config_content).context("Failed to parse config file")?
    } else {
        info!("No config file at {:?}, using defaults", cli.config);
        Config::default()
    };

    // Apply CLI overrides
    if let Some(ref server_url) = cli.server_url {
        config.server_url = server_url.clone();
    }

    if let Some(ref report_path) = cli.report_path {
        config.report_path = report_path.clone();
    }

    if cli.run {
        config.start_running = true;
    }

    if let Some(ref log_level) = cli.log_level {
        config.log_level = log_level.clone();
    }

    if !config.report_path.starts_with('/') {
        return Err(MonitorError::ConfigError(format!(
            "report_path must start with '/': {}",
            config.report_path
        ))
        .into());
    }

    Ok(config)
}
