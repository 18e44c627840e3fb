// ABOUTME: CLI argument parsing for boxwatch
//
// Flags select the engine transport and override values from the config file.

use crate::config::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

/// Run a container, watch its load until you press q, then clean it up
#[derive(Parser, Debug)]
#[command(name = "boxwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Unix socket that provides the Docker Engine API
    #[arg(long, alias = "unixAddr", value_name = "PATH")]
    pub unix_addr: Option<PathBuf>,

    /// TCP HTTP address of the Docker Engine API
    #[arg(long, alias = "tcpAddr", value_name = "ADDR", conflicts_with = "unix_addr")]
    pub tcp_addr: Option<String>,

    /// Image to run (name[:tag])
    #[arg(long)]
    pub image: Option<String>,

    /// Config file (default: ./.boxwatch/config.toml, then ~/.boxwatch/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print debugging info to the log
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Load the config file and apply flag overrides on top of it.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(path)?,
            None => AppConfig::load()?,
        };
        self.apply(&mut config)?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(path) = &self.unix_addr {
            config.engine.unix_socket = Some(path.clone());
            config.engine.tcp_address = None;
        }
        if let Some(address) = &self.tcp_addr {
            config.engine.tcp_address = Some(address.clone());
            config.engine.unix_socket = None;
        }
        if let Some(image) = &self.image {
            if image.trim().is_empty() {
                bail!("--image must not be empty");
            }
            config.session.image = image.clone();
        }
        if self.debug {
            config.debug = true;
        }
        config.validate()
    }
}
