//! Node configuration (C9, ambient): loads `SelectorConfig`/`NodeConfig`
//! from a TOML file, environment overrides, and CLI flags, with the same
//! three-tier precedence (CLI > env > file > built-in default) this
//! codebase's other config surfaces use.

use crate::mining::{SelectorConfig, TemplateConfig};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("excessive_block_size must be greater than 2000, got {0}")]
    ExcessiveBlockSizeTooSmall(usize),
    #[error("block_min_fee_rate must fit in a u64 per-kilobyte rate")]
    InvalidFeeRate,
}

/// Template-assembly options, the configuration surface named in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorOptions {
    pub excessive_block_size: usize,
    pub max_generated_block_size: Option<usize>,
    pub block_min_fee_rate: u64,
    pub enable_miner_fund: bool,
    /// Dev-network only; rejected by `validate()` outside dev mode.
    pub block_version: Option<u32>,
    pub print_priority: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            excessive_block_size: 32_000_000,
            max_generated_block_size: None,
            block_min_fee_rate: 1000,
            enable_miner_fund: false,
            block_version: None,
            print_priority: false,
        }
    }
}

impl SelectorOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.excessive_block_size <= 2000 {
            return Err(ConfigError::ExcessiveBlockSizeTooSmall(self.excessive_block_size));
        }
        Ok(())
    }

    pub fn to_template_config(&self) -> TemplateConfig {
        TemplateConfig {
            excessive_block_size: self.excessive_block_size,
            max_generated_block_size_override: self.max_generated_block_size,
            selector: SelectorConfig {
                block_min_fee_rate: self.block_min_fee_rate,
                print_priority: self.print_priority,
            },
            enable_miner_fund: self.enable_miner_fund,
            block_version_override: self.block_version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub selector: SelectorOptions,
    pub dev_mode: bool,
    pub log_filter: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            selector: SelectorOptions::default(),
            dev_mode: false,
            log_filter: "info".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selector.validate()?;
        if self.selector.block_version.is_some() && !self.dev_mode {
            tracing::warn!("block_version override is only honored in dev_mode");
        }
        Ok(())
    }

    /// Builds the `TemplateConfig` the assembler runs against. The header
    /// version override is dropped outside `dev_mode` rather than merely
    /// warned about — it must not reach the assembler at all.
    pub fn to_template_config(&self) -> TemplateConfig {
        let mut template = self.selector.to_template_config();
        if !self.dev_mode {
            template.block_version_override = None;
        }
        template
    }
}

/// CLI flags overlaying the file/environment-loaded configuration.
#[derive(Debug, Parser)]
#[command(name = "emberchaind", about = "Block template assembler node")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<String>,
    #[arg(long)]
    pub excessive_block_size: Option<usize>,
    #[arg(long)]
    pub block_min_fee_rate: Option<u64>,
    #[arg(long)]
    pub enable_miner_fund: bool,
    #[arg(long)]
    pub print_priority: bool,
    #[arg(long)]
    pub dev_mode: bool,
}

/// Loads configuration with precedence CLI > env (`NODE__*`) > file > default.
pub fn load(cli: &Cli) -> Result<NodeConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .set_default("selector.excessive_block_size", 32_000_000i64)?
        .set_default("selector.block_min_fee_rate", 1000i64)?
        .set_default("selector.enable_miner_fund", false)?
        .set_default("selector.print_priority", false)?
        .set_default("dev_mode", false)?
        .set_default("log_filter", "info")?;

    if let Some(path) = &cli.config {
        // An explicit `--config` path is taken literally (format inferred
        // from its extension), unlike the name-based search below.
        builder = builder.add_source(config::File::from(std::path::PathBuf::from(path)).required(false));
    } else {
        builder = builder
            .add_source(config::File::with_name("emberchain").required(false))
            .add_source(config::File::with_name("/etc/emberchain/config").required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("NODE").separator("__"));

    let mut node_config: NodeConfig = builder.build()?.try_deserialize()?;

    if let Some(v) = cli.excessive_block_size {
        node_config.selector.excessive_block_size = v;
    }
    if let Some(v) = cli.block_min_fee_rate {
        node_config.selector.block_min_fee_rate = v;
    }
    if cli.enable_miner_fund {
        node_config.selector.enable_miner_fund = true;
    }
    if cli.print_priority {
        node_config.selector.print_priority = true;
    }
    if cli.dev_mode {
        node_config.dev_mode = true;
    }

    node_config.validate()?;
    Ok(node_config)
}
