use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            file: None,
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("ledger")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_commodity")]
    pub commodity: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            commodity: default_commodity(),
            limit: default_limit(),
        }
    }
}

fn default_commodity() -> String {
    "€".to_string()
}

fn default_limit() -> usize {
    10
}

/// Values from the command line or the environment; they win over the file.
#[derive(Default)]
pub struct EnvOverride {
    pub ledger_file: Option<PathBuf>,
    pub ledger_bin: Option<PathBuf>,
}

impl Config {
    pub fn load_config(
        path: Option<impl AsRef<Path>>,
        env_override: EnvOverride,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(config_path) = path {
            let config_file =
                std::fs::read_to_string(config_path).context("Couldn't read config file")?;
            serde_yaml::from_str(&config_file).context("Couldn't parse config file")?
        } else {
            debug!("no config file provided, using default config");
            Config::default()
        };

        config.apply_env_override(env_override);
        Ok(config)
    }

    fn apply_env_override(
        &mut self,
        EnvOverride {
            ledger_file,
            ledger_bin,
        }: EnvOverride,
    ) {
        if ledger_file.is_some() {
            self.ledger.file = ledger_file;
        }
        if let Some(program) = ledger_bin {
            self.ledger.program = program;
        }
    }
}
