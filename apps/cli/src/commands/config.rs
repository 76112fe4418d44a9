//! 配置管理命令

use anyhow::{Result, bail};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::config::{CliConfig, resolve_path};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效配置
    Show {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 写出默认配置文件
    Init {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },

    /// 校验配置文件
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { config } => {
                let path = resolve_path(config.as_deref())?;
                let loaded = CliConfig::load(&path)?;
                println!("# {}", path.display());
                print!("{}", loaded.to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Init { config, force } => {
                let path = resolve_path(config.as_deref())?;
                init(&path, force)?;
                println!("Wrote default config to {}", path.display());
                Ok(())
            },
            ConfigCommand::Check { config } => {
                let path = resolve_path(config.as_deref())?;
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                CliConfig::load(&path)?;
                println!("{}: OK", path.display());
                Ok(())
            },
        }
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    CliConfig::default().save(path)
}
