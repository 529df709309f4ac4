use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use stratus::application::BootstrapProvisioner;
use stratus::infrastructure::{FileParameterStore, MemoryAssetStorage};

use crate::commands::{load_config, state_root};
use crate::ui::{self, Theme};

const DEFAULT_SCOPE: &str = "us-east-1";

#[derive(Parser, Debug, Clone)]
pub struct BootstrapCommand {
    /// Path to stratus.toml (searched for in the working directory by default)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Scope (region) to bootstrap; defaults to the configured AWS region
    #[arg(long)]
    pub region: Option<String>,
}

impl BootstrapCommand {
    pub async fn execute(self) -> Result<()> {
        let scope = match self.region {
            Some(region) => region,
            None => load_config(self.config.as_deref(), None)?
                .app
                .region()
                .unwrap_or(DEFAULT_SCOPE)
                .to_string(),
        };
        let root = state_root(self.config.as_deref())?;

        let provisioner = BootstrapProvisioner::new(
            Arc::new(FileParameterStore::new(root.join("parameters.json"))),
            Arc::new(MemoryAssetStorage::new()),
        );
        let record = provisioner.for_scope(&scope).await?;

        ui::success(format!("Bootstrapped {}", Theme::primary(&scope)));
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }
}
