use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::commands::{load_config, state_root};
use crate::ui::{self, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Diff,
    Deploy,
    Remove,
}

#[derive(Parser, Debug, Clone)]
pub struct DeployCommand {
    /// Path to stratus.toml (searched for in the working directory by default)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Override the stage from the config
    #[arg(long, short)]
    pub stage: Option<String>,

    /// Also list unchanged resources
    #[arg(long)]
    pub all: bool,
}

impl DeployCommand {
    pub async fn execute(self, action: Action) -> Result<()> {
        let config = load_config(self.config.as_deref(), self.stage.as_deref())?;
        let root = state_root(self.config.as_deref())?;

        ui::info(format!(
            "{} {} / {}",
            match action {
                Action::Diff => "Previewing",
                Action::Deploy => "Deploying",
                Action::Remove => "Removing",
            },
            Theme::primary(&config.app.name),
            Theme::primary(&config.app.stage)
        ));

        let outcome = match action {
            Action::Diff => stratus::application::diff(&config, &root).await?,
            Action::Deploy => stratus::application::deploy(&config, &root).await?,
            Action::Remove => stratus::application::remove(&config, &root).await?,
        };

        ui::print_changes(&outcome, self.all);
        match action {
            Action::Diff if outcome.has_changes() => {
                ui::warn("Run `stratus deploy` to apply these changes")
            }
            Action::Diff => ui::success("No changes"),
            _ => ui::success(format!("State saved to {}", root.display())),
        }
        Ok(())
    }
}
