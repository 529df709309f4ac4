pub mod bootstrap;
pub mod deploy;

use anyhow::Result;
use std::path::{Path, PathBuf};
use stratus_manifest::{ConfigParser, StratusConfig};

/// Directory holding state files and the local parameter store.
pub const STATE_DIR: &str = ".stratus";

/// Loads the config at `path`, or finds one in the working directory.
pub fn load_config(path: Option<&Path>, stage: Option<&str>) -> Result<StratusConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ConfigParser::find_config(&std::env::current_dir()?)?.0,
    };
    let mut config = ConfigParser::parse_file(&path)?;
    if let Some(stage) = stage {
        config.app.stage = stage.to_string();
    }
    Ok(config)
}

/// `.stratus/` next to the config file in use.
pub fn state_root(config_path: Option<&Path>) -> Result<PathBuf> {
    let base = match config_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    Ok(base.join(STATE_DIR))
}
