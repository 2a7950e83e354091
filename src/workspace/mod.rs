mod config;

pub use config::{
    config_file_path, config_file_path_in, ensure_workspace_structure,
    ensure_workspace_structure_at, load_from, load_or_default, save, save_to, workspace_root,
    AppConfig, HistorySettings, PlotSettings, ProviderSettings, RefineSettings,
    SuggestionSettings, WorkspacePaths, CONFIG_FILE_NAME,
};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Configuration plus resolved filesystem locations for one installation.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: AppConfig,
    pub paths: WorkspacePaths,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Opens the default workspace (`STORYBUILDER_HOME` or the OS data dir).
    pub fn new() -> Result<Self> {
        Self::at(workspace_root()?)
    }

    /// Opens (and creates if needed) a workspace rooted at `root`.
    pub fn at<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = ensure_workspace_structure_at(root.as_ref())?;
        let config_path = config_file_path_in(root.as_ref());
        let config = load_from(&config_path)?;
        Ok(Self {
            config,
            paths,
            config_path,
        })
    }

    pub fn save_config(&self) -> Result<()> {
        save_to(&self.config_path, &self.config)
    }
}
