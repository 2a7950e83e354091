//! Configuration primitives for StoryBuilder workspaces.
//!
//! Stored in a machine-readable TOML file located at:
//!   `$STORYBUILDER_HOME/config/config.toml` when the variable is set
//!   `<OS data dir>/StoryBuilder/config/config.toml` otherwise
//!
//! The config tracks the last opened project, the generation provider, and
//! the tuning knobs of the draft history engine (timeline cap, debounce
//! delays, recovery thresholds).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Identifier of the project that was open when the app last shut down.
    pub last_active_project_id: Option<String>,
    /// Generation provider selection and sampling parameters.
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Snapshot timeline bounds and auto-save cadence.
    #[serde(default)]
    pub history: HistorySettings,
    /// Selection-scoped suggestion limits.
    #[serde(default)]
    pub suggestions: SuggestionSettings,
    /// Critique/revise loop thresholds.
    #[serde(default)]
    pub refine: RefineSettings,
    /// Plot editor undo bounds and protection window timing.
    #[serde(default)]
    pub plot: PlotSettings,
}

/// Generation provider preferences. An empty provider id means "not configured".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        !self.provider.trim().is_empty()
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    4000
}

/// Snapshot timeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Maximum entries kept per chapter timeline; the oldest is evicted first.
    #[serde(default = "default_timeline_cap")]
    pub timeline_cap: usize,
    /// Quiet period after the last edit before an auto snapshot is attempted.
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
}

impl HistorySettings {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            timeline_cap: default_timeline_cap(),
            autosave_debounce_ms: default_autosave_debounce_ms(),
        }
    }
}

const fn default_timeline_cap() -> usize {
    30
}

const fn default_autosave_debounce_ms() -> u64 {
    20_000
}

/// Suggestion pipeline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionSettings {
    /// Selections longer than this many characters are truncated before prompting.
    #[serde(default = "default_selection_char_cap")]
    pub selection_char_cap: usize,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            selection_char_cap: default_selection_char_cap(),
        }
    }
}

const fn default_selection_char_cap() -> usize {
    2000
}

/// Self-refine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineSettings {
    /// Draft characters forwarded to the revise phase before the `[truncated]` marker.
    #[serde(default = "default_revise_input_char_cap")]
    pub revise_input_char_cap: usize,
    /// A recovered revision must be strictly longer than this to be accepted.
    #[serde(default = "default_min_revision_chars")]
    pub min_revision_chars: usize,
    /// Improvement log entries retained per chapter.
    #[serde(default = "default_improvement_log_cap")]
    pub improvement_log_cap: usize,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            revise_input_char_cap: default_revise_input_char_cap(),
            min_revision_chars: default_min_revision_chars(),
            improvement_log_cap: default_improvement_log_cap(),
        }
    }
}

const fn default_revise_input_char_cap() -> usize {
    4000
}

const fn default_min_revision_chars() -> usize {
    100
}

const fn default_improvement_log_cap() -> usize {
    20
}

/// Plot editor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotSettings {
    /// Undo states retained by the plot editor.
    #[serde(default = "default_undo_cap")]
    pub undo_cap: usize,
    /// Delay before plot field edits are written back to the project store.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Extra time the structure guard stays armed after the save debounce.
    #[serde(default = "default_protection_buffer_ms")]
    pub protection_buffer_ms: u64,
}

impl PlotSettings {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Length of the structure-change protection window.
    pub fn protection_window(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms + self.protection_buffer_ms)
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            undo_cap: default_undo_cap(),
            save_debounce_ms: default_save_debounce_ms(),
            protection_buffer_ms: default_protection_buffer_ms(),
        }
    }
}

const fn default_undo_cap() -> usize {
    crate::writing::undo::MAX_HISTORY_SIZE
}

const fn default_save_debounce_ms() -> u64 {
    2_000
}

const fn default_protection_buffer_ms() -> u64 {
    1_000
}

/// Standard relative path to the config file (resolved per OS at runtime).
pub const CONFIG_FILE_NAME: &str = "config.toml";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the root directory where StoryBuilder stores data.
///
/// Order of precedence:
/// 1. `STORYBUILDER_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("STORYBUILDER_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("StoryBuilder"))
}

/// Path to the config file beneath a workspace root.
pub fn config_file_path_in(root: &Path) -> PathBuf {
    root.join("config").join(CONFIG_FILE_NAME)
}

/// Path to the config file of the default workspace.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_file_path_in(&workspace_root()?))
}

/// Loads the configuration from `path` or returns defaults when it is missing.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Loads the default workspace configuration or returns defaults.
pub fn load_or_default() -> Result<AppConfig> {
    load_from(&config_file_path()?)
}

/// Persists the configuration to `path`.
pub fn save_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(path, data).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

/// Persists the configuration into the default workspace.
pub fn save(config: &AppConfig) -> Result<()> {
    save_to(&config_file_path()?, config)
}

/// Ensures the workspace structure exists (User/ and AI/ directories) under `root`.
pub fn ensure_workspace_structure_at(root: &Path) -> Result<WorkspacePaths> {
    let user_dir = root.join("User");
    let ai_dir = root.join("AI");
    fs::create_dir_all(&user_dir)
        .with_context(|| format!("Failed to create {}", user_dir.display()))?;
    fs::create_dir_all(&ai_dir).with_context(|| format!("Failed to create {}", ai_dir.display()))?;
    Ok(WorkspacePaths {
        root: root.to_path_buf(),
        user_dir,
        ai_dir,
    })
}

/// Ensures the default workspace structure exists.
pub fn ensure_workspace_structure() -> Result<WorkspacePaths> {
    ensure_workspace_structure_at(&workspace_root()?)
}

/// Convenience struct exposing important workspace paths.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub user_dir: PathBuf,
    pub ai_dir: PathBuf,
}

impl WorkspacePaths {
    /// Directory holding user-facing project files (the manifest).
    pub fn project_user_layer(&self, project_id: &str) -> PathBuf {
        self.user_dir.join(project_id)
    }

    /// Directory holding engine bookkeeping (history timelines, activity log).
    pub fn project_ai_layer(&self, project_id: &str) -> PathBuf {
        self.ai_dir.join(project_id)
    }
}
