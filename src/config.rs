use crate::app_dirs::AppDirs;
use crate::collaborator::CommandSpec;
use crate::storage::BackendKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sample_size: usize,
    pub num_phrases: usize,
    pub num_sentences: usize,
    pub new_char_threshold: f64,
    pub max_line_chars: usize,
    pub min_line_chars: usize,
    pub smoothing: f64,
    pub store_path: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub generator: Option<CommandSpec>,
    pub recognizer: Option<CommandSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_size: 50,
            num_phrases: 30,
            num_sentences: 10,
            new_char_threshold: 0.2,
            max_line_chars: 10,
            min_line_chars: 5,
            smoothing: 5.0,
            store_path: None,
            backend: None,
            generator: None,
            recognizer: None,
        }
    }
}

impl Config {
    /// Configured table path, or the per-user default
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .or_else(AppDirs::store_path)
            .unwrap_or_else(|| PathBuf::from("shizi_characters.csv"))
    }

    /// Configured backend, or one inferred from the table path
    pub fn resolved_backend(&self, path: &Path) -> BackendKind {
        self.backend.unwrap_or_else(|| BackendKind::from_path(path))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("shizi_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring malformed config: {e}");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
