use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::semantic::{snippet::DEFAULT_MAX_LENGTH, DEFAULT_MODEL};
use crate::storage::write_atomic;

const CONFIG_FILE: &str = "config.yaml";

/// Environment variable overriding the base directory
pub const BASE_PATH_ENV: &str = "PDFSEARCH_BASE_PATH";

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_MAX_K: usize = 10;
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Search behaviour
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Results returned when the caller does not ask for a number
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound for `k` accepted from the web form and API
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Drop hits whose squared L2 distance exceeds this value
    #[serde(default)]
    pub distance_threshold: Option<f32>,

    /// Snippet length in characters
    #[serde(default = "default_snippet_max_length")]
    pub snippet_max_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            top_k: DEFAULT_TOP_K,
            max_k: DEFAULT_MAX_K,
            distance_threshold: None,
            snippet_max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

/// File locations. Relative paths are resolved against the base directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Source PDFs
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// One JSON artifact per extracted PDF
    #[serde(default = "default_extracted_dir")]
    pub extracted_dir: PathBuf,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Downloaded embedding models
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset_dir: default_dataset_dir(),
            extracted_dir: default_extracted_dir(),
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
            model_cache_dir: default_model_cache_dir(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_max_k() -> usize {
    DEFAULT_MAX_K
}

fn default_snippet_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_extracted_dir() -> PathBuf {
    PathBuf::from("data/extracted")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index/vectors.bin")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/index/metadata.json")
}

fn default_model_cache_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    /// Default configuration rooted at `base_path`, without touching disk.
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path,
            ..Default::default()
        }
    }

    /// Resolve the base directory: explicit flag, then environment, then
    /// `~/.local/share/pdfsearch`.
    pub fn resolve_base_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        if let Ok(path) = std::env::var(BASE_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let home = homedir::my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/pdfsearch"))
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if it
    /// does not exist yet.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            let defaults = serde_yml::to_string(&Self::default())?;
            write_atomic(&config_path, defaults.as_bytes())
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            log::info!("Created default config at {}", config_path.display());
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", config_path.display()))?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.base_path.join(CONFIG_FILE), config_str.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let search = &self.search;

        if search.model.trim().is_empty() {
            bail!("search.model must not be empty");
        }

        if search.top_k == 0 {
            bail!("search.top_k must be at least 1");
        }

        if search.max_k < search.top_k {
            bail!(
                "search.max_k ({}) must be greater than or equal to search.top_k ({})",
                search.max_k,
                search.top_k
            );
        }

        if let Some(threshold) = search.distance_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                bail!(
                    "search.distance_threshold must be a non-negative number, got {}",
                    threshold
                );
            }
        }

        if search.snippet_max_length == 0 {
            bail!("search.snippet_max_length must be at least 1");
        }

        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.resolve(&self.paths.dataset_dir)
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.resolve(&self.paths.extracted_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.paths.index_path)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.resolve(&self.paths.metadata_path)
    }

    pub fn model_cache_dir(&self) -> PathBuf {
        self.resolve(&self.paths.model_cache_dir)
    }
}
