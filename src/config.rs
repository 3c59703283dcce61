//! Archive, classification and cleanup configuration.
//!
//! Settings are read from TOML. Every section and key is optional; anything
//! left out falls back to the defaults shown here:
//!
//! ```toml
//! [archive]
//! extension = "cbz"
//!
//! [classify]
//! image_token = "image"
//!
//! [cleanup]
//! sentinel_filenames = [".DS_Store", "Thumbs.db", "desktop.ini"]
//! sentinel_patterns = []
//! prune_empty_dirs = true
//! ```

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// The archive extension is empty or would escape the parent directory.
    InvalidExtension(String),
    /// The image token is blank, which would classify every file as an image.
    InvalidImageToken(String),
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid sentinel pattern '{}'", pattern)
            }
            ConfigError::InvalidExtension(ext) => {
                write!(
                    f,
                    "Invalid archive extension '{}': must be non-empty and contain no path separators",
                    ext
                )
            }
            ConfigError::InvalidImageToken(token) => {
                write!(f, "Invalid image token '{}': must not be blank", token)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default)]
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub classify: ClassifySettings,
    #[serde(default)]
    pub cleanup: CleanupSettings,
}

/// Settings for the produced archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// File extension of the archive, without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

fn default_extension() -> String {
    "cbz".to_string()
}

/// Settings for content classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifySettings {
    /// Token searched (case-insensitively) in the sniffed type description.
    #[serde(default = "default_image_token")]
    pub image_token: String,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            image_token: default_image_token(),
        }
    }
}

fn default_image_token() -> String {
    "image".to_string()
}

/// Settings for the post-packaging cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Exact file names of OS-generated files to delete (e.g. ".DS_Store").
    #[serde(default = "default_sentinel_filenames")]
    pub sentinel_filenames: Vec<String>,

    /// Glob patterns matched against file names (e.g. "._*").
    #[serde(default)]
    pub sentinel_patterns: Vec<String>,

    /// Whether directories left empty are removed.
    #[serde(default = "default_prune_empty_dirs")]
    pub prune_empty_dirs: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            sentinel_filenames: default_sentinel_filenames(),
            sentinel_patterns: Vec::new(),
            prune_empty_dirs: default_prune_empty_dirs(),
        }
    }
}

fn default_sentinel_filenames() -> Vec<String> {
    vec![
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),
        "desktop.ini".to_string(),
    ]
}

fn default_prune_empty_dirs() -> bool {
    true
}

impl PackConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.makecbzrc.toml` in the current directory
    /// 3. Look for `~/.config/make-cbz/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".makecbzrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("make-cbz")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validate and pre-compile the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unusable, the image token is blank,
    /// or a sentinel glob is invalid.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        CompiledConfig::new(self)
    }
}

/// Validated configuration with sentinel globs parsed once up front.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    extension: String,
    image_token: String,
    sentinel_filenames: HashSet<String>,
    sentinel_patterns: Vec<Pattern>,
    prune_empty_dirs: bool,
}

impl CompiledConfig {
    fn new(config: PackConfig) -> Result<Self, ConfigError> {
        let extension = config
            .archive
            .extension
            .trim_start_matches('.')
            .to_string();
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(ConfigError::InvalidExtension(config.archive.extension));
        }
        if config.classify.image_token.trim().is_empty() {
            return Err(ConfigError::InvalidImageToken(config.classify.image_token));
        }

        let sentinel_patterns = config
            .cleanup
            .sentinel_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            extension,
            image_token: config.classify.image_token,
            sentinel_filenames: config.cleanup.sentinel_filenames.into_iter().collect(),
            sentinel_patterns,
            prune_empty_dirs: config.cleanup.prune_empty_dirs,
        })
    }

    /// File name of the archive built for a directory called `dir_name`.
    pub fn archive_file_name(&self, dir_name: &str) -> String {
        format!("{}.{}", dir_name, self.extension)
    }

    pub fn image_token(&self) -> &str {
        &self.image_token
    }

    pub fn prune_empty_dirs(&self) -> bool {
        self.prune_empty_dirs
    }

    /// Whether a file with this name is an OS-generated sentinel.
    pub fn is_sentinel(&self, file_name: &str) -> bool {
        self.sentinel_filenames.contains(file_name)
            || self
                .sentinel_patterns
                .iter()
                .any(|pattern| pattern.matches(file_name))
    }
}

impl Default for CompiledConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            image_token: default_image_token(),
            sentinel_filenames: default_sentinel_filenames().into_iter().collect(),
            sentinel_patterns: Vec::new(),
            prune_empty_dirs: default_prune_empty_dirs(),
        }
    }
}
