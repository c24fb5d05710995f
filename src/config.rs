use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub limits: LimitsConfig,
    pub engines: EnginesConfig,
}

/// Default locations used when a tool is called without a path. All of
/// them are created on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub default_folder: PathBuf,
    pub documents_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub photos_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = paths::home_dir();
        Self {
            default_folder: home.join("NewFolder_Jarvis"),
            documents_dir: dirs::document_dir().unwrap_or_else(|| home.join("Documents")),
            videos_dir: dirs::video_dir().unwrap_or_else(|| home.join("Videos")),
            photos_dir: dirs::picture_dir()
                .unwrap_or_else(|| home.join("Pictures"))
                .join("JarvisPhotos"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub command_timeout_seconds: u64,
    pub capture_timeout_seconds: u64,
    pub speech_timeout_seconds: u64,
    /// Upper bound on characters of extracted text returned to the runtime.
    pub preview_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: 15,
            capture_timeout_seconds: 30,
            speech_timeout_seconds: 60,
            preview_chars: 1500,
        }
    }
}

impl LimitsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_seconds)
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_seconds)
    }
}

/// Explicit engine locations. Unset engines are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub tesseract: Option<PathBuf>,
    pub pdftotext: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

impl Config {
    /// Loads `explicit` if given, else `./config.toml`, else the copy in the
    /// data directory, else defaults. Environment overrides apply last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
            return Ok(Some(path.to_path_buf()));
        }

        let local = std::env::current_dir()?.join("config.toml");
        if local.exists() {
            return Ok(Some(local));
        }

        let shared = paths::get_jarvis_data_dir()?.join("config.toml");
        Ok(shared.exists().then_some(shared))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("JARVIS_TESSERACT") {
            self.engines.tesseract = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("JARVIS_PDFTOTEXT") {
            self.engines.pdftotext = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("JARVIS_FFMPEG") {
            self.engines.ffmpeg = Some(PathBuf::from(path));
        }
        if let Some(chars) = std::env::var("JARVIS_PREVIEW_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.limits.preview_chars = chars;
        }
    }
}
