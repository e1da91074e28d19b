//! Optional `config.toml`, the on-disk data layout, and credential lookup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model preselected in the new-chat view (display name or API id).
    pub default_model: Option<String>,
    /// Gem key preselected in the new-chat view.
    pub default_gem: Option<String>,
    /// Whether attachments are copied into the uploads directory on send.
    pub save_uploads: Option<bool>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let proj_dirs = ProjectDirs::from("org", "gemchat", "gemchat")
            .ok_or("Failed to determine config directory")?;
        Self::load_from_path(&proj_dirs.config_dir().join("config.toml"))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Config::default())
        }
    }
}

/// Directories holding the application's persistent state. Created on
/// startup; `--data-dir` relocates the whole tree for tests and scratch use.
pub struct DataDirs {
    pub chats: PathBuf,
    pub gems: PathBuf,
    pub uploads: PathBuf,
}

impl DataDirs {
    pub fn resolve(override_root: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let root = match override_root {
            Some(root) => root.to_path_buf(),
            None => {
                let proj_dirs = ProjectDirs::from("org", "gemchat", "gemchat")
                    .ok_or("Failed to determine data directory")?;
                proj_dirs.data_dir().to_path_buf()
            }
        };
        let dirs = Self {
            chats: root.join("chats"),
            gems: root.join("gems"),
            uploads: root.join("uploads"),
        };
        fs::create_dir_all(&dirs.chats)?;
        fs::create_dir_all(&dirs.gems)?;
        fs::create_dir_all(&dirs.uploads)?;
        Ok(dirs)
    }
}

/// The one required credential. Checked before any terminal setup so the
/// failure message lands on a usable stderr.
pub fn api_key() -> Result<String, Box<dyn std::error::Error>> {
    env::var("GEMINI_API_KEY")
        .or_else(|_| env::var("GOOGLE_API_KEY"))
        .map_err(|_| {
            "Gemini API key not found.\n\n\
             Set your API key before starting:\n\
             export GEMINI_API_KEY=\"your-api-key-here\"\n\
             (GOOGLE_API_KEY is also accepted)"
                .into()
        })
}
