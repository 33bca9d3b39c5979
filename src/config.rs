use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings persisted in `~/.ctm-deploy/config.json`. Every field can also
/// come from a flag or environment variable, which take priority.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub dist_folder: Option<String>,
    #[serde(default)]
    pub deploy_descriptor: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ctm-deploy")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    pub fn load_file() -> Config {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Config::default()
        }
    }

    pub fn save_file(&self) -> Result<()> {
        let dir = Self::config_dir();
        std::fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::config_path(), content)?;
        Ok(())
    }

    /// Layer `self` (flags and env, already merged by clap) over `file`.
    /// Blank values count as unset: CI runners export empty variables for
    /// inputs nobody filled in.
    pub fn resolve(self, file: Config) -> ResolvedConfig {
        let pick = |flag: Option<String>, file: Option<String>| {
            non_blank(flag).or_else(|| non_blank(file))
        };
        ResolvedConfig {
            endpoint: pick(self.endpoint, file.endpoint),
            api_token: pick(self.api_token, file.api_token),
            dist_folder: pick(self.dist_folder, file.dist_folder).map(PathBuf::from),
            deploy_descriptor: pick(self.deploy_descriptor, file.deploy_descriptor),
            format: pick(self.format, file.format).unwrap_or_else(|| "table".to_string()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub dist_folder: Option<PathBuf>,
    pub deploy_descriptor: Option<String>,
    pub format: String,
}

impl ResolvedConfig {
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            DeployError::MissingInput(
                "endpoint required. Set via --endpoint, CTM_ENDPOINT, or `ctm-deploy config set endpoint <url>`".into(),
            )
        })
    }

    pub fn require_token(&self) -> Result<&str> {
        self.api_token.as_deref().ok_or_else(|| {
            DeployError::MissingInput(
                "api token required. Set via --api-token or CTM_API_TOKEN".into(),
            )
        })
    }

    pub fn require_dist_folder(&self) -> Result<PathBuf> {
        self.dist_folder.clone().ok_or_else(|| {
            DeployError::MissingInput(
                "dist folder required. Set via --dist-folder or CTM_DIST_FOLDER".into(),
            )
        })
    }
}
