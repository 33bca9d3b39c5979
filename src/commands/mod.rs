pub mod config_cmd;
pub mod definitions;
pub mod resources;
pub mod roles;
pub mod secrets;
pub mod transform;
pub mod upsert;

use crate::client::{ApiResponse, CtmClient};
use crate::error::{DeployError, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DESCRIPTORS_DIR: &str = "deploy-descriptors";

/// What happened to one deployed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Deployed,
    Updated,
    Created,
    Recreated,
    Transformed,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub target: String,
    pub action: Action,
}

impl Outcome {
    pub fn new(target: impl Into<String>, action: Action) -> Self {
        Self {
            target: target.into(),
            action,
        }
    }
}

/// Inputs shared by every command that works on the dist folder.
pub struct DeployContext<'a> {
    pub client: &'a CtmClient,
    pub dist_folder: &'a Path,
    pub deploy_descriptor: Option<&'a str>,
}

impl DeployContext<'_> {
    pub fn folder(&self, kind_dir: &str) -> PathBuf {
        self.dist_folder.join(kind_dir)
    }

    /// Read `{dist}/deploy-descriptors/{name}`. Missing name or file is fatal.
    pub fn read_descriptor(&self) -> Result<Vec<u8>> {
        let name = self.deploy_descriptor.ok_or_else(|| {
            DeployError::MissingInput(
                "deploy descriptor required. Set via --deploy-descriptor or CTM_DEPLOY_DESCRIPTOR"
                    .into(),
            )
        })?;
        let path = self.dist_folder.join(DESCRIPTORS_DIR).join(name);
        debug!("Reading deploy descriptor {}", path.display());
        read_file(&path)
    }
}

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| DeployError::fs(path, e))
}

pub fn read_json(path: &Path) -> Result<Value> {
    let data = read_file(path)?;
    serde_json::from_slice(&data).map_err(|source| DeployError::MalformedJson {
        path: path.to_path_buf(),
        source,
    })
}

pub fn ensure_ok(resp: &ApiResponse, action: &'static str, target: &str) -> Result<()> {
    if resp.is_ok() {
        Ok(())
    } else {
        Err(DeployError::status(action, target, resp.status))
    }
}

pub fn banner(verb: &str, file: &str) {
    let rule = "=".repeat(72);
    debug!("\n{rule}\n {verb} {file}\n{rule}");
}

/// Parse a JSON input: inline JSON string, "-" for stdin, or @filename.
pub fn parse_data(data: &str) -> Result<Value> {
    match data {
        "-" => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| DeployError::InvalidInput(format!("Failed to read stdin: {e}")))?;
            serde_json::from_str(&buf)
                .map_err(|e| DeployError::InvalidInput(format!("Invalid JSON from stdin: {e}")))
        }
        s if s.starts_with('@') => {
            let path = &s[1..];
            let content = std::fs::read_to_string(path)
                .map_err(|e| DeployError::InvalidInput(format!("Failed to read file {path}: {e}")))?;
            serde_json::from_str(&content)
                .map_err(|e| DeployError::InvalidInput(format!("Invalid JSON in {path}: {e}")))
        }
        s => serde_json::from_str(s)
            .map_err(|e| DeployError::InvalidInput(format!("Invalid JSON: {e}"))),
    }
}
