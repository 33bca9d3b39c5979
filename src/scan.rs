use crate::error::{DeployError, Result};
use std::path::Path;
use tracing::info;

/// Names of the `.json` files directly inside `folder`, in whatever order the
/// filesystem yields them. A missing folder is not an error: it just means
/// there is nothing to deploy.
pub fn list_deployable_files(folder: &Path) -> Result<Vec<String>> {
    if !folder.is_dir() {
        info!(
            "Folder does not exist: {}. No files to deploy.",
            folder.display()
        );
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(folder).map_err(|e| DeployError::fs(folder, e))?;
    let mut total = 0usize;
    let mut files = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| DeployError::fs(folder, e))?;
        total += 1;

        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(".json") {
            continue;
        }
        if entry.path().is_file() {
            files.push(name);
        }
    }

    info!("Found {} files in {}", total, folder.display());
    if files.is_empty() {
        info!("No JSON files found in {}", folder.display());
    }
    Ok(files)
}
