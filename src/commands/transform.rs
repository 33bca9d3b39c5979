use super::{banner, ensure_ok, read_file, Action, DeployContext, Outcome, DESCRIPTORS_DIR};
use crate::client::{CtmClient, FormFile};
use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TRANSFORM_PATH: &str = "/deploy/transform";

/// Directories the transform walk never descends into.
const SKIPPED_DIRS: [&str; 3] = [DESCRIPTORS_DIR, "resources", "roles"];

/// `{dist}_transformed`, next to the dist folder.
pub fn output_root(dist: &Path) -> PathBuf {
    let normalized: PathBuf = dist.components().collect();
    let mut name = normalized.into_os_string();
    name.push("_transformed");
    PathBuf::from(name)
}

/// Run every definition in the dist tree through the API transform and
/// mirror the results under [`output_root`]. Returns the output root.
pub async fn transform(ctx: &DeployContext<'_>) -> Result<(PathBuf, Vec<Outcome>)> {
    let root = ctx.dist_folder;
    let out = output_root(root);

    if !root.is_dir() {
        info!("Folder does not exist: {}. No files to transform.", root.display());
        return Ok((out, Vec::new()));
    }

    let mut files = Vec::new();
    collect_definitions(root, &mut files)?;
    info!("Found {} definition files under {}", files.len(), root.display());

    // Inputs are checked before anything is written.
    let descriptor = if files.is_empty() {
        Vec::new()
    } else {
        ctx.read_descriptor()?
    };
    std::fs::create_dir_all(&out).map_err(|e| DeployError::fs(&out, e))?;

    let mut outcomes = Vec::with_capacity(files.len());
    for path in files {
        let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        transform_file(ctx.client, &path, &out.join(&rel), &descriptor).await?;
        outcomes.push(Outcome::new(rel.display().to_string(), Action::Transformed));
    }

    copy_descriptors(root, &out)?;
    info!(
        "Transformation completed. Transformed files are saved in {}",
        out.display()
    );
    Ok((out, outcomes))
}

fn collect_definitions(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DeployError::fs(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DeployError::fs(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            if !SKIPPED_DIRS.iter().any(|skipped| *skipped == name) {
                collect_definitions(&path, files)?;
            }
        } else if path.is_file() && name.ends_with(".json") {
            files.push(path);
        }
    }
    Ok(())
}

async fn transform_file(
    client: &CtmClient,
    source: &Path,
    target: &Path,
    descriptor: &[u8],
) -> Result<()> {
    let display = source.display().to_string();
    banner("Transforming", &display);

    let parts = vec![
        FormFile::new("definitionsFile", "definitionsFile.json", read_file(source)?),
        FormFile::new(
            "deployDescriptorFile",
            "deployDescriptorFile.json",
            descriptor.to_vec(),
        ),
    ];
    let resp = client.post_form(TRANSFORM_PATH, parts).await?;
    ensure_ok(&resp, "Transformation", &display)?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeployError::fs(parent, e))?;
    }
    std::fs::write(target, resp.body).map_err(|e| DeployError::fs(target, e))?;
    Ok(())
}

/// The descriptors are consumed by later deploy steps, so they travel with
/// the transformed tree unchanged.
fn copy_descriptors(root: &Path, out: &Path) -> Result<()> {
    let source = root.join(DESCRIPTORS_DIR);
    if !source.is_dir() {
        warn!("No {} folder in {}, nothing to copy", DESCRIPTORS_DIR, root.display());
        return Ok(());
    }
    copy_tree(&source, &out.join(DESCRIPTORS_DIR))
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target).map_err(|e| DeployError::fs(target, e))?;
    let entries = std::fs::read_dir(source).map_err(|e| DeployError::fs(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DeployError::fs(source, e))?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else if from.is_file() {
            std::fs::copy(&from, &to).map_err(|e| DeployError::fs(&from, e))?;
        }
    }
    Ok(())
}
