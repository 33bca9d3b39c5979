use super::{banner, ensure_ok, read_json, Action, DeployContext, Outcome};
use crate::client::{ApiPath, CtmClient};
use crate::error::{DeployError, Result};
use crate::scan::list_deployable_files;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

const RESOURCES_DIR: &str = "resources";
const RESOURCE_PATH: &str = "/run/resource";

/// Identity of a run-time resource: a name scoped by its controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceKey {
    pub ctm: String,
    pub name: String,
}

/// Replace every resource in `{dist}/resources`: delete it when the API
/// already has it, then create it from the file.
pub async fn deploy(ctx: &DeployContext<'_>) -> Result<Vec<Outcome>> {
    let folder = ctx.folder(RESOURCES_DIR);
    let mut outcomes = Vec::new();

    for file in list_deployable_files(&folder)? {
        let action = deploy_resource(ctx.client, &folder, &file).await?;
        outcomes.push(Outcome::new(file, action));
    }
    Ok(outcomes)
}

async fn deploy_resource(client: &CtmClient, folder: &Path, file: &str) -> Result<Action> {
    banner("Deploying", file);

    let path = folder.join(file);
    let definition = read_json(&path)?;
    let key = resource_key(&path, &definition)?;

    let existing: Vec<ResourceKey> = client.get_json("/run/resources").await?;
    let present = existing.contains(&key);

    if present {
        info!("Resource {} exists on {}, deleting it first", key.name, key.ctm);
        let resp = client
            .delete(ApiPath::new(RESOURCE_PATH).name(&key.ctm).name(&key.name))
            .await?;
        ensure_ok(&resp, "Delete resource", &key.name)?;
    }

    let resp = client
        .post_json(ApiPath::new(RESOURCE_PATH).name(&key.ctm), &definition)
        .await?;
    ensure_ok(&resp, "Deployment", file)?;

    Ok(if present {
        Action::Recreated
    } else {
        Action::Created
    })
}

fn resource_key(path: &Path, definition: &Value) -> Result<ResourceKey> {
    ResourceKey::deserialize(definition).map_err(|e| {
        DeployError::InvalidInput(format!(
            "{} must carry string \"ctm\" and \"name\" fields: {e}",
            path.display()
        ))
    })
}
