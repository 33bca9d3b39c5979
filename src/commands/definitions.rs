use super::{banner, ensure_ok, read_file, Action, DeployContext, Outcome};
use crate::client::{CtmClient, FormFile};
use crate::error::Result;
use crate::scan::list_deployable_files;
use std::path::Path;
use tracing::{debug, info};

/// Definition kinds that are uploaded as-is, one multipart request per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Jobs,
    Calendars,
    ConnectionProfiles,
    SiteStandards,
    /// Create-only role upload, used for the initial bulk add.
    NewRoles,
}

impl DefinitionKind {
    pub fn dir(self) -> &'static str {
        match self {
            DefinitionKind::Jobs => "jobs",
            DefinitionKind::Calendars => "calendars",
            DefinitionKind::ConnectionProfiles => "connection-profiles",
            DefinitionKind::SiteStandards => "site-standards",
            DefinitionKind::NewRoles => "roles",
        }
    }

    fn path(self) -> &'static str {
        match self {
            DefinitionKind::NewRoles => "/config/authorization/role",
            _ => "/deploy",
        }
    }

    /// Multipart field name and file name of the uploaded definition.
    /// Calendars keep their source file name; the rest use a fixed one.
    fn part(self, file: &str) -> (&'static str, String) {
        match self {
            DefinitionKind::NewRoles => ("roleFile", "roleFile.json".to_string()),
            DefinitionKind::Calendars => ("definitionsFile", file.to_string()),
            _ => ("definitionsFile", "definitionsFile.json".to_string()),
        }
    }

    fn needs_descriptor(self) -> bool {
        matches!(
            self,
            DefinitionKind::Jobs | DefinitionKind::ConnectionProfiles
        )
    }
}

/// Deploy every `.json` file of `kind`, stopping at the first failure.
pub async fn deploy(kind: DefinitionKind, ctx: &DeployContext<'_>) -> Result<Vec<Outcome>> {
    let folder = ctx.folder(kind.dir());
    let files = list_deployable_files(&folder)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    // One read per run; every file of the batch gets the same descriptor.
    let descriptor = if kind.needs_descriptor() {
        Some(ctx.read_descriptor()?)
    } else {
        None
    };

    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        deploy_file(ctx.client, kind, &folder, &file, descriptor.as_deref()).await?;
        outcomes.push(Outcome::new(file, Action::Deployed));
    }
    info!("Deployed {} {} file(s)", outcomes.len(), kind.dir());
    Ok(outcomes)
}

async fn deploy_file(
    client: &CtmClient,
    kind: DefinitionKind,
    folder: &Path,
    file: &str,
    descriptor: Option<&[u8]>,
) -> Result<()> {
    banner("Deploying", file);

    let (field, filename) = kind.part(file);
    let mut parts = vec![FormFile::new(field, filename, read_file(&folder.join(file))?)];
    if let Some(descriptor) = descriptor {
        parts.push(FormFile::new(
            "deployDescriptorFile",
            "deployDescriptorFile.json",
            descriptor.to_vec(),
        ));
    }

    let resp = client.post_form(kind.path(), parts).await?;
    ensure_ok(&resp, "Deployment", file)?;
    debug!("Successfully deployed file: {}", file);
    Ok(())
}
