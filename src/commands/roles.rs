use super::upsert::{update_or_create, Existence, UpsertOutcome};
use super::{banner, read_file, Action, DeployContext, Outcome};
use crate::client::{ApiPath, CtmClient, FormFile};
use crate::error::{DeployError, Result};
use crate::scan::list_deployable_files;
use std::path::Path;
use tracing::info;

const ROLES_DIR: &str = "roles";
const ROLE_PATH: &str = "/config/authorization/role";

/// Update every role in `{dist}/roles`, creating the ones the API does not
/// know yet.
pub async fn deploy(ctx: &DeployContext<'_>) -> Result<Vec<Outcome>> {
    let folder = ctx.folder(ROLES_DIR);
    let mut outcomes = Vec::new();

    for file in list_deployable_files(&folder)? {
        let action = deploy_role(ctx.client, &folder, &file).await?;
        outcomes.push(Outcome::new(file, action));
    }
    Ok(outcomes)
}

async fn deploy_role(client: &CtmClient, folder: &Path, file: &str) -> Result<Action> {
    banner("Deploying", file);

    let path = folder.join(file);
    let data = read_file(&path)?;
    let name = role_name(&path, &data)?;
    info!("Trying to update if role: {} exists", name);

    let update_path = ApiPath::new(ROLE_PATH).name(&name);
    let (update_data, create_data) = (data.clone(), data);
    let outcome = update_or_create(
        &name,
        Existence::Probe,
        || client.post_form(update_path, vec![role_part(update_data)]),
        || client.post_form(ROLE_PATH, vec![role_part(create_data)]),
    )
    .await?;

    Ok(match outcome {
        UpsertOutcome::Updated => Action::Updated,
        UpsertOutcome::Created => Action::Created,
    })
}

fn role_part(data: Vec<u8>) -> FormFile {
    FormFile::new("roleFile", "roleFile.json", data)
}

fn role_name(path: &Path, data: &[u8]) -> Result<String> {
    let json: serde_json::Value =
        serde_json::from_slice(data).map_err(|source| DeployError::MalformedJson {
            path: path.to_path_buf(),
            source,
        })?;
    json.get("Name")
        .and_then(|n| n.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::InvalidInput(format!("{} has no string \"Name\" field", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{client, dist};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_role_name() {
        let p = Path::new("roles/r.json");
        assert_eq!(role_name(p, br#"{"Name": "ops-admins"}"#).unwrap(), "ops-admins");
        assert!(matches!(
            role_name(p, br#"{"name": "lowercase"}"#),
            Err(DeployError::InvalidInput(_))
        ));
        assert!(matches!(
            role_name(p, b"not json"),
            Err(DeployError::MalformedJson { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_role_created_after_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role/ops"))
            .respond_with(ResponseTemplate::new(400).set_body_string("role not found"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role"))
            .and(body_string_contains("name=\"roleFile\""))
            .and(body_string_contains("\"Name\": \"ops\""))
            .respond_with(ResponseTemplate::new(200).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let dist = dist(&[("roles/ops.json", r#"{"Name": "ops"}"#)]);
        let ctx = DeployContext {
            client: &client,
            dist_folder: dist.path(),
            deploy_descriptor: None,
        };

        let outcomes = deploy(&ctx).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].action, Action::Created);
    }

    #[tokio::test]
    async fn test_existing_role_updated_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role/ops"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let dist = dist(&[("roles/ops.json", r#"{"Name": "ops"}"#)]);
        let ctx = DeployContext {
            client: &client,
            dist_folder: dist.path(),
            deploy_descriptor: None,
        };

        let outcomes = deploy(&ctx).await.unwrap();
        assert_eq!(outcomes[0].action, Action::Updated);
    }

    #[tokio::test]
    async fn test_role_name_is_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role/Ops%2FAdmins"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let dist = dist(&[("roles/ops.json", r#"{"Name": "Ops/Admins"}"#)]);
        let ctx = DeployContext {
            client: &client,
            dist_folder: dist.path(),
            deploy_descriptor: None,
        };

        let outcomes = deploy(&ctx).await.unwrap();
        assert_eq!(outcomes[0].action, Action::Updated);
    }

    #[tokio::test]
    async fn test_update_server_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role/ops"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/authorization/role"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let dist = dist(&[("roles/ops.json", r#"{"Name": "ops"}"#)]);
        let ctx = DeployContext {
            client: &client,
            dist_folder: dist.path(),
            deploy_descriptor: None,
        };

        assert!(deploy(&ctx).await.is_err());
    }
}
