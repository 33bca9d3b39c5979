use super::upsert::{update_or_create, Existence, ExistenceCheck, UpsertOutcome};
use super::{Action, Outcome};
use crate::client::{ApiPath, CtmClient};
use crate::error::{DeployError, Result};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

const SHARED_PREFIX: &str = "CTM_";
const SECRET_PATH: &str = "/config/secret";

/// Which secret keys a run may touch: the shared `CTM_` namespace and the
/// keys owned by the invoking user (first three characters of the user
/// identifier, upper-cased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFilter {
    user_prefix: Option<String>,
}

impl SecretFilter {
    pub fn new(user: Option<&str>) -> Self {
        let user_prefix = user
            .map(|u| u.trim().chars().take(3).collect::<String>().to_uppercase())
            .filter(|p| !p.is_empty());
        Self { user_prefix }
    }

    fn owned_by_user(&self, key: &str) -> bool {
        self.user_prefix
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix))
    }

    /// Keys a deployment may create or update.
    pub fn allows_deploy(&self, key: &str) -> bool {
        key.starts_with(SHARED_PREFIX) || self.owned_by_user(key)
    }

    /// Keys the cleanup may delete. Shared keys are never removed.
    pub fn allows_cleanup(&self, key: &str) -> bool {
        self.owned_by_user(key)
    }
}

async fn list_secret_names(client: &CtmClient) -> Result<Vec<String>> {
    let names: Vec<String> = client.get_json("/config/secrets").await?;
    debug!("Fetched {} secret names", names.len());
    Ok(names)
}

/// Create or update every allowed key of the `secrets` mapping.
pub async fn deploy(
    client: &CtmClient,
    secrets: &Value,
    filter: &SecretFilter,
    check: ExistenceCheck,
) -> Result<Vec<Outcome>> {
    let secrets: &Map<String, Value> = secrets.as_object().ok_or_else(|| {
        DeployError::InvalidInput("secrets must be a JSON object of name to value".into())
    })?;

    let (allowed, skipped): (Vec<_>, Vec<_>) =
        secrets.iter().partition(|(key, _)| filter.allows_deploy(key));
    for (key, _) in &skipped {
        debug!("Skipping secret {}: not in the CTM_ or user namespace", key);
    }
    if allowed.is_empty() {
        info!("No secrets to deploy");
        return Ok(Vec::new());
    }

    let existing = match check {
        ExistenceCheck::List => Some(list_secret_names(client).await?),
        ExistenceCheck::UpdateProbe => None,
    };

    let mut outcomes = Vec::with_capacity(allowed.len());
    for (key, value) in allowed {
        let existence = match &existing {
            Some(names) => Existence::Known(names.iter().any(|n| n == key)),
            None => Existence::Probe,
        };
        let update_path = ApiPath::new(SECRET_PATH).name(key);
        let update_body = json!({ "value": value });
        let create_body = json!({ "name": key, "value": value });

        let outcome = update_or_create(
            key,
            existence,
            || client.post_json(update_path, &update_body),
            || client.post_json(SECRET_PATH, &create_body),
        )
        .await?;

        outcomes.push(Outcome::new(
            key.as_str(),
            match outcome {
                UpsertOutcome::Updated => Action::Updated,
                UpsertOutcome::Created => Action::Created,
            },
        ));
    }
    Ok(outcomes)
}

/// Delete every secret owned by the invoking user. Deletions run
/// concurrently and are all awaited; failures are reported together.
pub async fn delete_owned(client: &CtmClient, filter: &SecretFilter) -> Result<Vec<Outcome>> {
    if filter.user_prefix.is_none() {
        return Err(DeployError::MissingInput(
            "user identifier required to select secrets for deletion. Set via --user or GITHUB_ACTOR"
                .into(),
        ));
    }

    let owned: Vec<String> = list_secret_names(client)
        .await?
        .into_iter()
        .filter(|name| filter.allows_cleanup(name))
        .collect();
    let total = owned.len();

    let tasks = owned.into_iter().map(|name| async move {
        info!("{} exists, deleting", name);
        let result = client.delete(ApiPath::new(SECRET_PATH).name(&name)).await;
        (name, result)
    });

    let mut outcomes = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in join_all(tasks).await {
        match result {
            Ok(resp) if resp.is_ok() => outcomes.push(Outcome::new(name, Action::Deleted)),
            Ok(resp) => {
                error!("Delete secret for {} failed with HTTP code {}", name, resp.status);
                failed.push(name);
            }
            Err(e) => {
                error!("Delete secret for {} failed: {}", name, e);
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(outcomes)
    } else {
        Err(DeployError::PartialFailure { failed, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::client;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_filter_prefixes() {
        let filter = SecretFilter::new(Some("abcdef"));
        assert!(filter.allows_deploy("CTM_FOO"));
        assert!(filter.allows_deploy("ABC123"));
        assert!(!filter.allows_deploy("ZZZ999"));
        assert!(!filter.allows_deploy("abc123"));

        assert!(filter.allows_cleanup("ABC123"));
        assert!(!filter.allows_cleanup("CTM_FOO"));
    }

    #[test]
    fn test_filter_without_user_only_shared() {
        for filter in [SecretFilter::new(None), SecretFilter::new(Some("  "))] {
            assert!(filter.allows_deploy("CTM_FOO"));
            assert!(!filter.allows_deploy("ABC123"));
            assert!(!filter.allows_cleanup("ABC123"));
        }
    }

    #[test]
    fn test_filter_short_user() {
        let filter = SecretFilter::new(Some("jo"));
        assert!(filter.allows_deploy("JO_KEY"));
        assert!(!filter.allows_deploy("J_KEY"));
    }

    #[tokio::test]
    async fn test_deploy_acts_only_on_allowed_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["CTM_FOO", "OTHER"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret/CTM_FOO"))
            .and(body_json(json!({"value": "foo"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret"))
            .and(body_json(json!({"name": "ABC123", "value": "abc"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let secrets = json!({"CTM_FOO": "foo", "ABC123": "abc", "ZZZ999": "zzz"});
        let outcomes = deploy(
            &client,
            &secrets,
            &SecretFilter::new(Some("abcdef")),
            ExistenceCheck::List,
        )
        .await
        .unwrap();

        let mut got: Vec<(String, Action)> = outcomes
            .into_iter()
            .map(|o| (o.target, o.action))
            .collect();
        got.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            got,
            vec![
                ("ABC123".to_string(), Action::Created),
                ("CTM_FOO".to_string(), Action::Updated),
            ]
        );
    }

    #[tokio::test]
    async fn test_special_characters_stay_in_the_secret_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["CTM_A#B", "CTM_A"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret/CTM_A%23B"))
            .and(body_json(json!({"value": "v"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret/CTM_A"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let outcomes = deploy(
            &client,
            &json!({"CTM_A#B": "v"}),
            &SecretFilter::new(None),
            ExistenceCheck::List,
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].action, Action::Updated);
    }

    #[tokio::test]
    async fn test_delete_owned_encodes_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/secrets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["ABC/X?y"])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/config/secret/ABC%2FX%3Fy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let outcomes = delete_owned(&client, &SecretFilter::new(Some("abc")))
            .await
            .unwrap();
        assert_eq!(outcomes[0].target, "ABC/X?y");
    }

    #[tokio::test]
    async fn test_deploy_update_first_skips_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret/CTM_NEW"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let outcomes = deploy(
            &client,
            &json!({"CTM_NEW": "v"}),
            &SecretFilter::new(None),
            ExistenceCheck::UpdateProbe,
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].action, Action::Created);
    }

    #[tokio::test]
    async fn test_deploy_rejects_non_object() {
        let server = MockServer::start().await;
        let client = client(&server);
        let err = deploy(
            &client,
            &json!(["CTM_A"]),
            &SecretFilter::new(None),
            ExistenceCheck::List,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_owned_joins_and_reports_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/secrets"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(["ABC_ONE", "ABC_TWO", "CTM_SHARED", "XYZ_OTHER"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/config/secret/ABC_ONE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/config/secret/ABC_TWO"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = delete_owned(&client, &SecretFilter::new(Some("abc-user")))
            .await
            .unwrap_err();
        match err {
            DeployError::PartialFailure { failed, total } => {
                assert_eq!(failed, vec!["ABC_TWO".to_string()]);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_delete_owned_requires_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["ABC"])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = delete_owned(&client, &SecretFilter::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingInput(_)));
    }
}
