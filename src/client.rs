use crate::error::{DeployError, Result};
use crate::output::print_response;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{multipart, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::debug;

const API_KEY_HEADER: &str = "x-api-key";

/// Status and raw text of a response from the automation API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A route under the endpoint, optionally followed by object names. Each
/// name is percent-encoded as exactly one path segment, so `#`, `?` or `/`
/// inside a name never change the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    route: &'static str,
    names: Vec<String>,
}

impl ApiPath {
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            names: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }
}

impl From<&'static str> for ApiPath {
    fn from(route: &'static str) -> Self {
        ApiPath::new(route)
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route)?;
        for name in &self.names {
            write!(f, "/{name}")?;
        }
        Ok(())
    }
}

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FormFile {
    pub field: &'static str,
    pub filename: String,
    pub data: Vec<u8>,
}

impl FormFile {
    pub fn new(field: &'static str, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field,
            filename: filename.into(),
            data,
        }
    }
}

pub struct CtmClient {
    http: reqwest::Client,
    base: Url,
    pub base_url: String,
    api_key: HeaderValue,
}

impl CtmClient {
    /// Build a client for `base_url`. `insecure` turns off certificate
    /// validation for this client only.
    pub fn new(base_url: &str, api_token: &str, insecure: bool) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let base = Url::parse(base_url)
            .map_err(|e| DeployError::InvalidInput(format!("Invalid endpoint {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(DeployError::InvalidInput(format!(
                "Invalid endpoint {base_url}: not a hierarchical URL"
            )));
        }

        let mut api_key = HeaderValue::from_str(api_token)
            .map_err(|e| DeployError::InvalidInput(format!("Invalid API token: {e}")))?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            http,
            base,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, self.api_key.clone());
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn url(&self, path: &ApiPath) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DeployError::InvalidInput(format!("Invalid endpoint {}", self.base_url)))?
            .pop_if_empty()
            .extend(path.route.split('/').filter(|s| !s.is_empty()))
            .extend(&path.names);
        Ok(url)
    }

    /// GET a listing endpoint and decode it. Anything but 200 is an error.
    pub async fn get_json<T: DeserializeOwned>(&self, path: impl Into<ApiPath>) -> Result<T> {
        let path = path.into();
        let url = self.url(&path)?;
        debug!("GET {}", url);
        let resp = self.http.get(url.clone()).headers(self.headers()).send().await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status != 200 {
            return Err(DeployError::status("Listing", path.to_string(), status));
        }
        debug!("GET {} returned {}", url, body);
        serde_json::from_str(&body).map_err(DeployError::from)
    }

    pub async fn post_json(&self, path: impl Into<ApiPath>, body: &Value) -> Result<ApiResponse> {
        let url = self.url(&path.into())?;
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;
        self.read_response(resp).await
    }

    pub async fn post_form(
        &self,
        path: impl Into<ApiPath>,
        files: Vec<FormFile>,
    ) -> Result<ApiResponse> {
        let url = self.url(&path.into())?;
        let mut form = multipart::Form::new();

        for file in files {
            debug!("POST {} part {} ({} bytes)", url, file.field, file.data.len());
            let part = multipart::Part::bytes(file.data)
                .file_name(file.filename)
                .mime_str("application/json")?;
            form = form.part(file.field, part);
        }

        let resp = self
            .http
            .post(url)
            .headers(self.headers())
            .multipart(form)
            .send()
            .await?;
        self.read_response(resp).await
    }

    pub async fn delete(&self, path: impl Into<ApiPath>) -> Result<ApiResponse> {
        let url = self.url(&path.into())?;
        debug!("DELETE {}", url);
        let resp = self
            .http
            .delete(url)
            .headers(self.headers())
            .send()
            .await?;
        self.read_response(resp).await
    }

    /// Every mutating call echoes the response body; it is the only
    /// feedback the pipeline log gets.
    async fn read_response(&self, resp: reqwest::Response) -> Result<ApiResponse> {
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        print_response(&body);
        debug!("HTTP {}", status);
        Ok(ApiResponse { status, body })
    }
}
