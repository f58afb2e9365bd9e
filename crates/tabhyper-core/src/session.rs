// crates/tabhyper-core/src/session.rs

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TableauCredentials;
use crate::error::SessionError;

/// REST API version used when `TAB_API_VERSION` is not set.
pub const DEFAULT_API_VERSION: &str = "3.19";

const AUTH_HEADER: &str = "X-Tableau-Auth";

/// An authenticated connection to one Tableau site.
///
/// Scripts only borrow the session; closing it belongs to whoever opened it.
#[async_trait]
pub trait SiteSession: Send + Sync {
    fn site_content_url(&self) -> &str;

    fn site_luid(&self) -> &str;

    fn api_version(&self) -> &str;

    async fn publish_datasource(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<PublishedDatasource, SessionError>;

    /// Sign out. Calling this more than once is a no-op.
    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(
        &self,
        credentials: &TableauCredentials,
    ) -> Result<Box<dyn SiteSession>, SessionError>;
}

#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub file: &'a Path,
    pub name: &'a str,
    pub project_id: &'a str,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedDatasource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    credentials: SignInCredentials<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInCredentials<'a> {
    personal_access_token_name: &'a str,
    personal_access_token_secret: &'a str,
    site: ContentUrl<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentUrl<'a> {
    content_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    credentials: SignedIn,
}

#[derive(Debug, Deserialize)]
struct SignedIn {
    token: String,
    site: SiteInfo,
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteInfo {
    id: String,
    content_url: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct PublishPayload<'a> {
    datasource: DatasourcePayload<'a>,
}

#[derive(Debug, Serialize)]
struct DatasourcePayload<'a> {
    name: &'a str,
    project: ProjectRef,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    datasource: PublishedDatasource,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    detail: String,
}

/// Opens [`TableauClient`] sessions over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct TableauConnector {
    http: Client,
}

impl TableauConnector {
    pub fn new() -> Result<Self, SessionError> {
        let http = Client::builder()
            .user_agent(concat!("tabhyper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SessionConnector for TableauConnector {
    async fn open(
        &self,
        credentials: &TableauCredentials,
    ) -> Result<Box<dyn SiteSession>, SessionError> {
        let client = TableauClient::sign_in(self.http.clone(), credentials).await?;
        Ok(Box::new(client))
    }
}

/// Tableau REST API session authenticated with a personal access token.
pub struct TableauClient {
    http: Client,
    base_url: String,
    api_version: String,
    site_luid: String,
    site_content_url: String,
    user_id: String,
    token: Option<String>,
}

impl std::fmt::Debug for TableauClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableauClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("site_luid", &self.site_luid)
            .field("site_content_url", &self.site_content_url)
            .field("user_id", &self.user_id)
            .field("signed_in", &self.token.is_some())
            .finish()
    }
}

impl TableauClient {
    pub async fn sign_in(
        http: Client,
        credentials: &TableauCredentials,
    ) -> Result<Self, SessionError> {
        let base_url = normalize_site_url(&credentials.site_url)?;
        let api_version = credentials
            .api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let body = SignInRequest {
            credentials: SignInCredentials {
                personal_access_token_name: &credentials.pat_name,
                personal_access_token_secret: &credentials.pat_secret,
                site: ContentUrl {
                    content_url: &credentials.site_id,
                },
            },
        };

        let response = http
            .post(format!("{base_url}/api/{api_version}/auth/signin"))
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let signed_in: SignInResponse = check_status(response).await?.json().await?;
        let SignedIn { token, site, user } = signed_in.credentials;

        info!(
            site = %site.content_url,
            site_luid = %site.id,
            %api_version,
            "Signed in to Tableau"
        );

        Ok(Self {
            http,
            base_url,
            api_version,
            site_luid: site.id,
            site_content_url: site.content_url,
            user_id: user.id,
            token: Some(token),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.api_version, path)
    }

    fn token(&self) -> Result<&str, SessionError> {
        self.token.as_deref().ok_or(SessionError::Closed)
    }
}

#[async_trait]
impl SiteSession for TableauClient {
    fn site_content_url(&self) -> &str {
        &self.site_content_url
    }

    fn site_luid(&self) -> &str {
        &self.site_luid
    }

    fn api_version(&self) -> &str {
        &self.api_version
    }

    async fn publish_datasource(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<PublishedDatasource, SessionError> {
        let token = self.token()?;
        let contents =
            tokio::fs::read(request.file)
                .await
                .map_err(|source| SessionError::ReadDatasource {
                    path: request.file.to_path_buf(),
                    source,
                })?;
        let file_name = request
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("extract.hyper");

        let payload = serde_json::to_vec(&PublishPayload {
            datasource: DatasourcePayload {
                name: request.name,
                project: ProjectRef {
                    id: request.project_id.to_string(),
                },
            },
        })?;
        let boundary = Uuid::new_v4().simple().to_string();
        let body = multipart_mixed(&boundary, &payload, file_name, &contents);

        let mut url = Url::parse(&self.endpoint(&format!("sites/{}/datasources", self.site_luid)))
            .map_err(|_| SessionError::InvalidSiteUrl(self.base_url.clone()))?;
        url.query_pairs_mut()
            .append_pair("overwrite", if request.overwrite { "true" } else { "false" });

        let response = self
            .http
            .post(url)
            .header(AUTH_HEADER, token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(body)
            .send()
            .await?;
        let published: PublishResponse = check_status(response).await?.json().await?;

        info!(
            datasource_id = %published.datasource.id,
            name = %published.datasource.name,
            project_id = request.project_id,
            bytes = contents.len(),
            "Published datasource"
        );
        Ok(published.datasource)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("auth/signout"))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        check_status(response).await?;
        info!(site = %self.site_content_url, "Signed out of Tableau");
        Ok(())
    }
}

impl Drop for TableauClient {
    fn drop(&mut self) {
        if self.token.is_some() {
            warn!(
                site = %self.site_content_url,
                "Tableau session dropped without signing out"
            );
        }
    }
}

fn normalize_site_url(raw: &str) -> Result<String, SessionError> {
    let trimmed = raw.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(SessionError::InvalidSiteUrl(raw.to_string())),
    }
}

async fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(decode_api_error(status.as_u16(), body))
}

fn decode_api_error(status: u16, body: String) -> SessionError {
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => SessionError::Api {
            status,
            code: envelope.error.code,
            summary: envelope.error.summary,
            detail: envelope.error.detail,
        },
        Err(_) => SessionError::UnexpectedResponse { status, body },
    }
}

/// Body for Tableau's `multipart/mixed` publish endpoints.
fn multipart_mixed(boundary: &str, payload: &[u8], file_name: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + file.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: name=\"request_payload\"\r\n\
             Content-Type: application/json\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(
        format!(
            "\r\n--{boundary}\r\n\
             Content-Disposition: name=\"tableau_datasource\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
