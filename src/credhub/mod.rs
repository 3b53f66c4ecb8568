//! CredHub secret resolver: UAA client-credentials auth over a CA-pinned rustls client.
use crate::config::CredHubSettings;
use crate::errors::{AppError, AppResult, SecretError};
use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::http::header::{HeaderName, HeaderValue};
use oauth2::http::{HeaderMap, StatusCode};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, TokenResponse,
    TokenUrl,
};
use reqwest::{Certificate, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Read access to the latest value of a named secret.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<String, SecretError>;
}

/// Resolve `path` or wrap the failure with the path that was asked for.
pub async fn resolve<S: SecretStore + ?Sized>(store: &S, path: &str) -> AppResult<String> {
    info!(path = %path, "Resolving secret");
    store.get(path).await.map_err(|source| AppError::SecretFetch {
        path: path.to_string(),
        source,
    })
}

pub struct CredHubClient {
    http: Client,
    base: Url,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "auth-server")]
    auth_server: AuthServer,
}

#[derive(Debug, Deserialize)]
struct AuthServer {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Vec<DataEntry>,
}

#[derive(Debug, Deserialize)]
struct DataEntry {
    value: Value,
}

impl CredHubClient {
    pub fn new(settings: &CredHubSettings) -> AppResult<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none());

        if !settings.ca_certs.is_empty() {
            builder = builder.tls_built_in_root_certs(false);
            for pem in &settings.ca_certs {
                let certs = Certificate::from_pem_bundle(pem.as_bytes())
                    .map_err(|e| AppError::Config(format!("invalid CA certificate: {e}")))?;
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        let http = builder
            .build()
            .map_err(|e| AppError::Config(format!("building CredHub HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: settings.url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SecretError> {
        self.base
            .join(path)
            .map_err(|e| SecretError::Network(format!("invalid CredHub endpoint {path}: {e}")))
    }

    async fn token_url(&self) -> Result<String, SecretError> {
        let res = self
            .http
            .get(self.endpoint("info")?)
            .send()
            .await
            .map_err(|e| SecretError::Network(format!("CredHub info request failed: {e}")))?;
        if !res.status().is_success() {
            return Err(SecretError::Network(format!(
                "CredHub info failed with status {}",
                res.status()
            )));
        }
        let info: InfoResponse = res
            .json()
            .await
            .map_err(|e| SecretError::Malformed(format!("parse CredHub info: {e}")))?;
        Ok(format!(
            "{}/oauth/token",
            info.auth_server.url.trim_end_matches('/')
        ))
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let token_url = self.token_url().await?;
        debug!(token_url = %token_url, "Requesting UAA client-credentials token");

        let token_url = TokenUrl::new(token_url.clone())
            .map_err(|e| SecretError::Malformed(format!("invalid UAA url {token_url}: {e}")))?;
        // The authorize endpoint is never visited in a client-credentials grant.
        let auth_url = AuthUrl::new(token_url.url().to_string())
            .map_err(|e| SecretError::Malformed(format!("invalid UAA url: {e}")))?;
        let client = BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        // UAA does not percent-decode Basic credentials; send them in the form body.
        .set_auth_type(oauth2::AuthType::RequestBody);

        let res = client
            .exchange_client_credentials()
            .request_async(|req| send_oauth_request(&self.http, req))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => SecretError::Auth(resp.to_string()),
                RequestTokenError::Request(inner) => inner,
                RequestTokenError::Parse(e, _) => SecretError::Malformed(e.to_string()),
                RequestTokenError::Other(msg) => SecretError::Auth(msg),
            })?;

        Ok(res.access_token().secret().to_string())
    }
}

#[async_trait]
impl SecretStore for CredHubClient {
    async fn get(&self, path: &str) -> Result<String, SecretError> {
        let bearer = self.access_token().await?;

        let mut url = self.endpoint("api/v1/data")?;
        url.query_pairs_mut()
            .append_pair("name", path)
            .append_pair("current", "true");

        let res = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| SecretError::Network(format!("CredHub data request failed: {e}")))?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = res.text().await.unwrap_or_default();
            return Err(SecretError::Auth(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SecretError::Network(format!("{status}: {body}")));
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| SecretError::Network(format!("reading CredHub response: {e}")))?;
        latest_value(&body)
    }
}

/// Extract the current value from a CredHub `/api/v1/data` response body.
///
/// Plain values come back verbatim; structured (`json`, `user`, ...) values are
/// re-serialized so callers always get a string.
pub fn latest_value(body: &[u8]) -> Result<String, SecretError> {
    let parsed: DataResponse = serde_json::from_slice(body)
        .map_err(|e| SecretError::Malformed(format!("parse CredHub data: {e}")))?;
    let entry = parsed.data.into_iter().next().ok_or(SecretError::NotFound)?;
    match entry.value {
        Value::String(s) => Ok(s),
        Value::Null => Err(SecretError::NotFound),
        other => serde_json::to_string(&other)
            .map_err(|e| SecretError::Malformed(format!("re-encode CredHub value: {e}"))),
    }
}

// oauth2 speaks `http` 0.2 types; bridge them onto the pinned reqwest client.
async fn send_oauth_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, SecretError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| SecretError::Network(format!("unsupported method: {e}")))?;

    let mut builder = client.request(method, request.url.as_str());
    for (name, value) in request.headers.iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let res = builder
        .body(request.body)
        .send()
        .await
        .map_err(|e| SecretError::Network(format!("UAA token request failed: {e}")))?;

    let status_code = StatusCode::from_u16(res.status().as_u16())
        .map_err(|e| SecretError::Network(format!("invalid status from UAA: {e}")))?;

    let mut headers = HeaderMap::new();
    for (name, value) in res.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }

    let body = res
        .bytes()
        .await
        .map_err(|e| SecretError::Network(format!("reading UAA response: {e}")))?
        .to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
