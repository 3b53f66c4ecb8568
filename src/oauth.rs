use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse, BasicTokenType};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// State parameter sent with the consent URL. The code is pasted back by hand,
/// so there is no redirect to check it against.
const AUTH_STATE: &str = "state-token";

/// A token this close to its expiry is treated as already expired.
const EXPIRY_DELTA_SECS: i64 = 10;

/// OAuth client descriptor parsed from a provider client-secret document.
#[derive(Clone)]
pub struct ClientConfig {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ClientSecretFile {
    web: Option<ClientSecretEntry>,
    installed: Option<ClientSecretEntry>,
}

#[derive(Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: String,
    token_uri: String,
}

impl ClientConfig {
    pub fn from_json(raw: &[u8], scopes: &[&str]) -> AppResult<Self> {
        let file: ClientSecretFile =
            serde_json::from_slice(raw).map_err(|e| AppError::ConfigParse(e.to_string()))?;
        let entry = file
            .web
            .or(file.installed)
            .ok_or_else(|| AppError::ConfigParse("no credentials found".into()))?;
        let redirect_uri = entry
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ConfigParse("missing redirect URL in the JSON".into()))?;

        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            auth_uri: entry.auth_uri,
            token_uri: entry.token_uri,
            redirect_uri,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    fn oauth_client(&self) -> AppResult<BasicClient> {
        let auth_url = AuthUrl::new(self.auth_uri.clone())
            .map_err(|e| AppError::ConfigParse(format!("invalid auth_uri {}: {e}", self.auth_uri)))?;
        let token_url = TokenUrl::new(self.token_uri.clone()).map_err(|e| {
            AppError::ConfigParse(format!("invalid token_uri {}: {e}", self.token_uri))
        })?;
        let redirect = RedirectUrl::new(self.redirect_uri.clone()).map_err(|e| {
            AppError::ConfigParse(format!("invalid redirect uri {}: {e}", self.redirect_uri))
        })?;

        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect)
        .set_auth_type(oauth2::AuthType::RequestBody))
    }
}

/// The two halves of the authorization-code grant.
#[async_trait]
pub trait CodeExchange: Send + Sync {
    fn authorization_url(&self) -> AppResult<Url>;
    async fn exchange_code(&self, code: &str) -> AppResult<Token>;
}

#[async_trait]
impl CodeExchange for ClientConfig {
    fn authorization_url(&self) -> AppResult<Url> {
        let client = self.oauth_client()?;
        let mut req = client
            .authorize_url(|| CsrfToken::new(AUTH_STATE.to_string()))
            .add_extra_param("access_type", "offline");
        for scope in &self.scopes {
            req = req.add_scope(Scope::new(scope.clone()));
        }
        let (url, _state) = req.url();
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> AppResult<Token> {
        let client = self.oauth_client()?;
        let res = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AppError::WebExchange(e.to_string()))?;
        Ok(Token::from_response(&res, None))
    }
}

/// Access/refresh credential pair. Never mutated; a refresh yields a new value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    #[serde(alias = "token", default)]
    access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type())
            .field("has_refresh_token", &self.refresh_token().is_some())
            .field("expiry", &self.expiry())
            .finish_non_exhaustive()
    }
}

impl Token {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            refresh_token,
            expiry,
        }
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::TokenDecode(e.to_string()))
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AppError::Io(format!("encode token: {e}")))
    }

    fn from_response(res: &BasicTokenResponse, previous_refresh: Option<&str>) -> Self {
        let token_type = match res.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };
        let refresh_token = res
            .refresh_token()
            .map(|r| r.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string));
        Self {
            access_token: res.access_token().secret().to_string(),
            token_type,
            refresh_token,
            expiry: res
                .expires_in()
                .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::seconds(0))),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        if self.token_type.is_empty() {
            "Bearer"
        } else {
            &self.token_type
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|r| !r.is_empty())
    }

    /// Expiry, or `None` for tokens that never expire (including the zero timestamp).
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry.filter(|e| e.year() > 1)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry() {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_DELTA_SECS) > now,
            None => true,
        }
    }
}

/// Read a token saved by an earlier bootstrap run.
///
/// A missing file is `Ok(None)`. A file that does not decode is reported and
/// also treated as missing so the caller can obtain a fresh token.
pub fn load_token_file(path: &Path) -> AppResult<Option<Token>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::Io(format!(
                "reading token file {}: {e}",
                path.display()
            )))
        }
    };
    match Token::from_json(&raw) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
            Ok(None)
        }
    }
}

/// Write `token` to `path`, readable and writable by the owner only.
pub fn save_token_file(path: &Path, token: &Token) -> AppResult<()> {
    let serialized = token.to_json()?;

    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| AppError::Io(format!("opening token file {}: {e}", path.display())))?;

    // mode() only applies on create; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| AppError::Io(format!("restricting token file: {e}")))?;
    }

    file.write_all(serialized.as_bytes())
        .map_err(|e| AppError::Io(format!("writing token file: {e}")))?;
    file.sync_all()
        .map_err(|e| AppError::Io(format!("syncing token file: {e}")))?;
    info!(path = %path.display(), "Saved OAuth token");
    Ok(())
}

/// HTTP transport that attaches a bearer token, refreshing it when stale.
pub struct AuthenticatedClient {
    http: reqwest::Client,
    oauth: BasicClient,
    token: Mutex<Token>,
}

impl AuthenticatedClient {
    /// Wrap `token` for use against the provider. No network I/O happens here.
    pub fn new(config: &ClientConfig, token: Token) -> AppResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            oauth: config.oauth_client()?,
            token: Mutex::new(token),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Snapshot of the token currently in use.
    pub async fn token(&self) -> Token {
        self.token.lock().await.clone()
    }

    pub async fn access_token(&self) -> AppResult<String> {
        let mut current = self.token.lock().await;
        if current.is_valid_at(Utc::now()) {
            return Ok(current.access_token().to_string());
        }

        let refresh = current.refresh_token().map(str::to_string).ok_or_else(|| {
            AppError::TokenRefresh("token expired and refresh token is not set".into())
        })?;

        info!("Access token stale; refreshing");
        let res = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AppError::TokenRefresh(e.to_string()))?;

        *current = Token::from_response(&res, Some(&refresh));
        Ok(current.access_token().to_string())
    }
}
