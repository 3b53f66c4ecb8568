use crate::cli::Cli;
use crate::errors::{AppError, AppResult};
use std::env;
use std::path::PathBuf;
use url::Url;

/// Search predicate for mail that should leave the inbox.
pub const PURGE_QUERY: &str = "is:unread older_than:1d";

/// Largest page the mail service will return for one list call.
pub const MAX_PAGE_SIZE: u32 = 500;

const ENV_CREDHUB_CA_CERT: &str = "CREDHUB_CA_CERT";
const ENV_UAA_CA_CERT: &str = "UAA_CA_CERT";
const ENV_CREDHUB_CLIENT: &str = "CREDHUB_CLIENT";
const ENV_CREDHUB_SECRET: &str = "CREDHUB_SECRET";

/// Connection settings for the secret store.
#[derive(Clone)]
pub struct CredHubSettings {
    pub url: Url,
    /// PEM bundles added as trust roots (CredHub CA, then UAA CA).
    pub ca_certs: Vec<String>,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CredHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredHubSettings")
            .field("url", &self.url.as_str())
            .field("ca_certs", &self.ca_certs.len())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Everything one run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub show_headers: bool,
    pub page_size: u32,
    pub dry_run: bool,
    pub save_token: bool,
    pub token_file: PathBuf,
    pub query: String,
    pub credhub: CredHubSettings,
    pub token_path: String,
    pub creds_path: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> AppResult<Self> {
        Self::from_cli_with_env(cli, |key| env::var(key).ok())
    }

    pub fn from_cli_with_env<F>(cli: &Cli, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if cli.page_size == 0 || cli.page_size > MAX_PAGE_SIZE {
            return Err(AppError::Config(format!(
                "--page-size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                cli.page_size
            )));
        }

        let raw_url = cli.credhub_url.trim();
        if raw_url.is_empty() {
            return Err(AppError::Config("--credhub-url is required".into()));
        }
        let url = Url::parse(raw_url)
            .map_err(|e| AppError::Config(format!("invalid --credhub-url {raw_url}: {e}")))?;

        let creds_path = required(&cli.gmail_creds_path, "--gmail-creds-path")?;
        // Bootstrap runs never read the token secret.
        let token_path = if cli.save_token {
            cli.gmail_token_path.trim().to_string()
        } else {
            required(&cli.gmail_token_path, "--gmail-token-path")?
        };

        let client_id = lookup(ENV_CREDHUB_CLIENT)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config(format!("{ENV_CREDHUB_CLIENT} missing")))?;
        let client_secret = lookup(ENV_CREDHUB_SECRET)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config(format!("{ENV_CREDHUB_SECRET} missing")))?;

        let ca_certs = [ENV_CREDHUB_CA_CERT, ENV_UAA_CA_CERT]
            .iter()
            .filter_map(|key| lookup(key))
            .filter(|pem| !pem.trim().is_empty())
            .collect();

        Ok(Self {
            show_headers: cli.show_headers,
            page_size: cli.page_size,
            dry_run: cli.dry_run,
            save_token: cli.save_token,
            token_file: cli.token_file.clone(),
            query: PURGE_QUERY.to_string(),
            credhub: CredHubSettings {
                url,
                ca_certs,
                client_id,
                client_secret,
            },
            token_path,
            creds_path,
        })
    }
}

fn required(value: &str, flag: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config(format!("{flag} is required")));
    }
    Ok(trimmed.to_string())
}
