#![allow(dead_code)]

pub mod stub;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use clap::Parser;

use gmail_purge::cli::Cli;
use gmail_purge::config::Config;
use gmail_purge::credhub::SecretStore;
use gmail_purge::errors::{AppError, AppResult, SecretError};
use gmail_purge::gmail::MailService;
use gmail_purge::types::{ArchiveRequest, Header, MessagePage};

pub const CREDS_PATH: &str = "/concourse/main/gmail-creds";
pub const TOKEN_PATH: &str = "/concourse/main/gmail-token";

pub const CLIENT_JSON: &str = r#"{
  "installed": {
    "client_id": "1234.apps.googleusercontent.com",
    "project_id": "purge",
    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
    "token_uri": "https://oauth2.googleapis.com/token",
    "client_secret": "shh",
    "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
  }
}"#;

pub fn config(extra: &[&str]) -> Config {
    let mut args = vec![
        "gmail-purge",
        "--credhub-url",
        "https://credhub.example.com:8844",
        "--gmail-creds-path",
        CREDS_PATH,
        "--gmail-token-path",
        TOKEN_PATH,
    ];
    args.extend_from_slice(extra);
    let cli = Cli::parse_from(args);
    Config::from_cli_with_env(&cli, |key| match key {
        "CREDHUB_CLIENT" => Some("purge-client".to_string()),
        "CREDHUB_SECRET" => Some("purge-secret".to_string()),
        _ => None,
    })
    .expect("valid test config")
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// In-memory mailbox serving a fixed list of pages.
#[derive(Default)]
pub struct FakeMailbox {
    pages: Vec<Vec<String>>,
    headers: HashMap<String, Vec<Header>>,
    broken_ids: HashSet<String>,
    fail_batches: bool,
    pub list_calls: Mutex<Vec<(String, u32, Option<String>)>>,
    pub header_calls: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<ArchiveRequest>>,
}

impl FakeMailbox {
    pub fn with_pages(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages.iter().map(|p| ids(p)).collect(),
            ..Default::default()
        }
    }

    pub fn with_headers(mut self, id: &str, headers: Vec<Header>) -> Self {
        self.headers.insert(id.to_string(), headers);
        self
    }

    pub fn with_broken_message(mut self, id: &str) -> Self {
        self.broken_ids.insert(id.to_string());
        self
    }

    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    pub fn batches(&self) -> Vec<ArchiveRequest> {
        self.batches.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(String, u32, Option<String>)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn header_calls(&self) -> Vec<String> {
        self.header_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailService for FakeMailbox {
    async fn list_messages(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        self.list_calls.lock().unwrap().push((
            query.to_string(),
            page_size,
            page_token.map(str::to_string),
        ));

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| AppError::PageFetch(format!("bad token {token}")))?,
        };
        let ids = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(MessagePage {
            ids,
            next_page_token,
        })
    }

    async fn message_headers(&self, id: &str) -> AppResult<Vec<Header>> {
        self.header_calls.lock().unwrap().push(id.to_string());
        if self.broken_ids.contains(id) {
            return Err(AppError::MessageFetch {
                id: id.to_string(),
                reason: "500 Internal Server Error".into(),
            });
        }
        Ok(self.headers.get(id).cloned().unwrap_or_default())
    }

    async fn batch_modify(&self, request: &ArchiveRequest) -> AppResult<()> {
        if self.fail_batches {
            return Err(AppError::BatchModify("403 Forbidden".into()));
        }
        self.batches.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Secret store backed by a map; records every path asked for.
#[derive(Default)]
pub struct FakeStore {
    values: HashMap<String, String>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            values: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for FakeStore {
    async fn get(&self, path: &str) -> Result<String, SecretError> {
        self.requested.lock().unwrap().push(path.to_string());
        self.values.get(path).cloned().ok_or(SecretError::NotFound)
    }
}
