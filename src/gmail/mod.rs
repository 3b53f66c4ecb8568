//! Gmail REST surface used by the purge: list, metadata get, batch modify.
use crate::errors::{AppError, AppResult};
use crate::oauth::AuthenticatedClient;
use crate::types::{ArchiveRequest, Header, MessagePage};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Remote mailbox operations, scoped to the authenticated user.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_messages(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage>;

    /// Headers of one message, in the order the message carries them.
    async fn message_headers(&self, id: &str) -> AppResult<Vec<Header>>;

    async fn batch_modify(&self, request: &ArchiveRequest) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessagePart {
    #[serde(default)]
    headers: Vec<Header>,
}

pub struct GmailClient {
    auth: AuthenticatedClient,
    base_url: String,
    user: String,
}

impl GmailClient {
    pub fn new(auth: AuthenticatedClient) -> Self {
        Self::with_base_url(auth, GMAIL_API_BASE)
    }

    pub fn with_base_url(auth: AuthenticatedClient, base_url: &str) -> Self {
        Self {
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: "me".to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, self.user)
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_messages(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AppResult<MessagePage> {
        let bearer = self.auth.access_token().await?;
        let mut params = vec![
            ("q", query.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .auth
            .http()
            .get(self.messages_url())
            .query(&params)
            .bearer_auth(&bearer)
            .send()
            .await
            .map_err(|e| AppError::PageFetch(format!("list request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::PageFetch(format!("{status}: {error_text}")));
        }

        let listed: ListMessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::PageFetch(format!("parse list response: {e}")))?;

        Ok(MessagePage {
            ids: listed.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: listed.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn message_headers(&self, id: &str) -> AppResult<Vec<Header>> {
        let bearer = self.auth.access_token().await?;
        let fetch_err = |reason: String| AppError::MessageFetch {
            id: id.to_string(),
            reason,
        };

        let response = self
            .auth
            .http()
            .get(format!("{}/{}", self.messages_url(), id))
            .query(&[("format", "metadata")])
            .bearer_auth(&bearer)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(response.status().to_string()));
        }

        let message: Message = response.json().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(message.payload.map(|p| p.headers).unwrap_or_default())
    }

    async fn batch_modify(&self, request: &ArchiveRequest) -> AppResult<()> {
        let bearer = self.auth.access_token().await?;
        debug!(count = request.ids.len(), "Sending batchModify");

        let response = self
            .auth
            .http()
            .post(format!("{}/batchModify", self.messages_url()))
            .bearer_auth(&bearer)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::BatchModify(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::BatchModify(format!("{status}: {error_text}")))
        }
    }
}
