use crate::errors::{AppError, AppResult};
use crate::gmail::MailService;
use crate::types::{Header, MessagePage};
use std::io::Write;
use tracing::{debug, info};

/// Headers printed per message, matched exactly.
pub const HEADERS_TO_SHOW: [&str; 2] = ["Subject", "Date"];

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy, finite sequence of search-result pages.
///
/// Each call to [`MessagePages::next_page`] issues at most one list request.
/// Once the service reports no continuation, or a request fails, the sequence
/// is exhausted and cannot be restarted.
pub struct MessagePages<'a, S: ?Sized> {
    service: &'a S,
    query: String,
    page_size: u32,
    cursor: Cursor,
    fetched: usize,
}

impl<'a, S: MailService + ?Sized> MessagePages<'a, S> {
    pub fn new(service: &'a S, query: &str, page_size: u32) -> Self {
        Self {
            service,
            query: query.to_string(),
            page_size,
            cursor: Cursor::Start,
            fetched: 0,
        }
    }

    pub async fn next_page(&mut self) -> AppResult<Option<MessagePage>> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = self
            .service
            .list_messages(&self.query, self.page_size, token.as_deref())
            .await?;
        self.fetched += 1;
        info!(page = self.fetched, messages = page.ids.len(), "Fetched page");

        if let Some(next) = &page.next_page_token {
            self.cursor = Cursor::Next(next.clone());
        }
        Ok(Some(page))
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }
}

/// Values of the allow-listed headers, in message order, space-separated.
pub fn header_line(headers: &[Header]) -> String {
    headers
        .iter()
        .filter(|h| HEADERS_TO_SHOW.contains(&h.name.as_str()))
        .map(|h| h.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print one header line per message id. Metadata fetches are best-effort:
/// a failed fetch is skipped and the rest of the page still prints.
pub async fn print_headers<S, W>(service: &S, ids: &[String], out: &mut W) -> AppResult<()>
where
    S: MailService + ?Sized,
    W: Write,
{
    for id in ids {
        let headers = match service.message_headers(id).await {
            Ok(headers) => headers,
            Err(e) => {
                debug!(id = %id, error = %e, "Skipping headers");
                continue;
            }
        };
        writeln!(out, "{}", header_line(&headers)).map_err(|e| AppError::Io(e.to_string()))?;
    }
    Ok(())
}
