use serde::{Deserialize, Serialize};

pub const LABEL_INBOX: &str = "INBOX";
pub const LABEL_UNREAD: &str = "UNREAD";

/// One page of search results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a `batchModify` call that takes messages out of the inbox and marks them read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub ids: Vec<String>,
    pub remove_label_ids: Vec<String>,
}

impl ArchiveRequest {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            remove_label_ids: vec![LABEL_INBOX.to_string(), LABEL_UNREAD.to_string()],
        }
    }
}

/// What one normal run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub pages: usize,
    pub matched: usize,
    pub archived: usize,
}
