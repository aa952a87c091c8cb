//! Sessions API.

use crate::client::DigdagClient;
use crate::error::Result;
use crate::types::{AttemptList, Session, SessionList};

/// Pagination parameters shared by the session listings.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PageQuery {
    /// Continue after this ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Sessions API client.
pub struct SessionsApi {
    client: DigdagClient,
}

impl SessionsApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List sessions, newest first.
    pub async fn list(&self, page: &PageQuery) -> Result<SessionList> {
        self.client.get_with_query(&["sessions"], page).await
    }

    /// Get a session by ID.
    pub async fn get(&self, id: &str) -> Result<Session> {
        self.client.get(&["sessions", id]).await
    }

    /// List the attempts of a session.
    pub async fn attempts(&self, id: &str, page: &PageQuery) -> Result<AttemptList> {
        self.client
            .get_with_query(&["sessions", id, "attempts"], page)
            .await
    }
}
