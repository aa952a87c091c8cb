//! Workflows API.

use crate::client::DigdagClient;
use crate::error::Result;
use crate::types::{Workflow, WorkflowList};

/// Query parameters for listing workflows.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ListWorkflowsQuery {
    /// Continue after this workflow ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    /// Maximum number of workflows to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Workflows API client.
pub struct WorkflowsApi {
    client: DigdagClient,
}

impl WorkflowsApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List workflows across all projects.
    pub async fn list(&self, query: &ListWorkflowsQuery) -> Result<WorkflowList> {
        self.client.get_with_query(&["workflows"], query).await
    }

    /// Get a workflow by ID.
    pub async fn get(&self, id: &str) -> Result<Workflow> {
        self.client.get(&["workflows", id]).await
    }
}
