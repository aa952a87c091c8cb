//! Attempts API.

use uuid::Uuid;

use crate::client::DigdagClient;
use crate::error::{Error, Result};
use crate::types::{Attempt, AttemptList, Resume, StartAttemptRequest, TaskList};

/// Query parameters for listing attempts.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ListAttemptsQuery {
    /// Only attempts of this project (by name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Only attempts of this workflow (by name); needs `project`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// Include attempts superseded by a retry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_retried: bool,
    /// Continue after this attempt ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    /// Maximum number of attempts to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Attempts API client.
pub struct AttemptsApi {
    client: DigdagClient,
}

impl AttemptsApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List attempts.
    pub async fn list(&self, query: &ListAttemptsQuery) -> Result<AttemptList> {
        if query.workflow.is_some() && query.project.is_none() {
            return Err(Error::Validation(
                "filtering by workflow requires a project".to_string(),
            ));
        }
        self.client.get_with_query(&["attempts"], query).await
    }

    /// Get an attempt by ID.
    pub async fn get(&self, id: &str) -> Result<Attempt> {
        self.client.get(&["attempts", id]).await
    }

    /// Start a new attempt.
    pub async fn start(&self, request: &StartAttemptRequest) -> Result<Attempt> {
        if request.workflow_id.is_empty() {
            return Err(Error::Validation("workflow id is required".to_string()));
        }
        tracing::debug!(workflow_id = %request.workflow_id, "starting attempt");
        self.client.put(&["attempts"], request).await
    }

    /// Start a retry of an existing session.
    ///
    /// A fresh retry name is generated when the request has none.
    pub async fn retry_with(&self, mut request: StartAttemptRequest) -> Result<Attempt> {
        if request.retry_attempt_name.is_none() {
            request.retry_attempt_name = Some(Uuid::new_v4().to_string());
        }
        self.start(&request).await
    }

    /// Retry `attempt` with its original workflow, session time and params.
    pub async fn retry(&self, attempt: &Attempt, resume: Option<Resume>) -> Result<Attempt> {
        let workflow_id = attempt
            .workflow
            .id
            .clone()
            .ok_or_else(|| Error::Validation(format!("attempt {} has no workflow id", attempt.id)))?;
        let session_time = attempt.session_time.ok_or_else(|| {
            Error::Validation(format!("attempt {} has no session time", attempt.id))
        })?;

        let mut request =
            StartAttemptRequest::new(workflow_id, session_time).with_params(attempt.params.clone());
        if request.params.is_null() {
            request.params = serde_json::Value::Object(Default::default());
        }
        if let Some(resume) = resume {
            request = request.with_resume(resume);
        }
        self.retry_with(request).await
    }

    /// Request that a running attempt be killed.
    pub async fn kill(&self, id: &str) -> Result<()> {
        self.client.post_empty(&["attempts", id, "kill"]).await?;
        Ok(())
    }

    /// List all attempts of the same session, including retries.
    pub async fn retries(&self, id: &str) -> Result<AttemptList> {
        self.client.get(&["attempts", id, "retries"]).await
    }

    /// List the tasks of an attempt.
    pub async fn tasks(&self, id: &str) -> Result<TaskList> {
        self.client.get(&["attempts", id, "tasks"]).await
    }
}
