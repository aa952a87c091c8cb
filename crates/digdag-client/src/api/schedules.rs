//! Schedules API.

use crate::client::DigdagClient;
use crate::error::{Error, Result};
use crate::types::{
    BackfillRequest, EnableScheduleRequest, Schedule, ScheduleAttempts, ScheduleList,
    SkipScheduleRequest,
};

#[derive(Debug, serde::Serialize)]
struct ListSchedulesQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_id: Option<&'a str>,
}

/// Schedules API client.
pub struct SchedulesApi {
    client: DigdagClient,
}

impl SchedulesApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List schedules, continuing after `last_id` when given.
    pub async fn list(&self, last_id: Option<&str>) -> Result<ScheduleList> {
        let query = ListSchedulesQuery {
            last_id: last_id.filter(|id| !id.is_empty()),
        };
        self.client.get_with_query(&["schedules"], &query).await
    }

    /// Get a schedule by ID.
    pub async fn get(&self, id: &str) -> Result<Schedule> {
        self.client.get(&["schedules", id]).await
    }

    /// Stop a schedule from starting new sessions.
    pub async fn disable(&self, id: &str) -> Result<Schedule> {
        let response = self
            .client
            .post_empty(&["schedules", id, "disable"])
            .await?;
        crate::client::decode(response).await
    }

    /// Re-enable a disabled schedule.
    pub async fn enable(&self, id: &str, request: &EnableScheduleRequest) -> Result<Schedule> {
        if request.next_time.as_deref() == Some("") {
            return Err(Error::Validation("next time must not be empty".to_string()));
        }
        self.client
            .post(&["schedules", id, "enable"], request)
            .await
    }

    /// Skip upcoming runs.
    pub async fn skip(&self, id: &str, request: &SkipScheduleRequest) -> Result<Schedule> {
        let by_count = request.count.is_some() && request.from_time.is_some();
        let by_time = request.next_time.as_deref().is_some_and(|t| !t.is_empty())
            || request.next_run_time.is_some();
        if !by_count && !by_time {
            return Err(Error::Validation(
                "skip needs count with from_time, next_time, or next_run_time".to_string(),
            ));
        }
        self.client
            .post(&["schedules", id, "skip"], request)
            .await
    }

    /// Start sessions for runs missed since `request.from_time`.
    pub async fn backfill(&self, id: &str, request: &BackfillRequest) -> Result<ScheduleAttempts> {
        if request.attempt_name.is_empty() {
            return Err(Error::Validation("attempt name must not be empty".to_string()));
        }
        self.client
            .post(&["schedules", id, "backfill"], request)
            .await
    }
}
