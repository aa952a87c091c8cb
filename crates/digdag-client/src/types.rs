//! Request and response types for the Digdag REST API.
//!
//! These types mirror the server's JSON schema. Fields the server may leave
//! out are optional so that partial payloads still decode; fields whose shape
//! is defined by workflow authors (`params`, `config`, task state) are kept as
//! raw [`serde_json::Value`]s.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to another resource by id and name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource ID. Absent on some embedded workflow references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Resource name.
    #[serde(default)]
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────────────────────────

/// A project: the container for uploaded workflow definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project ID.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Latest revision name.
    #[serde(default)]
    pub revision: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Set once the project has been deleted.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Where the archive is stored (`db`, `s3`, ...).
    #[serde(default)]
    pub archive_type: String,
    /// Base64 MD5 of the uploaded archive.
    #[serde(default)]
    pub archive_md5: Option<String>,
}

impl Project {
    /// Whether the server reports this project as deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Response for list projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectList {
    /// Projects.
    pub projects: Vec<Project>,
}

/// One uploaded revision of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Revision name.
    pub revision: String,
    /// Upload time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Archive storage type.
    #[serde(default)]
    pub archive_type: String,
    /// Base64 MD5 of the archive.
    #[serde(default)]
    pub archive_md5: Option<String>,
    /// Information about the uploading user, as recorded by the server.
    #[serde(default)]
    pub user_info: Value,
}

/// Response for list revisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionList {
    /// Revisions, newest first.
    pub revisions: Vec<Revision>,
}

/// Key of a stored secret. Values are never returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey {
    /// Secret key.
    pub key: String,
}

/// Response for list secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretList {
    /// Stored secret keys.
    pub secrets: Vec<SecretKey>,
}

/// Body of a secret write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SecretValue {
    pub value: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflows
// ─────────────────────────────────────────────────────────────────────────────

/// A workflow definition within a project revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Workflow ID.
    pub id: String,
    /// Workflow name.
    pub name: String,
    /// Owning project.
    #[serde(default)]
    pub project: ResourceRef,
    /// Revision the definition belongs to.
    #[serde(default)]
    pub revision: String,
    /// Workflow time zone.
    #[serde(default)]
    pub timezone: String,
    /// Workflow definition.
    #[serde(default)]
    pub config: Value,
}

/// Response for list workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowList {
    /// Workflows.
    pub workflows: Vec<Workflow>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Condensed attempt info embedded in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    /// Attempt ID.
    pub id: String,
    /// Name given to a retried attempt.
    #[serde(default)]
    pub retry_attempt_name: Option<String>,
    /// Whether the attempt finished.
    #[serde(default)]
    pub done: bool,
    /// Whether the attempt finished successfully.
    #[serde(default)]
    pub success: bool,
    /// Whether a kill was requested.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Attempt parameters.
    #[serde(default)]
    pub params: Value,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// A session: one scheduled or manual invocation of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID.
    pub id: String,
    /// Owning project.
    #[serde(default)]
    pub project: ResourceRef,
    /// Workflow being run.
    #[serde(default)]
    pub workflow: ResourceRef,
    /// Session UUID.
    #[serde(default)]
    pub session_uuid: Option<String>,
    /// Logical session time, in the workflow's time zone.
    #[serde(default)]
    pub session_time: Option<DateTime<FixedOffset>>,
    /// Most recent attempt.
    #[serde(default)]
    pub last_attempt: Option<AttemptSummary>,
}

/// Response for list sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    /// Sessions.
    pub sessions: Vec<Session>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Attempts
// ─────────────────────────────────────────────────────────────────────────────

/// One execution of a session.
///
/// The server moves an attempt from pending through running to done;
/// `success` is meaningful once `done` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Attempt ID.
    pub id: String,
    /// Status as reported by the server.
    #[serde(default)]
    pub status: Option<String>,
    /// Retry index within the session.
    #[serde(default)]
    pub index: i32,
    /// Owning project.
    #[serde(default)]
    pub project: ResourceRef,
    /// Workflow being run.
    #[serde(default)]
    pub workflow: ResourceRef,
    /// Session ID.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Session UUID.
    #[serde(default)]
    pub session_uuid: Option<String>,
    /// Logical session time.
    #[serde(default)]
    pub session_time: Option<DateTime<FixedOffset>>,
    /// Name given to a retried attempt.
    #[serde(default)]
    pub retry_attempt_name: Option<String>,
    /// Whether the attempt finished.
    #[serde(default)]
    pub done: bool,
    /// Whether the attempt finished successfully.
    #[serde(default)]
    pub success: bool,
    /// Whether a kill was requested.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Attempt parameters.
    #[serde(default)]
    pub params: Value,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Attempt {
    /// Finished without error.
    pub fn succeeded(&self) -> bool {
        self.done && self.success
    }

    /// Finished with an error or was killed.
    pub fn failed(&self) -> bool {
        self.done && !self.success
    }
}

/// Response for list attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptList {
    /// Attempts.
    pub attempts: Vec<Attempt>,
}

/// How a retried attempt picks up the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    /// Rerun only the tasks that failed.
    Failed,
    /// Rerun starting at a named task.
    From,
}

/// Resume block of a retry request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    /// Attempt being resumed.
    pub attempt_id: String,
    /// Resume strategy.
    pub mode: ResumeMode,
    /// Task to restart from, with [`ResumeMode::From`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl Resume {
    /// Resume only the failed tasks of `attempt_id`.
    pub fn failed(attempt_id: impl Into<String>) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            mode: ResumeMode::Failed,
            from: None,
        }
    }

    /// Resume `attempt_id` starting at `task`.
    pub fn from_task(attempt_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            mode: ResumeMode::From,
            from: Some(task.into()),
        }
    }
}

/// Request to start (or retry) an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    /// Workflow to run.
    pub workflow_id: String,
    /// Logical session time.
    pub session_time: DateTime<FixedOffset>,
    /// Name for a retry; required by the server when the session already ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempt_name: Option<String>,
    /// Resume instructions for a retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<Resume>,
    /// Parameters passed to the workflow.
    #[serde(default = "empty_object")]
    pub params: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl StartAttemptRequest {
    /// Run `workflow_id` for `session_time` with no parameters.
    pub fn new(workflow_id: impl Into<String>, session_time: DateTime<FixedOffset>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            session_time,
            retry_attempt_name: None,
            resume: None,
            params: empty_object(),
        }
    }

    /// Replace the workflow parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Attach resume instructions.
    pub fn with_resume(mut self, resume: Resume) -> Self {
        self.resume = Some(resume);
        self
    }

    /// Set an explicit retry name.
    pub fn with_retry_name(mut self, name: impl Into<String>) -> Self {
        self.retry_attempt_name = Some(name.into());
        self
    }
}

/// A task within an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID.
    pub id: String,
    /// Fully qualified name, e.g. `+main+step1`.
    pub full_name: String,
    /// Parent task; `None` for the root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Task definition.
    #[serde(default)]
    pub config: Value,
    /// Tasks that must finish first.
    #[serde(default)]
    pub upstreams: Vec<String>,
    /// Task state (`planned`, `running`, `success`, `error`, ...).
    #[serde(default)]
    pub state: String,
    /// Whether a kill was requested.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Parameters exported to child tasks.
    #[serde(default)]
    pub export_params: Value,
    /// Parameters stored for later tasks.
    #[serde(default)]
    pub store_params: Value,
    /// Operator state.
    #[serde(default)]
    pub state_params: Value,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Scheduled retry time.
    #[serde(default)]
    pub retry_at: Option<DateTime<Utc>>,
    /// Start time.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Error document, if the task failed.
    #[serde(default)]
    pub error: Value,
    /// Whether this is a group of child tasks.
    #[serde(default)]
    pub is_group: bool,
}

/// Response for list tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    /// Tasks.
    pub tasks: Vec<Task>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Schedules
// ─────────────────────────────────────────────────────────────────────────────

/// A recurring trigger for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Schedule ID.
    pub id: String,
    /// Owning project.
    #[serde(default)]
    pub project: ResourceRef,
    /// Triggered workflow.
    #[serde(default)]
    pub workflow: ResourceRef,
    /// When the next attempt will start.
    #[serde(default)]
    pub next_run_time: Option<DateTime<Utc>>,
    /// Session time of the next attempt, in the workflow's time zone.
    #[serde(default)]
    pub next_schedule_time: Option<DateTime<FixedOffset>>,
    /// Set while the schedule is disabled.
    #[serde(default)]
    pub disabled_at: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Whether the schedule is currently disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }
}

/// Response for list schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleList {
    /// Schedules.
    pub schedules: Vec<Schedule>,
}

/// Request to re-enable a schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableScheduleRequest {
    /// Skip the runs missed while disabled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_schedule: bool,
    /// Local time to resume from, e.g. `2024-01-02 00:00:00`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_time: Option<String>,
}

/// Request to skip upcoming runs of a schedule.
///
/// Either `count` together with `from_time`, `next_time`, or `next_run_time`
/// must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipScheduleRequest {
    /// Number of runs to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Skip `count` runs starting here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_time: Option<DateTime<Utc>>,
    /// Skip until this local session time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_time: Option<String>,
    /// Skip until this run time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_time: Option<DateTime<Utc>>,
    /// Report the result without changing the schedule.
    #[serde(default)]
    pub dry_run: bool,
}

/// Request to backfill missed runs of a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    /// First session time to run.
    pub from_time: DateTime<Utc>,
    /// Retry name given to the created attempts.
    pub attempt_name: String,
    /// Maximum number of sessions to create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Report the sessions without creating them.
    #[serde(default)]
    pub dry_run: bool,
}

/// Attempts created by a backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAttempts {
    /// Schedule ID.
    pub id: String,
    /// Owning project.
    #[serde(default)]
    pub project: ResourceRef,
    /// Triggered workflow.
    #[serde(default)]
    pub workflow: ResourceRef,
    /// Created (or, on dry run, planned) attempts.
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logs
// ─────────────────────────────────────────────────────────────────────────────

/// A log file produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFile {
    /// File name, used to download the file.
    pub file_name: String,
    /// Compressed size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Task that wrote the file.
    #[serde(default)]
    pub task_name: String,
    /// Time the file was written.
    #[serde(default)]
    pub file_time: Option<DateTime<Utc>>,
    /// Agent that wrote the file.
    #[serde(default)]
    pub agent_id: String,
    /// Pre-signed direct download URL, when requested and supported.
    #[serde(default)]
    pub direct: Option<String>,
}

/// Response for list log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileList {
    /// Log files.
    pub files: Vec<LogFile>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Version
// ─────────────────────────────────────────────────────────────────────────────

/// Server version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVersion {
    /// Version string.
    pub version: String,
}

/// Result of a client compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    /// Server version.
    pub server_version: String,
    /// Whether the server recommends upgrading the client.
    #[serde(default)]
    pub upgrade_recommended: bool,
    /// Whether this client can talk to the server.
    #[serde(default)]
    pub api_compatible: bool,
}
