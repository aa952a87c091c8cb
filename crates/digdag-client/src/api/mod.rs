//! API endpoint implementations.

mod attempts;
mod logs;
mod projects;
mod schedules;
mod sessions;
mod version;
mod workflows;

pub use attempts::{AttemptsApi, ListAttemptsQuery};
pub use logs::LogsApi;
pub use projects::{
    DownloadOptions, ProjectSchedulesQuery, ProjectSessionsQuery, ProjectWorkflowsQuery,
    ProjectsApi,
};
pub use schedules::SchedulesApi;
pub use sessions::{PageQuery, SessionsApi};
pub use version::VersionApi;
pub use workflows::{ListWorkflowsQuery, WorkflowsApi};
