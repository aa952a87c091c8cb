//! HTTP client for the Digdag workflow server REST API.
//!
//! This crate provides a typed client for projects, workflows, sessions,
//! attempts, schedules, secrets, logs and the server version endpoints.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use digdag_client::{DigdagClient, Result, StartAttemptRequest};
//!
//! # async fn example() -> Result<()> {
//! let client = DigdagClient::builder()
//!     .base_url("https://api-workflow.treasuredata.com/api")
//!     .access_token("secret")
//!     .build()?;
//!
//! // Upload a project archive as a new revision
//! let project = client.projects().upload("demo", "demo.tar.gz").await?;
//!
//! // Run one of its workflows now
//! let workflows = client
//!     .projects()
//!     .workflows(&project.id, &Default::default())
//!     .await?;
//! let request = StartAttemptRequest::new(&workflows.workflows[0].id, Utc::now().fixed_offset());
//! let attempt = client.attempts().start(&request).await?;
//! println!("started attempt {}", attempt.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every non-2xx response becomes [`Error::Service`], with the message taken
//! from the server's error list or, failing that, the status line. Nothing
//! is retried.
//!
//! # Cancellation
//!
//! Each operation awaits a single request. Dropping the future cancels it.
//! The builder's `timeout` bounds every request, body included, except
//! archive transfers and log file downloads, which use `stream_timeout`.

pub mod api;
pub mod archive;
pub mod client;
pub mod error;
pub mod types;

pub use archive::Unpacked;
pub use client::{classify, decode, ClientBuilder, DigdagClient, AUTH_SCHEME, NO_QUERY};
pub use error::{Error, Result};
pub use types::*;

// Re-export API types that are commonly used with query methods
pub use api::{
    DownloadOptions, ListAttemptsQuery, ListWorkflowsQuery, PageQuery, ProjectSchedulesQuery,
    ProjectSessionsQuery, ProjectWorkflowsQuery,
};
