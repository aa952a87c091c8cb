//! Projects API, including revisions and secrets.

use std::path::Path;

use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Method};
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};
use uuid::Uuid;

use crate::archive::{self, Unpacked};
use crate::client::{decode, DigdagClient, NO_QUERY};
use crate::error::{Error, Result};
use crate::types::{
    Project, ProjectList, RevisionList, ScheduleList, SecretList, SecretValue, SessionList,
    WorkflowList,
};

/// Content type of project archives.
const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

#[derive(Debug, Default, serde::Serialize)]
struct ListProjectsQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Options for downloading a project archive.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DownloadOptions {
    /// Revision to fetch; the latest when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Ask the server to redirect to its storage backend.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub direct_download: bool,
}

/// Query parameters for listing a project's workflows.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ProjectWorkflowsQuery {
    /// Revision to list; the latest when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Only the workflow with this name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Query parameters for listing a project's schedules.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ProjectSchedulesQuery {
    /// Only schedules of this workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// Continue after this schedule ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
}

/// Query parameters for listing a project's sessions.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ProjectSessionsQuery {
    /// Only sessions of this workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// Continue after this session ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    /// Maximum number of sessions to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Projects API client.
pub struct ProjectsApi {
    client: DigdagClient,
}

impl ProjectsApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List projects, optionally only the one named `name`.
    pub async fn list(&self, name: Option<&str>) -> Result<ProjectList> {
        let query = ListProjectsQuery {
            name: name.filter(|n| !n.is_empty()),
        };
        self.client.get_with_query(&["projects"], &query).await
    }

    /// Find a project by exact name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Project>> {
        if name.is_empty() {
            return Err(Error::Validation("project name is required".to_string()));
        }
        let list = self.list(Some(name)).await?;
        Ok(list.projects.into_iter().find(|p| p.name == name))
    }

    /// Get a project by ID.
    pub async fn get(&self, id: &str) -> Result<Project> {
        self.client.get(&["projects", id]).await
    }

    /// Delete a project. The returned project carries `deleted_at`.
    pub async fn delete(&self, id: &str) -> Result<Project> {
        self.client.delete(&["projects", id]).await
    }

    /// Upload a `.tar.gz` archive as a new revision of `project_name`.
    ///
    /// A fresh revision name is generated for every upload. The file is
    /// streamed, not read into memory, under the client's stream timeout.
    pub async fn upload(&self, project_name: &str, archive: impl AsRef<Path>) -> Result<Project> {
        if project_name.is_empty() {
            return Err(Error::Validation("project name is required".to_string()));
        }

        let path = archive.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::filesystem(path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| Error::filesystem(path, e))?
            .len();

        let body = Body::wrap_stream(ReaderStream::new(file));
        self.put_archive(project_name, body, len).await
    }

    /// Pack the directory `dir` and upload it as a new revision of `project_name`.
    pub async fn push(&self, project_name: &str, dir: impl AsRef<Path>) -> Result<Project> {
        if project_name.is_empty() {
            return Err(Error::Validation("project name is required".to_string()));
        }

        let dir = dir.as_ref().to_path_buf();
        let packed = tokio::task::spawn_blocking(move || archive::pack_dir(&dir))
            .await
            .map_err(|e| Error::Archive(std::io::Error::other(e)))??;

        let len = packed.len() as u64;
        self.put_archive(project_name, Body::from(packed), len).await
    }

    async fn put_archive(&self, project_name: &str, body: Body, len: u64) -> Result<Project> {
        let revision = Uuid::new_v4().to_string();
        let query = [("project", project_name), ("revision", revision.as_str())];

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ARCHIVE_CONTENT_TYPE));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));

        tracing::debug!(project = project_name, %revision, bytes = len, "uploading project archive");
        let response = self
            .client
            .send_stream(Method::PUT, &["projects"], &query, Some(body), headers)
            .await?;
        decode(response).await
    }

    /// Download a project archive and unpack it into `dest`.
    ///
    /// `dest` is created if missing. The response is streamed straight into
    /// the extractor. The transfer is bounded by the client's stream timeout,
    /// not the regular request timeout.
    pub async fn download(
        &self,
        id: &str,
        options: &DownloadOptions,
        dest: impl AsRef<Path>,
    ) -> Result<Unpacked> {
        let response = self
            .client
            .send_stream(
                Method::GET,
                &["projects", id, "archive"],
                options,
                None,
                HeaderMap::new(),
            )
            .await?;

        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        let reader = SyncIoBridge::new(StreamReader::new(stream));
        let dest = dest.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || archive::unarchive(&dest, reader))
            .await
            .map_err(|e| Error::Archive(std::io::Error::other(e)))?
    }

    /// List uploaded revisions of a project.
    pub async fn revisions(&self, id: &str) -> Result<RevisionList> {
        self.client.get(&["projects", id, "revisions"]).await
    }

    /// List workflows defined in a project.
    pub async fn workflows(&self, id: &str, query: &ProjectWorkflowsQuery) -> Result<WorkflowList> {
        self.client
            .get_with_query(&["projects", id, "workflows"], query)
            .await
    }

    /// List schedules of a project.
    pub async fn schedules(&self, id: &str, query: &ProjectSchedulesQuery) -> Result<ScheduleList> {
        self.client
            .get_with_query(&["projects", id, "schedules"], query)
            .await
    }

    /// List sessions of a project.
    pub async fn sessions(&self, id: &str, query: &ProjectSessionsQuery) -> Result<SessionList> {
        self.client
            .get_with_query(&["projects", id, "sessions"], query)
            .await
    }

    /// List the keys of a project's secrets.
    pub async fn secrets(&self, id: &str) -> Result<SecretList> {
        self.client.get(&["projects", id, "secrets"]).await
    }

    /// Store a secret. The value can not be read back.
    pub async fn put_secret(&self, id: &str, key: &str, value: impl Into<String>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Validation("secret key is required".to_string()));
        }
        let body = SecretValue {
            value: value.into(),
        };
        let (body, headers) = crate::client::json_body(&body)?;
        self.client
            .send(
                Method::PUT,
                &["projects", id, "secrets", key],
                NO_QUERY,
                Some(body),
                headers,
            )
            .await?;
        Ok(())
    }

    /// Delete a secret.
    pub async fn delete_secret(&self, id: &str, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Validation("secret key is required".to_string()));
        }
        self.client
            .delete_empty(&["projects", id, "secrets", key])
            .await
    }
}
