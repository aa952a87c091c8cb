//! Logs API.

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::client::{DigdagClient, NO_QUERY};
use crate::error::{Error, Result};
use crate::types::LogFileList;

#[derive(Debug, serde::Serialize)]
struct LogFilesQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    direct_download: bool,
}

/// Logs API client.
pub struct LogsApi {
    client: DigdagClient,
}

impl LogsApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// List log files of an attempt, optionally only those of `task`.
    pub async fn files(
        &self,
        attempt_id: &str,
        task: Option<&str>,
        direct_download: bool,
    ) -> Result<LogFileList> {
        let query = LogFilesQuery {
            task: task.filter(|t| !t.is_empty()),
            direct_download,
        };
        self.client
            .get_with_query(&["logs", attempt_id, "files"], &query)
            .await
    }

    /// Download one log file as stored (gzip-compressed).
    pub async fn download_file(&self, attempt_id: &str, file_name: &str) -> Result<Vec<u8>> {
        if file_name.is_empty() {
            return Err(Error::Validation("log file name is required".to_string()));
        }
        let response = self
            .client
            .send_stream(
                Method::GET,
                &["logs", attempt_id, "files", file_name],
                NO_QUERY,
                None,
                HeaderMap::new(),
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download one log file and decompress it to text.
    pub async fn read_file(&self, attempt_id: &str, file_name: &str) -> Result<String> {
        let compressed = self.download_file(attempt_id, file_name).await?;
        let mut text = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut text)
            .map_err(Error::Archive)?;
        Ok(text)
    }
}
