//! Server version API.

use crate::client::DigdagClient;
use crate::error::{Error, Result};
use crate::types::{Compatibility, ServerVersion};

/// Version API client.
pub struct VersionApi {
    client: DigdagClient,
}

impl VersionApi {
    pub(crate) fn new(client: DigdagClient) -> Self {
        Self { client }
    }

    /// Get the server version.
    pub async fn get(&self) -> Result<ServerVersion> {
        self.client.get(&["version"]).await
    }

    /// Ask the server whether `client_version` is compatible with it.
    pub async fn check(&self, client_version: &str) -> Result<Compatibility> {
        if client_version.is_empty() {
            return Err(Error::Validation(
                "client version must be specified".to_string(),
            ));
        }
        self.client
            .get_with_query(&["version", "check"], &[("client", client_version)])
            .await
    }
}
