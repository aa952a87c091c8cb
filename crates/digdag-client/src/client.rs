//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Body, Method, Request, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{
    AttemptsApi, LogsApi, ProjectsApi, SchedulesApi, SessionsApi, VersionApi, WorkflowsApi,
};
use crate::error::{service_message, Error, Result};

/// Scheme prefix of the `Authorization` header.
pub const AUTH_SCHEME: &str = "TD1";

/// Environment variable holding the server endpoint.
pub const ENDPOINT_ENV: &str = "DIGDAG_ENDPOINT";

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "DIGDAG_TOKEN";

/// Fallback token variable used by Treasure Data tooling.
const TD_TOKEN_ENV: &str = "TD_API_KEY";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for archive and log file transfers.
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Empty query string for [`DigdagClient::build_request`].
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Digdag REST API client.
///
/// Cheap to clone; clones share one connection pool and immutable settings.
///
/// # Example
///
/// ```no_run
/// use digdag_client::DigdagClient;
///
/// # async fn example() -> digdag_client::Result<()> {
/// let client = DigdagClient::builder()
///     .base_url("https://api-workflow.treasuredata.com/api")
///     .access_token("secret")
///     .build()?;
///
/// let projects = client.projects().list(Some("demo")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DigdagClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    authorization: HeaderValue,
    timeout: Duration,
    stream_timeout: Duration,
}

impl std::fmt::Debug for DigdagClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigdagClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("stream_timeout", &self.inner.stream_timeout)
            .finish_non_exhaustive()
    }
}

impl DigdagClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the projects API (also revisions and secrets).
    pub fn projects(&self) -> ProjectsApi {
        ProjectsApi::new(self.clone())
    }

    /// Access the workflows API.
    pub fn workflows(&self) -> WorkflowsApi {
        WorkflowsApi::new(self.clone())
    }

    /// Access the sessions API.
    pub fn sessions(&self) -> SessionsApi {
        SessionsApi::new(self.clone())
    }

    /// Access the attempts API.
    pub fn attempts(&self) -> AttemptsApi {
        AttemptsApi::new(self.clone())
    }

    /// Access the schedules API.
    pub fn schedules(&self) -> SchedulesApi {
        SchedulesApi::new(self.clone())
    }

    /// Access the logs API.
    pub fn logs(&self) -> LogsApi {
        LogsApi::new(self.clone())
    }

    /// Access the server version API.
    pub fn version(&self) -> VersionApi {
        VersionApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request pipeline
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve path segments relative to the base URL.
    ///
    /// Each segment is pushed whole and percent-encoded, so a `/` inside an
    /// ID or key stays part of that segment. Empty segments are dropped.
    pub(crate) fn url(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config("base URL cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            for segment in path.iter().filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// Build an authenticated request without sending it.
    ///
    /// `path` is split on `/`; empty segments never produce `//`. Only GET,
    /// PUT, POST and DELETE are accepted. The query is serialized as-is;
    /// callers leave out the parameters they do not want sent.
    pub fn build_request<Q>(
        &self,
        method: Method,
        path: &str,
        query: &Q,
        body: Option<Body>,
        headers: HeaderMap,
    ) -> Result<Request>
    where
        Q: Serialize + ?Sized,
    {
        let segments: Vec<&str> = path.split('/').collect();
        self.request(method, &segments, query, body, headers, self.inner.timeout)
    }

    fn request<Q>(
        &self,
        method: Method,
        path: &[&str],
        query: &Q,
        body: Option<Body>,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Request>
    where
        Q: Serialize + ?Sized,
    {
        if !matches!(
            method,
            Method::GET | Method::PUT | Method::POST | Method::DELETE
        ) {
            return Err(Error::Config(format!("unsupported HTTP method: {method}")));
        }

        let url = self.url(path)?;
        let mut builder = self
            .inner
            .http
            .request(method, url)
            .query(query)
            .headers(headers)
            .header(AUTHORIZATION, self.inner.authorization.clone())
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(builder.build()?)
    }

    /// Send a request and map non-2xx statuses to [`Error::Service`].
    pub(crate) async fn execute(&self, request: Request) -> Result<Response> {
        tracing::debug!(
            method = %request.method(),
            path = %request.url().path(),
            "sending request"
        );
        let response = self.inner.http.execute(request).await?;
        classify(response).await
    }

    /// Build, send and classify in one step, returning the raw response.
    pub(crate) async fn send<Q>(
        &self,
        method: Method,
        path: &[&str],
        query: &Q,
        body: Option<Body>,
        headers: HeaderMap,
    ) -> Result<Response>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.request(method, path, query, body, headers, self.inner.timeout)?;
        self.execute(request).await
    }

    /// Like [`send`](Self::send), bounded by the stream timeout instead.
    ///
    /// Used where the body is an archive or log file that may take longer
    /// than the regular timeout to transfer.
    pub(crate) async fn send_stream<Q>(
        &self,
        method: Method,
        path: &[&str],
        query: &Q,
        body: Option<Body>,
        headers: HeaderMap,
    ) -> Result<Response>
    where
        Q: Serialize + ?Sized,
    {
        let request = self.request(
            method,
            path,
            query,
            body,
            headers,
            self.inner.stream_timeout,
        )?;
        self.execute(request).await
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        self.get_with_query(path, NO_QUERY).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &[&str], query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .send(Method::GET, path, query, None, HeaderMap::new())
            .await?;
        decode(response).await
    }

    /// Make a POST request with a JSON body.
    pub(crate) async fn post<T, B>(&self, path: &[&str], body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (body, headers) = json_body(body)?;
        let response = self
            .send(Method::POST, path, NO_QUERY, Some(body), headers)
            .await?;
        decode(response).await
    }

    /// Make a POST request without a body.
    pub(crate) async fn post_empty(&self, path: &[&str]) -> Result<Response> {
        self.send(Method::POST, path, NO_QUERY, None, HeaderMap::new())
            .await
    }

    /// Make a PUT request with a JSON body.
    pub(crate) async fn put<T, B>(&self, path: &[&str], body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (body, headers) = json_body(body)?;
        let response = self
            .send(Method::PUT, path, NO_QUERY, Some(body), headers)
            .await?;
        decode(response).await
    }

    /// Make a DELETE request, decoding the response body.
    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let response = self
            .send(Method::DELETE, path, NO_QUERY, None, HeaderMap::new())
            .await?;
        decode(response).await
    }

    /// Make a DELETE request, discarding the response body.
    pub(crate) async fn delete_empty(&self, path: &[&str]) -> Result<()> {
        self.send(Method::DELETE, path, NO_QUERY, None, HeaderMap::new())
            .await?;
        Ok(())
    }
}

/// Map a response to success (2xx) or [`Error::Service`].
///
/// On failure the body is drained and parsed as the server's error list;
/// when that yields nothing the status line becomes the message.
pub async fn classify(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = service_message(status, &body);
    tracing::debug!(status = status.as_u16(), %message, "request failed");
    Err(Error::Service {
        status: status.as_u16(),
        message,
    })
}

/// Decode a JSON response body into `T`, consuming the response.
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

pub(crate) fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<(Body, HeaderMap)> {
    let bytes = serde_json::to_vec(body)?;
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok((Body::from(bytes), headers))
}

/// Builder for creating a [`DigdagClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
    stream_timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            user_agent: None,
        }
    }

    /// Create a builder seeded from the environment.
    ///
    /// Reads [`ENDPOINT_ENV`] and [`TOKEN_ENV`], falling back to `TD_API_KEY`
    /// for the token. Missing variables are left unset.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Ok(url) = std::env::var(ENDPOINT_ENV) {
            builder = builder.base_url(url);
        }
        if let Some(token) = std::env::var(TOKEN_ENV)
            .ok()
            .or_else(|| std::env::var(TD_TOKEN_ENV).ok())
        {
            builder = builder.access_token(token);
        }
        builder
    }

    /// Set the base URL for the server (including any `/api` prefix).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    ///
    /// Covers the whole exchange, body included, for every request except
    /// archive uploads, archive downloads and log file downloads.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout for archive and log file transfers (default 300 s).
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<DigdagClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("access_token is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut authorization = HeaderValue::from_str(&format!("{AUTH_SCHEME} {token}"))
            .map_err(|_| Error::Config("Invalid access token".to_string()))?;
        authorization.set_sensitive(true);

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("digdag-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(DigdagClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                authorization,
                timeout: self.timeout,
                stream_timeout: self.stream_timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> DigdagClient {
        ClientBuilder::new()
            .base_url(base)
            .access_token("secret")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().access_token("secret").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_requires_token() {
        let result = ClientBuilder::new().base_url("http://localhost:65432").build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = ClientBuilder::new()
            .base_url("http://localhost:65432")
            .access_token("")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = ClientBuilder::new()
            .base_url("not a url")
            .access_token("secret")
            .build();
        let err = result.unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        assert_eq!(
            client("http://localhost:65432/api").base_url().as_str(),
            "http://localhost:65432/api/"
        );
        assert_eq!(
            client("http://localhost:65432/api/").base_url().as_str(),
            "http://localhost:65432/api/"
        );
    }

    #[test]
    fn test_url_building() {
        let client = client("http://localhost:65432/api");

        let url = client.url(&["projects"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:65432/api/projects");

        let url = client.url(&["projects", "1", "", "archive"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:65432/api/projects/1/archive");
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = client("http://localhost:65432/");
        let url = client.url(&["projects", "1", "secrets", "my key?"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:65432/projects/1/secrets/my%20key%3F"
        );
    }

    #[test]
    fn test_url_keeps_slash_inside_segment() {
        let client = client("http://localhost:65432/api");
        let url = client.url(&["projects", "1", "secrets", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:65432/api/projects/1/secrets/a%2Fb"
        );
    }

    #[test]
    fn test_build_request_path_drops_empty_segments() {
        let client = client("http://localhost:65432/api");
        let request = client
            .build_request(Method::GET, "/projects/1//archive/", NO_QUERY, None, HeaderMap::new())
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:65432/api/projects/1/archive");
    }

    #[test]
    fn test_builder_stream_timeout() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:65432")
            .access_token("secret")
            .timeout(Duration::from_secs(2))
            .stream_timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(client.inner.timeout, Duration::from_secs(2));
        assert_eq!(client.inner.stream_timeout, Duration::from_secs(60));

        let client = ClientBuilder::new()
            .base_url("http://localhost:65432")
            .access_token("secret")
            .build()
            .unwrap();
        assert_eq!(client.inner.stream_timeout, DEFAULT_STREAM_TIMEOUT);
    }

    #[test]
    fn test_build_request_for_supported_methods() {
        let client = client("http://localhost:65432/api/");
        for method in [Method::GET, Method::PUT, Method::POST, Method::DELETE] {
            let request = client
                .build_request(method.clone(), "/projects", NO_QUERY, None, HeaderMap::new())
                .unwrap();
            assert_eq!(*request.method(), method);
            assert_eq!(request.url().path(), "/api/projects");
            assert_eq!(request.headers()[AUTHORIZATION], "TD1 secret");
        }
    }

    #[test]
    fn test_build_request_rejects_other_methods() {
        let client = client("http://localhost:65432/");
        for method in [Method::PATCH, Method::HEAD, Method::OPTIONS] {
            let result = client.build_request(method, "projects", NO_QUERY, None, HeaderMap::new());
            assert!(matches!(result, Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_build_request_query_and_headers() {
        let client = client("http://localhost:65432/");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/gzip"));
        let request = client
            .build_request(
                Method::PUT,
                "projects",
                &[("project", "demo"), ("revision", "r1")],
                Some(Body::from(vec![1u8, 2, 3])),
                headers,
            )
            .unwrap();

        assert_eq!(request.url().query(), Some("project=demo&revision=r1"));
        assert_eq!(request.headers()[CONTENT_TYPE], "application/gzip");
        assert!(request.body().is_some());
    }

    #[test]
    fn test_build_request_without_query_has_no_question_mark() {
        let client = client("http://localhost:65432/");
        let request = client
            .build_request(Method::GET, "version", NO_QUERY, None, HeaderMap::new())
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:65432/version");
    }
}
