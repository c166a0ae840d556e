//! HTTP client wrapper for downloading media files.
//!
//! This module provides the `HttpClient` struct which streams response bodies
//! to disk with connect/read timeouts and structured errors. Bodies land in a
//! temporary file first and are renamed into place when complete.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent::MEDIA_USER_AGENT;

/// HTTP client for downloading files with streaming support.
///
/// Create once and clone into download tasks; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use post_archiver::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let bytes = client
///     .download_to_path("https://i.redd.it/abc123.jpg", Path::new("./media_files/abc123.jpg"))
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(MEDIA_USER_AGENT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Downloads `url` to exactly `file_path`, overwriting any existing file.
    ///
    /// The body is streamed into a temporary file next to `file_path` and
    /// renamed onto it only once complete, so concurrent downloads to the same
    /// path never interleave and the last to finish wins. A failed transfer
    /// removes only its own temporary file.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a non-2xx status
    /// - Writing to disk fails
    #[instrument(skip(self), fields(url = %url, path = %file_path.display()))]
    pub async fn download_to_path(&self, url: &str, file_path: &Path) -> Result<u64, DownloadError> {
        debug!("starting download");

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let dir = file_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (std_file, temp_path) = NamedTempFile::new_in(dir)
            .map_err(|e| DownloadError::io(file_path, e))?
            .into_parts();
        let mut file = File::from_std(std_file);

        let bytes_written = match stream_to_file(&mut file, response, url, file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Dropping the temp path deletes the partial body.
                debug!(temp = %temp_path.display(), "discarding partial download");
                return Err(e);
            }
        };
        drop(file);

        temp_path
            .persist(file_path)
            .map_err(|e| DownloadError::io(file_path, e.error))?;

        debug!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// Streams response body to file in fixed-size buffered chunks.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_to_path_writes_body() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/abc.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg bytes"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let target = temp_dir.path().join("abc.jpg");
        let url = format!("{}/abc.jpg", mock_server.uri());

        let written = client.download_to_path(&url, &target).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_download_overwrites_existing_file() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("same.png");
        std::fs::write(&target, b"old content that is longer").unwrap();

        Mock::given(method("GET"))
            .and(path("/same.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/same.png", mock_server.uri());
        client.download_to_path(&url, &target).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_download_404_returns_http_status() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.gif"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let target = temp_dir.path().join("missing.gif");
        let url = format!("{}/missing.gif", mock_server.uri());

        match client.download_to_path(&url, &target).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        assert!(!target.exists(), "no file should be created for error status");
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::new();

        let result = client
            .download_to_path("not-a-valid-url", &temp_dir.path().join("x"))
            .await;

        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_download_missing_directory_is_io_error() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let target = temp_dir.path().join("does-not-exist").join("a.jpg");
        let url = format!("{}/a.jpg", mock_server.uri());

        let result = client.download_to_path(&url, &target).await;
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }

    #[tokio::test]
    async fn test_download_sends_browser_user_agent() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        // The `header` matcher splits values on commas, which the agent contains.
        Mock::given(method("GET"))
            .and(path("/ua.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/ua.png", mock_server.uri());
        client
            .download_to_path(&url, &temp_dir.path().join("ua.png"))
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let agent = requests[0].headers.get("user-agent").unwrap();
        assert_eq!(agent.to_str().unwrap(), MEDIA_USER_AGENT);
    }

    #[tokio::test]
    async fn test_download_leaves_no_temp_files() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/done.gif"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gif"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/done.gif", mock_server.uri());
        client
            .download_to_path(&url, &temp_dir.path().join("done.gif"))
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("done.gif")]);
    }

    #[tokio::test]
    async fn test_download_large_file_streams() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let large_content = vec![7u8; 1024 * 1024];

        Mock::given(method("GET"))
            .and(path("/large.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(large_content))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let target = temp_dir.path().join("large.mp4");
        let url = format!("{}/large.mp4", mock_server.uri());

        let written = client.download_to_path(&url, &target).await.unwrap();
        assert_eq!(written, 1024 * 1024);
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 1024 * 1024);
    }
}
