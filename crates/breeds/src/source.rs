use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;
use url::Url;

/// Breed API queried in remote mode unless overridden.
pub const DEFAULT_BREED_ENDPOINT: &str = "https://api.petsite.fake/breeds";

/// Upper bound on the breed payload, in bytes, for both modes.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1000;

/// Timeout applied to the HTTP client used for remote fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Origin of the breed payload, chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreedSource {
    Remote(Url),
    Fixture(PathBuf),
}

impl BreedSource {
    /// Remote source pointing at [`DEFAULT_BREED_ENDPOINT`].
    pub fn default_remote() -> Result<Self, BreedSourceError> {
        Ok(Self::Remote(Url::parse(DEFAULT_BREED_ENDPOINT)?))
    }

    /// Remote source for an explicit endpoint.
    pub fn remote(endpoint: &str) -> Result<Self, BreedSourceError> {
        Ok(Self::Remote(Url::parse(endpoint)?))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::Fixture(_) => "fixture",
        }
    }

    /// Human readable location for logs.
    pub fn location(&self) -> String {
        match self {
            Self::Remote(url) => url.to_string(),
            Self::Fixture(path) => path.display().to_string(),
        }
    }
}

/// Reads raw breed payloads from a [`BreedSource`].
///
/// The fetcher never retries and never caches; every call performs exactly one
/// file read or one HTTP request.
#[derive(Clone)]
pub struct BreedFetcher {
    http: Client,
    max_bytes: usize,
}

impl BreedFetcher {
    /// Creates a fetcher around an existing HTTP client.
    pub fn new(http: Client) -> Self {
        Self {
            http,
            max_bytes: MAX_PAYLOAD_BYTES,
        }
    }

    /// Creates a fetcher whose client times out after [`FETCH_TIMEOUT`].
    pub fn with_default_client() -> Result<Self, BreedSourceError> {
        let http = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(BreedSourceError::Client)?;
        Ok(Self::new(http))
    }

    /// Overrides the payload cap.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Returns the payload bytes for `source`.
    pub async fn fetch(&self, source: &BreedSource) -> Result<Vec<u8>, BreedSourceError> {
        match source {
            BreedSource::Remote(url) => self.fetch_remote(url).await,
            BreedSource::Fixture(path) => self.read_fixture(path).await,
        }
    }

    async fn read_fixture(&self, path: &Path) -> Result<Vec<u8>, BreedSourceError> {
        let file = File::open(path)
            .await
            .map_err(|source| BreedSourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(stage = "catalog", file = %path.display(), "loading breed data from fixture");

        // One byte past the cap distinguishes "exactly at the limit" from "over it".
        let mut reader = file.take(self.max_bytes as u64 + 1);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|source| BreedSourceError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if body.len() > self.max_bytes {
            return Err(BreedSourceError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(body)
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>, BreedSourceError> {
        debug!(stage = "catalog", %url, "requesting breed data");
        let mut response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BreedSourceError::Status { status });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(BreedSourceError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(BreedSourceError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Errors raised when the breed payload cannot be obtained.
#[derive(Debug, Error)]
pub enum BreedSourceError {
    #[error("invalid breed endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("unable to open fixture {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("unable to read fixture {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to retrieve breeds: {0}")]
    Http(#[from] reqwest::Error),
    #[error("breed endpoint returned status {status}")]
    Status { status: StatusCode },
    #[error("breed payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    const BREEDS: &str = r#"[{"id":"b1","name":"Labrador"}]"#;

    fn fixture(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    fn fetcher() -> BreedFetcher {
        BreedFetcher::with_default_client().expect("client")
    }

    #[tokio::test]
    async fn reads_fixture_file() {
        let file = fixture(BREEDS.as_bytes());
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let body = fetcher().fetch(&source).await.expect("fixture read");
        assert_eq!(body, BREEDS.as_bytes());
    }

    #[tokio::test]
    async fn missing_fixture_is_unavailable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = BreedSource::Fixture(dir.path().join("missing.json"));

        let err = fetcher().fetch(&source).await.expect_err("should fail");
        assert!(matches!(err, BreedSourceError::Open { .. }));
    }

    #[tokio::test]
    async fn fixture_at_limit_is_accepted() {
        let file = fixture(&[b' '; 32]);
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let body = fetcher()
            .with_max_bytes(32)
            .fetch(&source)
            .await
            .expect("fixture read");
        assert_eq!(body.len(), 32);
    }

    #[tokio::test]
    async fn oversized_fixture_is_rejected() {
        let file = fixture(&[b' '; 33]);
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let err = fetcher()
            .with_max_bytes(32)
            .fetch(&source)
            .await
            .expect_err("should fail");
        assert!(matches!(err, BreedSourceError::PayloadTooLarge { limit: 32 }));
    }

    #[tokio::test]
    async fn fetches_remote_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/breeds");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(BREEDS);
            })
            .await;

        let source = BreedSource::remote(&server.url("/breeds")).expect("url");
        let body = fetcher().fetch(&source).await.expect("remote fetch");
        mock.assert_async().await;

        assert_eq!(body, BREEDS.as_bytes());
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/breeds");
                then.status(503).body("maintenance");
            })
            .await;

        let source = BreedSource::remote(&server.url("/breeds")).expect("url");
        let err = fetcher().fetch(&source).await.expect_err("should fail");
        match err {
            BreedSourceError::Status { status } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_remote_body_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/breeds");
                then.status(200).body(BREEDS);
            })
            .await;

        let source = BreedSource::remote(&server.url("/breeds")).expect("url");
        let err = fetcher()
            .with_max_bytes(8)
            .fetch(&source)
            .await
            .expect_err("should fail");
        assert!(matches!(err, BreedSourceError::PayloadTooLarge { limit: 8 }));
    }

    /// Serves one chunked response (no content-length) and returns its URL.
    async fn serve_chunked_once(chunks: &'static [&'static str]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let mut response = String::from(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            );
            for chunk in chunks {
                response.push_str(&format!("{:x}\r\n{chunk}\r\n", chunk.len()));
            }
            response.push_str("0\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/breeds")
    }

    #[tokio::test]
    async fn chunked_remote_body_is_assembled() {
        let url = serve_chunked_once(&[r#"[{"id":"b1","#, r#""name":"Labrador"}]"#]).await;
        let source = BreedSource::remote(&url).expect("url");

        let body = fetcher()
            .with_max_bytes(BREEDS.len())
            .fetch(&source)
            .await
            .expect("remote fetch");
        assert_eq!(body, BREEDS.as_bytes());
    }

    #[tokio::test]
    async fn chunked_remote_body_over_limit_is_rejected() {
        let url = serve_chunked_once(&[r#"[{"id":"b1","#, r#""name":"Labrador"}]"#]).await;
        let source = BreedSource::remote(&url).expect("url");

        let err = fetcher()
            .with_max_bytes(BREEDS.len() - 1)
            .fetch(&source)
            .await
            .expect_err("should fail");
        assert!(matches!(err, BreedSourceError::PayloadTooLarge { limit } if limit == BREEDS.len() - 1));
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/breeds");
                then.status(200)
                    .body(BREEDS)
                    .delay(Duration::from_millis(500));
            })
            .await;

        let http = Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .expect("client");
        let source = BreedSource::remote(&server.url("/breeds")).expect("url");
        let err = BreedFetcher::new(http)
            .fetch(&source)
            .await
            .expect_err("should time out");
        assert!(matches!(err, BreedSourceError::Http(ref inner) if inner.is_timeout()));
    }

    #[test]
    fn default_remote_uses_builtin_endpoint() {
        let source = BreedSource::default_remote().expect("default endpoint parses");
        assert_eq!(source.mode(), "remote");
        assert_eq!(source.location(), DEFAULT_BREED_ENDPOINT);
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let err = BreedSource::remote("not a url").expect_err("should fail");
        assert!(matches!(err, BreedSourceError::Url(_)));
    }
}
