use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use tokio::{io::AsyncWriteExt, sync::mpsc};
use tracing::debug;

use super::{MediaFetcher, TransferProgress};
use crate::error::{Error, Result};

const FALLBACK_FILE_NAME: &str = "download.mp4";

/// Downloads a direct media URL over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_failed(e: impl std::fmt::Display) -> Error {
    Error::FetchFailed(e.to_string())
}

/// Local file name for `url`: its last non-empty path segment.
fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|s| *s != "." && *s != "..")
        .map_or_else(|| FALLBACK_FILE_NAME.to_string(), str::to_string)
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: mpsc::Sender<TransferProgress>,
    ) -> Result<PathBuf> {
        let url = Url::parse(url).map_err(|e| fetch_failed(format!("{url}: {e}")))?;
        let target = destination.join(file_name_for(&url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_failed)?;

        let byte_size = response.content_length();
        let mut stream = response.bytes_stream();
        let write_failed =
            |e: std::io::Error| fetch_failed(format!("writing {}: {e}", target.display()));
        let mut file = tokio::fs::File::create(&target).await.map_err(write_failed)?;

        let mut current_byte_size = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(fetch_failed)?;
            file.write_all(&chunk).await.map_err(write_failed)?;
            current_byte_size += chunk.len() as u64;
            let _ = progress.try_send(TransferProgress::new(byte_size, current_byte_size));
        }
        file.flush().await.map_err(write_failed)?;

        if current_byte_size == 0 {
            return Err(fetch_failed("server returned an empty body"));
        }

        let _ = progress
            .send(TransferProgress::new(byte_size, current_byte_size))
            .await;

        debug!("downloaded {current_byte_size} bytes to {}", target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn file_names() {
        let name = |u: &str| file_name_for(&Url::parse(u).unwrap());
        assert_eq!(name("https://example.com/media/clip.mp4"), "clip.mp4");
        assert_eq!(name("https://example.com/media/clip.mp4?x=1"), "clip.mp4");
        assert_eq!(name("https://example.com/media/"), "media");
        assert_eq!(name("https://example.com/"), FALLBACK_FILE_NAME);
    }

    /// Serves one HTTP response on a local port and returns the base URL.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}")
    }

    fn local_fetcher() -> HttpFetcher {
        HttpFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn downloads_with_progress() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello video",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let path = local_fetcher()
            .fetch(&format!("{base}/clip.mp4"), dir.path(), tx)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("clip.mp4"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello video");

        let mut last = None;
        while let Some(p) = rx.recv().await {
            last = Some(p);
        }
        assert_eq!(last, Some(TransferProgress::new(Some(11), 11)));
    }

    #[tokio::test]
    async fn error_status_fails() {
        let base = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);

        let result = local_fetcher()
            .fetch(&format!("{base}/missing.mp4"), dir.path(), tx)
            .await;
        assert!(matches!(result, Err(Error::FetchFailed(_))));
    }

    #[tokio::test]
    async fn unwritable_destination_fails() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello video",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);

        let result = local_fetcher()
            .fetch(&format!("{base}/clip.mp4"), &dir.path().join("missing"), tx)
            .await;
        match result {
            Err(e @ Error::FetchFailed(_)) => assert_eq!(e.exit_code(), 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);

        let result = local_fetcher().fetch("not a url", dir.path(), tx).await;
        assert!(matches!(result, Err(Error::FetchFailed(_))));
    }
}
