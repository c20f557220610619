//! Archive download with inactivity timeout

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::error::TransportError;
use crate::release::RetryPolicy;

const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300); // 5 min no data

/// Stream `url` into `target`, returning the number of bytes written.
///
/// Waiting for the response headers and for each body chunk is bounded by
/// the same inactivity timeout. Only failures before the first byte is
/// written are retried.
pub async fn download_to(
    client: &reqwest::Client,
    retry: RetryPolicy,
    url: &str,
    target: &Path,
) -> Result<u64, TransportError> {
    download_with_timeout(client, retry, url, target, DOWNLOAD_INACTIVITY_TIMEOUT).await
}

async fn download_with_timeout(
    client: &reqwest::Client,
    retry: RetryPolicy,
    url: &str,
    target: &Path,
    inactivity: Duration,
) -> Result<u64, TransportError> {
    let response = retry
        .run("archive download", move || async move {
            let response = timeout(inactivity, client.get(url).send())
                .await
                .map_err(|_| TransportError::Stalled(inactivity.as_secs()))??;
            if !response.status().is_success() {
                return Err(TransportError::Status(response.status()));
            }
            Ok(response)
        })
        .await?;

    let mut file = tokio::fs::File::create(target).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    loop {
        let chunk = match timeout(inactivity, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => break,
            Err(_) => return Err(TransportError::Stalled(inactivity.as_secs())),
        };
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;

    debug!("downloaded {downloaded} bytes from {url}");
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn writes_body_to_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/demo.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive");
        let written = download_to(
            &reqwest::Client::new(),
            RetryPolicy::none(),
            &format!("{}/demo.zip", server.uri()),
            &target,
        )
        .await
        .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&target).unwrap(), b"archive-bytes");
    }

    #[tokio::test]
    async fn error_status_is_not_written() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive");
        let err = download_to(&reqwest::Client::new(), RetryPolicy::none(), &server.uri(), &target)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status(s) if s.as_u16() == 404));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn stalls_when_headers_never_arrive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive");
        let started = std::time::Instant::now();
        let err = download_with_timeout(
            &reqwest::Client::new(),
            RetryPolicy::none(),
            &server.uri(),
            &target,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransportError::Stalled(1)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn retries_server_errors_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let retry = RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let written = download_with_timeout(
            &reqwest::Client::new(),
            retry,
            &server.uri(),
            &dir.path().join("archive"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(written, 2);
    }
}
