//! Timeout behaviour for slow response bodies.

use std::io::Write;
use std::time::Duration;

use digdag_client::{DigdagClient, DownloadOptions, Error};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one response whose body arrives in `chunks` pieces, `delay` apart.
///
/// Returns the base URL (with `/api` prefix) of the server.
async fn serve_trickled(
    content_type: &'static str,
    body: Vec<u8>,
    chunks: usize,
    delay: Duration,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !received.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            received.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        let size = body.len().div_ceil(chunks);
        for chunk in body.chunks(size) {
            tokio::time::sleep(delay).await;
            if socket.write_all(chunk).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
    });

    format!("http://{addr}/api")
}

fn client(base_url: String) -> DigdagClient {
    DigdagClient::builder()
        .base_url(base_url)
        .access_token("secret")
        .timeout(Duration::from_millis(500))
        .stream_timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

fn project_archive(entries: usize) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::none()));
    for i in 0..entries {
        // Uncompressed padding keeps every chunk boundary inside the entries.
        let data = vec![b'a' + i as u8; 2048];
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, format!("queries/q{i}.sql"), &data[..])
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn test_slow_archive_download_uses_stream_timeout() {
    let base_url = serve_trickled(
        "application/gzip",
        project_archive(4),
        4,
        Duration::from_millis(300),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let unpacked = client(base_url)
        .projects()
        .download("12", &DownloadOptions::default(), dir.path())
        .await
        .unwrap();

    assert_eq!(unpacked.files, 4);
    assert_eq!(
        std::fs::read(dir.path().join("queries/q3.sql")).unwrap(),
        vec![b'd'; 2048]
    );
}

#[tokio::test]
async fn test_slow_log_download_uses_stream_timeout() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::none());
    encoder.write_all(&[b'x'; 4096]).unwrap();
    let log = encoder.finish().unwrap();

    let base_url = serve_trickled("application/gzip", log, 3, Duration::from_millis(300)).await;

    let text = client(base_url)
        .logs()
        .read_file("a1", "+main@abc.0.log.gz")
        .await
        .unwrap();
    assert_eq!(text.len(), 4096);
}

#[tokio::test]
async fn test_slow_json_body_hits_request_timeout() {
    let body = br#"{"version":"0.10.5"}"#.to_vec();
    let base_url = serve_trickled("application/json", body, 4, Duration::from_millis(300)).await;

    let err = client(base_url).version().get().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
}
