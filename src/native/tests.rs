//! Tests for the native HTTP fetcher.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, PublisherQuirk, RetryConfig};
use crate::error::FetchFailure;
use crate::progress::ProgressRegistry;
use crate::session::Session;

use super::NativeFetcher;

fn test_config() -> Config {
    let mut config = Config::default();
    config.http.user_agent = "scifetch-test/1.0".to_string();
    config.retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

fn fetcher(config: &Config) -> (NativeFetcher, ProgressRegistry) {
    let session = Arc::new(Session::new(&config.http).unwrap());
    let progress = ProgressRegistry::hidden();
    let fetcher = NativeFetcher::new(session, progress.clone(), config).unwrap();
    (fetcher, progress)
}

// -----------------------------------------------------------------------
// Plain transfers
// -----------------------------------------------------------------------

#[tokio::test]
async fn ok_response_is_streamed_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/GSE1000.txt.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64 * 1024]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("nested").join("GSE1000.txt.gz");
    let (fetcher, progress) = fetcher(&test_config());

    fetcher
        .fetch(&format!("{}/files/GSE1000.txt.gz", server.uri()), &dest, false)
        .await
        .unwrap();

    let written = std::fs::read(&dest).unwrap();
    assert_eq!(written.len(), 64 * 1024);
    assert!(written.iter().all(|b| *b == 7));
    assert_eq!(progress.active(), 0, "bar must be released after completion");
}

#[tokio::test]
async fn request_carries_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper"))
        .and(header("user-agent", "scifetch-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fetcher, _) = fetcher(&test_config());
    fetcher
        .fetch(&format!("{}/paper", server.uri()), &dir.path().join("paper"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn non_ok_status_creates_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out").join("missing.pdf");
    let (fetcher, _) = fetcher(&test_config());

    let err = fetcher
        .fetch(&format!("{}/missing.pdf", server.uri()), &dest, false)
        .await
        .unwrap_err();

    assert_eq!(err, FetchFailure::HttpStatus { status: 404 });
    assert!(!dest.exists());
    assert!(!dir.path().join("out").exists(), "no directory for a refused fetch");
}

#[tokio::test]
async fn malformed_url_is_rejected_before_any_request() {
    let dir = TempDir::new().unwrap();
    let (fetcher, _) = fetcher(&test_config());

    let err = fetcher
        .fetch("not a url", &dir.path().join("x"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchFailure::InvalidUrl { .. }), "{err:?}");
}

// -----------------------------------------------------------------------
// Redirects
// -----------------------------------------------------------------------

async fn mount_redirect_chain(server: &MockServer, hops: usize) {
    for i in 0..hops {
        Mock::given(method("GET"))
            .and(path(format!("/hop/{i}")))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("/hop/{}", i + 1).as_str()),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("/hop/{hops}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn twenty_redirects_are_followed() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 20).await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("arrived.txt");
    let (fetcher, _) = fetcher(&test_config());

    fetcher
        .fetch(&format!("{}/hop/0", server.uri()), &dest, true)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "arrived");
}

#[tokio::test]
async fn twenty_first_redirect_abandons_the_task() {
    let server = MockServer::start().await;
    mount_redirect_chain(&server, 21).await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("never.txt");
    let (fetcher, _) = fetcher(&test_config());

    let err = fetcher
        .fetch(&format!("{}/hop/0", server.uri()), &dest, true)
        .await
        .unwrap_err();

    assert_eq!(err, FetchFailure::TooManyRedirects { limit: 20 });
    assert!(!dest.exists());
}

#[tokio::test]
async fn redirect_loop_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fetcher, _) = fetcher(&test_config());

    let err = fetcher
        .fetch(&format!("{}/loop", server.uri()), &dir.path().join("loop"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchFailure::TooManyRedirects { .. }));
    assert!(!err.is_fatal());
}

// -----------------------------------------------------------------------
// Shared cookie store
// -----------------------------------------------------------------------

#[tokio::test]
async fn cookies_from_one_fetch_are_presented_on_the_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/consent"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=abc; Path=/")
                .set_body_string("accepted"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("%PDF-1.7"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .with_priority(10)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (fetcher, _) = fetcher(&test_config());

    fetcher
        .fetch(&format!("{}/consent", server.uri()), &dir.path().join("consent"), true)
        .await
        .unwrap();
    fetcher
        .fetch(&format!("{}/paper.pdf", server.uri()), &dir.path().join("paper.pdf"), true)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(dir.path().join("paper.pdf")).unwrap(), "%PDF-1.7");
    assert_eq!(fetcher.session().last_cookies().as_deref(), Some("session=abc"));
}

// -----------------------------------------------------------------------
// Publisher landing pages
// -----------------------------------------------------------------------

fn landing_config(server: &MockServer) -> Config {
    let mut config = test_config();
    config.http.publisher_quirks = vec![PublisherQuirk {
        origin: format!("{}/landing", server.uri()),
        asset_pattern: format!(r#"{}/cdn/[^"]*&type=client"#, regex::escape(&server.uri())),
    }];
    config
}

#[tokio::test]
async fn landing_page_is_replaced_by_embedded_asset() {
    let server = MockServer::start().await;
    let asset = format!("{}/cdn/main.pdf?token=1&type=client", server.uri());
    Mock::given(method("GET"))
        .and(path("/landing/article"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<html><a id="redirect" href="{asset}">PDF</a></html>"#)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/main.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("%PDF-1.4 asset"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("article.pdf");
    let (fetcher, progress) = fetcher(&landing_config(&server));

    fetcher
        .fetch(&format!("{}/landing/article", server.uri()), &dest, false)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "%PDF-1.4 asset");
    assert_eq!(progress.active(), 0);
}

#[tokio::test]
async fn landing_page_without_asset_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing/paywall"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Sign in</html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("paywall.html");
    let (fetcher, _) = fetcher(&landing_config(&server));

    fetcher
        .fetch(&format!("{}/landing/paywall", server.uri()), &dest, true)
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "<html>Sign in</html>");
}

#[tokio::test]
async fn other_origins_are_not_inspected() {
    let server = MockServer::start().await;
    let body = format!("see {}/cdn/x.pdf?a=1&type=client", server.uri());
    Mock::given(method("GET"))
        .and(path("/plain/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/x.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("page");
    let (fetcher, _) = fetcher(&landing_config(&server));

    fetcher
        .fetch(&format!("{}/plain/page", server.uri()), &dest, true)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), body);
}

// -----------------------------------------------------------------------
// Filesystem failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn unusable_parent_directory_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "plain file").unwrap();
    let (fetcher, _) = fetcher(&test_config());

    let err = fetcher
        .fetch(
            &format!("{}/data.bin", server.uri()),
            &blocker.join("sub").join("data.bin"),
            true,
        )
        .await
        .unwrap_err();

    assert!(err.is_fatal(), "{err:?}");
}

#[tokio::test]
async fn uncreatable_destination_abandons_only_the_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    // A directory already sits where the file should go
    let dest = dir.path().join("data.bin");
    std::fs::create_dir(&dest).unwrap();
    let (fetcher, progress) = fetcher(&test_config());

    let err = fetcher
        .fetch(&format!("{}/data.bin", server.uri()), &dest, false)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchFailure::CreateFile { .. }), "{err:?}");
    assert!(!err.is_fatal());
    assert_eq!(progress.active(), 0);
}

// -----------------------------------------------------------------------
// Transient failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn refused_connection_is_retried_then_reported_as_transient() {
    // Grab a free port, then close it so connections are refused
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = test_config();
    config.retry.max_attempts = 2;
    let dir = TempDir::new().unwrap();
    let (fetcher, _) = fetcher(&config);

    let err = fetcher
        .fetch(&format!("http://127.0.0.1:{port}/x"), &dir.path().join("x"), true)
        .await
        .unwrap_err();

    match err {
        FetchFailure::Transport { transient, .. } => assert!(transient),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Truncated and interrupted bodies
// -----------------------------------------------------------------------

/// One-shot server that declares 100000 bytes but sends only ten.
///
/// With `hold_open` the connection then stalls instead of closing.
fn short_body_server(hold_open: bool) -> String {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nContent-Type: application/octet-stream\r\n\r\n0123456789")
            .unwrap();
        stream.flush().unwrap();
        if hold_open {
            std::thread::sleep(Duration::from_secs(5));
        }
    });
    format!("http://{addr}/SRR000001.fastq.gz")
}

#[tokio::test]
async fn truncated_body_removes_partial_file() {
    let url = short_body_server(false);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("SRR000001.fastq.gz");
    let (fetcher, progress) = fetcher(&test_config());

    let err = fetcher.fetch(&url, &dest, false).await.unwrap_err();

    assert!(matches!(err, FetchFailure::Stream { .. }), "{err:?}");
    assert!(!err.is_fatal());
    assert!(!dest.exists(), "partial download left behind");
    assert_eq!(progress.active(), 0);
}

#[tokio::test]
async fn dropped_fetch_removes_partial_file() {
    let url = short_body_server(true);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("SRR000001.fastq.gz");
    let (fetcher, progress) = fetcher(&test_config());

    let mut fetch = Box::pin(fetcher.fetch(&url, &dest, false));
    tokio::select! {
        result = &mut fetch => panic!("stalled body completed: {result:?}"),
        _ = async {
            while !dest.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        } => {}
    }
    assert!(dest.exists());
    drop(fetch);

    assert!(!dest.exists(), "partial download left behind");
    assert_eq!(progress.active(), 0);
}
