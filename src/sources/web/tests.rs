use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const SAMPLE_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <title>Sample</title>
    <style>body { color: red; }</style>
    <script>console.log("hidden");</script>
</head>
<body>
    <h1>  Getting Started  </h1>

    <p>First paragraph
       continues here.</p>
    <noscript>Enable JavaScript</noscript>
    <ul><li>One</li><li>Two</li></ul>
    <script type="text/javascript">var x = 1;</script>
</body>
</html>
"#;

fn fast_source() -> UrlTextSource {
    UrlTextSource::new(Duration::from_secs(5)).with_retry(RetryPolicy {
        attempts: 2,
        base_delay: Duration::from_millis(1),
    })
}

#[test]
fn extracts_visible_lines() {
    let text = extract_text(SAMPLE_PAGE).expect("extraction should succeed");

    assert_eq!(
        text,
        "Sample\nGetting Started\nFirst paragraph\ncontinues here.\nOne\nTwo"
    );
}

#[test]
fn drops_script_style_and_noscript() {
    let text = extract_text(SAMPLE_PAGE).expect("extraction should succeed");

    assert!(!text.contains("console.log"));
    assert!(!text.contains("color: red"));
    assert!(!text.contains("Enable JavaScript"));
    assert!(!text.contains("var x"));
}

#[test]
fn empty_document_yields_empty_text() {
    let text = extract_text("<html><body>   </body></html>").expect("extraction should succeed");
    assert!(text.is_empty());
}

#[test]
fn invalid_url_is_rejected() {
    let result = fast_source().fetch("http://");
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetches_and_extracts_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/intro"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SAMPLE_PAGE, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/docs/intro", server.uri());
    let text = tokio::task::spawn_blocking(move || fast_source().fetch(&url))
        .await
        .expect("task should complete")
        .expect("fetch should succeed");

    assert!(text.starts_with("Sample\nGetting Started"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_page_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let err = tokio::task::spawn_blocking(move || fast_source().fetch(&url))
        .await
        .expect("task should complete")
        .expect_err("fetch should fail");

    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_failure_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let err = tokio::task::spawn_blocking(move || fast_source().fetch(&url))
        .await
        .expect("task should complete")
        .expect_err("fetch should fail");

    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::Network { .. })
    ));
}
