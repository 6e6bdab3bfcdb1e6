use stylegen::config::ReferenceConfig;
use stylegen::pipeline::{ReferenceResolver, parse_reference_sources};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(per_url_chars: usize, total_chars: usize) -> ReferenceConfig {
    ReferenceConfig {
        per_url_chars,
        total_chars,
        timeout_secs: 2,
        ..ReferenceConfig::default()
    }
}

async fn mount_text(server: &MockServer, route: &str, content_type: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn html_and_plain_text_pages_become_snippets() {
    let server = MockServer::start().await;
    mount_text(
        &server,
        "/article",
        "text/html; charset=utf-8",
        "<html><head><style>p{}</style><script>var x = 1;</script></head>\
         <body><h1>Heading</h1><p>First &amp; second.</p></body></html>",
    )
    .await;
    mount_text(&server, "/notes.txt", "text/plain", "line one\n\n  line two").await;

    let raw = format!("{0}/article#intro\n{0}/notes.txt", server.uri());
    let parsed = parse_reference_sources(&raw, 5);
    let resolver = ReferenceResolver::new(&config(3000, 12_000)).unwrap();
    let resolved = resolver.resolve(&parsed).await;

    assert!(resolved.warnings.is_empty(), "{:?}", resolved.warnings);
    assert_eq!(resolved.snippets.len(), 2);
    assert_eq!(resolved.snippets[0].text, "Heading First & second.");
    assert_eq!(resolved.snippets[0].source_url, format!("{}/article", server.uri()));
    assert_eq!(resolved.snippets[1].text, "line one line two");
    assert_eq!(resolved.urls_used.len(), 2);
}

#[tokio::test]
async fn failing_urls_are_warnings_not_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_text(&server, "/empty", "text/html", "<html><body><script>x()</script></body></html>").await;
    mount_text(&server, "/ok", "text/plain", "usable text").await;

    let raw = format!("{0}/missing, {0}/empty, {0}/ok", server.uri());
    let parsed = parse_reference_sources(&raw, 5);
    let resolved = ReferenceResolver::new(&config(3000, 12_000))
        .unwrap()
        .resolve(&parsed)
        .await;

    assert_eq!(resolved.urls_used, vec![format!("{}/ok", server.uri())]);
    assert_eq!(resolved.warnings.len(), 2);
    assert!(resolved.warnings[0].contains("HTTP 404"));
    assert!(resolved.warnings[1].contains("No readable text"));
}

#[tokio::test]
async fn timeouts_and_refused_connections_are_warnings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("too late")
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_text(&server, "/ok", "text/plain", "still here").await;

    // nothing listens on port 1
    let raw = format!("{0}/slow\nhttp://127.0.0.1:1/refused\n{0}/ok", server.uri());
    let parsed = parse_reference_sources(&raw, 5);
    let resolver = ReferenceResolver::new(&ReferenceConfig {
        timeout_secs: 1,
        ..config(3000, 12_000)
    })
    .unwrap();
    let resolved = resolver.resolve(&parsed).await;

    assert_eq!(resolved.urls_used, vec![format!("{}/ok", server.uri())]);
    assert_eq!(resolved.snippets.len(), 1);
    assert_eq!(resolved.snippets[0].text, "still here");
    assert_eq!(resolved.warnings.len(), 2, "{:?}", resolved.warnings);
    assert!(resolved.warnings[0].contains("/slow"));
    assert!(resolved.warnings[0].contains("timed out after 1s"));
    assert!(resolved.warnings[1].contains("http://127.0.0.1:1/refused"));
    assert!(resolved.warnings[1].contains("request failed"));
}

#[tokio::test]
async fn snippets_respect_per_url_and_total_budgets() {
    let server = MockServer::start().await;
    let long = "a".repeat(500);
    mount_text(&server, "/one", "text/plain", &long).await;
    mount_text(&server, "/two", "text/plain", &long).await;
    mount_text(&server, "/three", "text/plain", &long).await;

    let raw = format!("{0}/one\n{0}/two\n{0}/three", server.uri());
    let parsed = parse_reference_sources(&raw, 5);
    let resolved = ReferenceResolver::new(&config(300, 450))
        .unwrap()
        .resolve(&parsed)
        .await;

    let lengths: Vec<usize> = resolved
        .snippets
        .iter()
        .map(|s| s.text.chars().count())
        .collect();
    assert_eq!(lengths, vec![300, 150]);
    assert!(resolved.warnings[0].contains("shortened"));
    assert!(resolved.warnings[1].contains("budget exhausted"));
    let total: usize = lengths.iter().sum();
    assert!(total <= 450);
}

#[tokio::test]
async fn more_than_five_urls_are_truncated_with_a_warning() {
    let server = MockServer::start().await;
    for i in 0..6 {
        mount_text(&server, &format!("/p{i}"), "text/plain", "text").await;
    }

    let raw = (0..6)
        .map(|i| format!("{}/p{i}", server.uri()))
        .collect::<Vec<_>>()
        .join(",");
    let parsed = parse_reference_sources(&raw, 5);
    assert_eq!(parsed.urls.len(), 5);
    assert!(parsed.truncated);

    let resolved = ReferenceResolver::new(&config(3000, 12_000))
        .unwrap()
        .resolve(&parsed)
        .await;
    assert!(resolved.truncated);
    assert_eq!(resolved.urls_used.len(), 5);
    assert!(resolved.warnings[0].contains("first 5"));
}

#[tokio::test]
async fn references_reach_the_generation_prompt() {
    use crate::harness::{Harness, article_reply};
    use stylegen::pipeline::GenerationRequest;

    let server = MockServer::start().await;
    mount_text(&server, "/source", "text/plain", "Quarterly numbers grew 12%.").await;

    let harness = Harness::new(vec![article_reply("T", 1000)])
        .await
        .with_style("u1")
        .await;
    let request = GenerationRequest {
        target_length: 1000,
        content_outline: "Results".into(),
        key_points: "Growth".into(),
        reference_sources: Some(format!("{}/source", server.uri())),
        ..GenerationRequest::default()
    };

    let response = harness.state.service.generate("u1", &request).await.unwrap();
    assert_eq!(response.reference_urls_used, vec![format!("{}/source", server.uri())]);
    assert!(!response.reference_urls_truncated);
    assert!(harness.provider.requests()[0].messages[1]
        .content
        .contains("Quarterly numbers grew 12%."));
}
