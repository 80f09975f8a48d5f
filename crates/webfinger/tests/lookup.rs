//! End-to-end lookups against a local HTTP server.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use webfinger::{
    Client, ClientConfig, ErrorKind, TransportErrorKind, WebFingerError, WEBFIST_REL,
};

// ============================================================================
// Helpers
// ============================================================================

const NO_RELS: &[&str] = &[];

/// Bind a server on an ephemeral port and return its `host:port`.
/// The router is built after binding so handlers can refer to the host.
async fn serve(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    let app = build(host.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    host
}

fn http_config() -> ClientConfig {
    ClientConfig {
        scheme: "http".into(),
        ..Default::default()
    }
}

fn jrd(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/jrd+json")], body)
}

fn xrd(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xrd+xml")], body)
}

/// Echo the requested resource back as the subject.
async fn echo_subject(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    jrd(format!(r#"{{"subject":"{}"}}"#, params["resource"]))
}

// ============================================================================
// WebFinger
// ============================================================================

#[tokio::test]
async fn resolves_email_like_handle() {
    let host = serve(|_| Router::new().route("/.well-known/webfinger", get(echo_subject))).await;

    let client = Client::new(http_config()).unwrap();
    let descriptor = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, format!("acct:bob@{host}"));
}

#[tokio::test]
async fn resolves_url_resource() {
    let host = serve(|_| Router::new().route("/.well-known/webfinger", get(echo_subject))).await;

    let client = Client::new(http_config()).unwrap();
    let resource = format!("http://{host}/users/bob");
    let descriptor = client.lookup(&resource, NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, resource);
}

#[tokio::test]
async fn follows_redirects() {
    let host = serve(|host| {
        Router::new()
            .route(
                "/.well-known/webfinger",
                get(|| async { Redirect::temporary("/bob.json") }),
            )
            .route(
                "/bob.json",
                get(move || {
                    let host = host.clone();
                    async move { jrd(format!(r#"{{"subject":"acct:bob@{host}"}}"#)) }
                }),
            )
    })
    .await;

    let client = Client::new(http_config()).unwrap();
    let descriptor = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, format!("acct:bob@{host}"));
}

#[tokio::test]
async fn redirect_loop_is_a_transport_error() {
    let host = serve(|_| {
        Router::new()
            .route(
                "/.well-known/webfinger",
                get(|| async { Redirect::temporary("/loop") }),
            )
            .route("/loop", get(|| async { Redirect::temporary("/loop") }))
    })
    .await;

    let client = Client::new(http_config()).unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    match err {
        WebFingerError::Transport { source, .. } => {
            assert_eq!(source.kind, TransportErrorKind::TooManyRedirects)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn not_found_is_an_http_status_error() {
    let host = serve(|_| Router::new()).await;

    let client = Client::new(http_config()).unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn html_is_rejected() {
    let host = serve(|_| {
        Router::new().route(
            "/.well-known/webfinger",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
        )
    })
    .await;

    let client = Client::new(http_config()).unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
}

#[tokio::test]
async fn refused_connection_surfaces_without_downgrade() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = Client::new(ClientConfig::default()).unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    match err {
        WebFingerError::Transport { url, source } => {
            assert!(url.starts_with("https://"), "{url}");
            assert!(matches!(
                source.kind,
                TransportErrorKind::ConnectionRefused | TransportErrorKind::Connect
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn repeated_lookups_are_identical() {
    let host = serve(|host| {
        Router::new().route(
            "/.well-known/webfinger",
            get(move || {
                let host = host.clone();
                async move {
                    jrd(format!(
                        r#"{{
                            "subject": "acct:bob@{host}",
                            "aliases": ["http://{host}/~bob"],
                            "properties": {{ "http://example.com/ns/role": null }},
                            "links": [{{
                                "rel": "http://webfinger.net/rel/profile-page",
                                "href": "http://{host}/bob",
                                "titles": {{ "en": "Bob", "default": "Bob" }}
                            }}]
                        }}"#
                    ))
                }
            }),
        )
    })
    .await;

    let client = Client::new(http_config()).unwrap();
    let handle = format!("bob@{host}");
    let first = client.lookup(&handle, NO_RELS).await.unwrap();
    let second = client.lookup(&handle, NO_RELS).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

// ============================================================================
// Legacy host-meta / LRDD
// ============================================================================

#[tokio::test]
async fn legacy_fallback_with_json_host_meta() {
    let host = serve(|host| {
        Router::new()
            .route(
                "/.well-known/host-meta.json",
                get(move || {
                    let host = host.clone();
                    async move {
                        jrd(format!(
                            r#"{{"links":[{{"rel":"lrdd","template":"http://{host}/lrdd?uri={{uri}}"}}]}}"#
                        ))
                    }
                }),
            )
            .route(
                "/lrdd",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    jrd(format!(r#"{{"subject":"{}"}}"#, params["uri"]))
                }),
            )
    })
    .await;

    let client = Client::new(ClientConfig {
        legacy_support: true,
        ..http_config()
    })
    .unwrap();
    let descriptor = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, format!("acct:bob@{host}"));
}

#[tokio::test]
async fn legacy_fallback_with_xml_documents() {
    let host = serve(|host| {
        Router::new()
            .route(
                "/.well-known/host-meta",
                get(move || {
                    let host = host.clone();
                    async move {
                        xrd(format!(
                            r#"<?xml version="1.0" encoding="UTF-8"?>
<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">
  <Link rel="lrdd" type="application/xrd+xml" template="http://{host}/describe?uri={{uri}}"/>
</XRD>"#
                        ))
                    }
                }),
            )
            .route(
                "/describe",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    xrd(format!(
                        r#"<?xml version="1.0" encoding="UTF-8"?>
<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">
  <Subject>{}</Subject>
  <Link rel="http://webfinger.net/rel/profile-page" href="http://example.com/bob">
    <Title>Profile</Title>
  </Link>
</XRD>"#,
                        params["uri"]
                    ))
                }),
            )
    })
    .await;

    let client = Client::new(ClientConfig {
        legacy_support: true,
        ..http_config()
    })
    .unwrap();
    let descriptor = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, format!("acct:bob@{host}"));

    let profile = descriptor
        .link_by_rel("http://webfinger.net/rel/profile-page")
        .unwrap();
    assert_eq!(profile.title("en"), Some("Profile"));
}

#[tokio::test]
async fn legacy_disabled_surfaces_primary_error() {
    let host = serve(|_| {
        Router::new().route(
            "/.well-known/host-meta.json",
            get(|| async { jrd("{}".to_string()) }),
        )
    })
    .await;

    let client = Client::new(http_config()).unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
}

// ============================================================================
// WebFist
// ============================================================================

#[tokio::test]
async fn webfist_fallback_follows_delegation() {
    let host = serve(|_| {
        Router::new().route(
            "/webfinger.json",
            get(|| async { jrd(r#"{"subject":"bob@example.com"}"#.to_string()) }),
        )
    })
    .await;

    let delegate = format!("http://{host}/webfinger.json");
    let webfist = serve(move |_| {
        Router::new().route(
            "/.well-known/webfinger",
            get(move || {
                let delegate = delegate.clone();
                async move {
                    jrd(format!(
                        r#"{{"links":[{{"rel":"{WEBFIST_REL}","href":"{delegate}"}}]}}"#
                    ))
                }
            }),
        )
    })
    .await;

    let client = Client::new(ClientConfig {
        fallback_host: Some(webfist),
        ..http_config()
    })
    .unwrap();
    let descriptor = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap();
    assert_eq!(descriptor.subject, "bob@example.com");
}

#[tokio::test]
async fn webfist_without_link_is_a_protocol_error() {
    let host = serve(|_| Router::new()).await;
    let webfist = serve(|_| {
        Router::new().route(
            "/.well-known/webfinger",
            get(|| async { jrd("{}".to_string()) }),
        )
    })
    .await;

    let client = Client::new(ClientConfig {
        fallback_host: Some(webfist),
        ..http_config()
    })
    .unwrap();
    let err = client.lookup(&format!("bob@{host}"), NO_RELS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.to_string(), "No secondary discovery link");
}
