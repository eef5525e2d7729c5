use serde_json::json;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

#[test]
fn set_cookie_parsing() {
    assert_eq!(
        parse_set_cookie("session=abc123; Path=/; HttpOnly"),
        Some(("session".to_string(), "abc123".to_string()))
    );
    assert_eq!(
        parse_set_cookie("flag="),
        Some(("flag".to_string(), String::new()))
    );
    assert_eq!(parse_set_cookie("no-pair-here"), None);
    assert_eq!(parse_set_cookie("=orphan"), None);
}

#[test]
fn jar_merges_and_deletes() {
    let mut jar = CookieJar::default();
    jar.apply("a=1; Path=/");
    jar.apply("b=2");
    assert_eq!(jar.header().as_deref(), Some("a=1; b=2"));

    jar.apply("a=deleted");
    assert_eq!(jar.header().as_deref(), Some("b=2"));

    jar.apply("b=; Max-Age=0");
    assert_eq!(jar.header(), None);
}

#[tokio::test]
async fn rejects_unsupported_method_before_any_network() {
    let client = HttpClient::new().unwrap();
    // Unroutable URL: the method check must fire first.
    let err = client
        .request("trace", "http://invalid.localhost/", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("trace"));
}

#[tokio::test]
async fn post_json_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .and(header("content-type", "application/json"))
        .and(body_string("{\"a\":1}"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request(
            "post",
            &format!("{}/api", server.uri()),
            Some(RequestBody::Json(json!({"a": 1}))),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn post_string_body_is_form_encoded_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("a=1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request(
            "POST",
            &format!("{}/form", server.uri()),
            Some(RequestBody::from("a=1")),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn cookie_jar_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=s1; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("cookie", "session=s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("profile"))
        .mount(&server)
        .await;

    let client = HttpClient::with_cookie_jar().unwrap();
    client
        .request("get", &format!("{}/login", server.uri()), None, &[])
        .await
        .unwrap();
    assert_eq!(client.cookie("session").as_deref(), Some("s1"));

    let response = client
        .request("get", &format!("{}/profile", server.uri()), None, &[])
        .await
        .unwrap();
    assert_eq!(response.body, "profile");
}

#[tokio::test]
async fn redirect_location_becomes_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request("get", &format!("{}/old", server.uri()), None, &[])
        .await
        .unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(response.url, "/new");
}

#[tokio::test]
async fn extra_headers_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authed"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .request(
            "get",
            &format!("{}/authed", server.uri()),
            None,
            &[("Authorization".to_string(), "Bearer token".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(response.status, 204);
}
