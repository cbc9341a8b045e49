mod common;

use common::{get_config, harness, http_tool, param};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use toolbench::errors::ToolErrorKind;
use toolbench::model::{AuthSpec, HttpConfig, HttpMethod, ParamLocation};

fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Serves exactly one canned response and hands back the raw request.
async fn serve_once(response: String) -> (std::net::SocketAddr, oneshot::Receiver<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 16 * 1024];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (addr, rx)
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn query_params_and_response_path_extraction() {
    let body = r#"{"data":{"temp":21}}"#;
    let (addr, request_rx) = serve_once(json_response("200 OK", body)).await;

    let h = harness();
    let tool = http_tool(
        "weather",
        HttpConfig {
            response_path: Some("$.data.temp".to_string()),
            ..get_config(&format!("http://{addr}/weather"))
        },
        vec![param("city", ParamLocation::Query)],
    );
    h.descriptors.insert(&tool).expect("insert");

    let result = h
        .coordinator
        .invoke(&tool.id, &params(&[("city", json!("Paris"))]))
        .await
        .expect("invoke");
    assert_eq!(result, json!(21));

    let request = request_rx.await.expect("request captured");
    assert!(request.starts_with("GET /weather?city=Paris HTTP/1.1"));
}

#[tokio::test]
async fn path_params_are_percent_encoded() {
    let (addr, request_rx) = serve_once(json_response("200 OK", "{}")).await;

    let h = harness();
    let tool = http_tool(
        "cities",
        get_config(&format!("http://{addr}/cities/{{city}}")),
        vec![param("city", ParamLocation::Path)],
    );
    h.descriptors.insert(&tool).expect("insert");

    h.coordinator
        .invoke(&tool.id, &params(&[("city", json!("São Paulo"))]))
        .await
        .expect("invoke");

    let request = request_rx.await.expect("request captured");
    assert!(request.starts_with("GET /cities/S%C3%A3o%20Paulo HTTP/1.1"));
}

#[tokio::test]
async fn bearer_auth_resolves_secret_references() {
    let (addr, request_rx) = serve_once(json_response("200 OK", "{}")).await;

    let h = harness();
    h.secrets.store("api_token", "tok-123").expect("store secret");
    let mut tool = http_tool("secured", get_config(&format!("http://{addr}/")), vec![]);
    tool.auth = AuthSpec::Bearer {
        token: "api_token".to_string(),
    };
    h.descriptors.insert(&tool).expect("insert");

    h.coordinator
        .invoke(&tool.id, &Map::new())
        .await
        .expect("invoke");

    let request = request_rx.await.expect("request captured");
    assert!(request.contains("authorization: Bearer tok-123"));
}

#[tokio::test]
async fn post_body_template_is_interpolated() {
    let (addr, request_rx) = serve_once(json_response("200 OK", "{}")).await;

    let h = harness();
    let tool = http_tool(
        "create",
        HttpConfig {
            method: HttpMethod::Post,
            body_template: Some(r#"{"name": "{name}", "count": {count}}"#.to_string()),
            ..get_config(&format!("http://{addr}/items"))
        },
        vec![
            param("name", ParamLocation::Body),
            param("count", ParamLocation::Body),
        ],
    );
    h.descriptors.insert(&tool).expect("insert");

    h.coordinator
        .invoke(
            &tool.id,
            &params(&[("name", json!("widget")), ("count", json!(3))]),
        )
        .await
        .expect("invoke");

    let request = request_rx.await.expect("request captured");
    assert!(request.contains(r#"{"name": "widget", "count": 3}"#));
    assert!(request
        .lines()
        .any(|line| line.eq_ignore_ascii_case("content-type: application/json")));
}

#[tokio::test]
async fn configured_content_type_is_not_overridden() {
    let (addr, request_rx) = serve_once(json_response("200 OK", "{}")).await;

    let h = harness();
    let mut headers = std::collections::BTreeMap::new();
    headers.insert("Content-Type".to_string(), "text/plain".to_string());
    let tool = http_tool(
        "plain",
        HttpConfig {
            method: HttpMethod::Post,
            headers,
            body_template: Some("hello {msg}".to_string()),
            ..get_config(&format!("http://{addr}/notes"))
        },
        vec![param("msg", ParamLocation::Body)],
    );
    h.descriptors.insert(&tool).expect("insert");

    h.coordinator
        .invoke(&tool.id, &params(&[("msg", json!("world"))]))
        .await
        .expect("invoke");

    let request = request_rx.await.expect("request captured");
    let content_types: Vec<&str> = request
        .lines()
        .filter(|line| line.to_ascii_lowercase().starts_with("content-type:"))
        .collect();
    assert_eq!(content_types, vec!["content-type: text/plain"]);
}

#[tokio::test]
async fn http_404_maps_to_not_found() {
    let (addr, _rx) = serve_once(json_response("404 Not Found", "{}")).await;

    let h = harness();
    let tool = http_tool("missing", get_config(&format!("http://{addr}/nope")), vec![]);
    h.descriptors.insert(&tool).expect("insert");

    let err = h
        .coordinator
        .invoke(&tool.id, &Map::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ToolErrorKind::NotFound);
    assert_eq!(err.details.expect("details")["status"], json!(404));
}

#[tokio::test]
async fn http_500_is_retryable() {
    let (addr, _rx) = serve_once(json_response("500 Internal Server Error", "{}")).await;

    let h = harness();
    let tool = http_tool("flaky", get_config(&format!("http://{addr}/")), vec![]);
    h.descriptors.insert(&tool).expect("insert");

    let err = h
        .coordinator
        .invoke(&tool.id, &Map::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ToolErrorKind::Retryable);
    assert!(err.retryable);
}

#[tokio::test]
async fn test_run_reports_transport_failure_without_erroring() {
    // Bind and drop so the port is very likely refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let h = harness();
    let tool = http_tool(
        "unreachable",
        HttpConfig {
            timeout_ms: Some(500),
            ..get_config(&format!("http://{addr}/"))
        },
        vec![],
    );
    h.descriptors.insert(&tool).expect("insert");

    let outcome = h
        .coordinator
        .test(&tool.id, &Map::new())
        .await
        .expect("test never errors");
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    let response = outcome.response.expect("response snapshot");
    assert_eq!(response.status, 0);
    assert_eq!(response.body, Value::Null);
    let request = outcome.request.expect("request snapshot");
    assert_eq!(request.method, "GET");
}

#[tokio::test]
async fn test_run_reports_timeout_near_the_deadline() {
    // Accepts the connection and then never responds.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let hold = tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(socket);
        }
    });

    let h = harness();
    let tool = http_tool(
        "stalled",
        HttpConfig {
            timeout_ms: Some(300),
            ..get_config(&format!("http://{addr}/"))
        },
        vec![],
    );
    h.descriptors.insert(&tool).expect("insert");

    let outcome = h
        .coordinator
        .test(&tool.id, &Map::new())
        .await
        .expect("test never errors");
    assert!(!outcome.success);
    let error = outcome.error.expect("error message");
    assert!(error.contains("timed out"));
    assert_eq!(outcome.response.expect("response snapshot").status, 0);
    assert!(outcome.duration_ms >= 300);
    assert!(outcome.duration_ms < 5_000);
    hold.abort();
}

#[tokio::test]
async fn test_run_redacts_sensitive_headers() {
    let (addr, _rx) = serve_once(json_response("200 OK", "{}")).await;

    let h = harness();
    let mut tool = http_tool("secured", get_config(&format!("http://{addr}/")), vec![]);
    tool.auth = AuthSpec::Bearer {
        token: "literal-token".to_string(),
    };
    h.descriptors.insert(&tool).expect("insert");

    let outcome = h
        .coordinator
        .test(&tool.id, &Map::new())
        .await
        .expect("test");
    let request = outcome.request.expect("request snapshot");
    assert_eq!(
        request.headers.get("Authorization").map(String::as_str),
        Some("[REDACTED]")
    );
}
