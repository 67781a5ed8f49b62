//! HTTP collaborators against a local mock server: 403 retry, the code
//! sandbox and the deobfuscation service.

use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use embed_dl::deobfuscator::PlayerDeobfuscator;
use embed_dl::error::ExtractError;
use embed_dl::sandbox::{CodeRunner, PistonRunner, SourceFile};
use embed_dl::{send_with_retry, RetryPolicy};

// ─── 403 retry ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn forbidden_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = Client::new();
    let response = send_with_retry(client.get(format!("{}/page", server.uri())), &RetryPolicy::immediate(5))
        .await
        .unwrap()
        .expect("third attempt succeeds");
    assert_eq!(response.text().await.unwrap(), "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_give_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = Client::new();
    let result = send_with_retry(client.get(server.uri()), &RetryPolicy::immediate(3))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = Client::new();
    let result = send_with_retry(client.get(server.uri()), &RetryPolicy::immediate(5))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ─── Code sandbox ────────────────────────────────────────────────────────────

async fn piston_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtimes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"language": "python", "version": "3.10.0", "aliases": ["py"]},
            {"language": "javascript", "version": "18.15.0", "aliases": ["node-js", "js"], "runtime": "node"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn sandbox_runs_code_with_discovered_version() {
    let server = piston_server().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(body_partial_json(json!({"language": "js", "version": "18.15.0"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "language": "javascript",
            "version": "18.15.0",
            "run": {"stdout": "https://cdn.test/v.mp4", "stderr": "", "code": 0}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let runner = PistonRunner::new(Client::new(), server.uri());
    let files = [SourceFile::named("crypto.js", "module.exports = {};")];
    assert_eq!(runner.run_js("process.stdout.write('x')", &files).await.unwrap(), "https://cdn.test/v.mp4");
    // Runtime lookup is cached.
    assert_eq!(runner.run_js("1", &[]).await.unwrap(), "https://cdn.test/v.mp4");
}

#[tokio::test]
async fn sandbox_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "js-1.0 runtime is unknown"})))
        .mount(&server)
        .await;

    let runner = PistonRunner::new(Client::new(), server.uri()).with_version("1.0");
    let err = runner.run_js("1", &[]).await.unwrap_err();
    assert!(matches!(err, ExtractError::Sandbox(ref m) if m.contains("unknown")));
}

// ─── Deobfuscator ────────────────────────────────────────────────────────────

#[tokio::test]
async fn deobfuscator_recovers_key_and_decrypts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/key"))
        .and(body_partial_json(json!({"url": "https://rabbitstream.test/e4-player.min.js"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "s3cret"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/decrypt"))
        .and(body_partial_json(json!({"data": "U2FsdGVk"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"file": "https://cdn.test/master.m3u8", "type": "hls"}]
        })))
        .mount(&server)
        .await;

    let deob = PlayerDeobfuscator::new(Client::new(), &server.uri()).unwrap();
    assert_eq!(
        deob.recover_key("https://rabbitstream.test/e4-player.min.js").await.unwrap(),
        "s3cret"
    );
    let data = deob.decrypt("https://megacloud.test/e1-player.min.js", "U2FsdGVk").await.unwrap();
    assert_eq!(data[0]["file"], "https://cdn.test/master.m3u8");
}

#[tokio::test]
async fn deobfuscator_failures_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "player changed"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/decrypt"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let deob = PlayerDeobfuscator::new(Client::new(), &server.uri()).unwrap();
    assert!(matches!(
        deob.recover_key("https://p.test/a.js").await,
        Err(ExtractError::Deobfuscator(ref m)) if m == "player changed"
    ));
    assert!(matches!(
        deob.decrypt("https://p.test/a.js", "x").await,
        Err(ExtractError::Deobfuscator(_))
    ));
}
