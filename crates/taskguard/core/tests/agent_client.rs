use std::time::Duration;
use taskguard_core::{AgentClient, ProtectionClient, ProtectionError, ProtectionRequest};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn enable_puts_lease_length() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/task-protection/v1/state"))
        .and(body_json(serde_json::json!({
            "ProtectionEnabled": true,
            "ExpiresInMinutes": 60
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "protection": { "ProtectionEnabled": true }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AgentClient::new(&server.uri()).unwrap();
    client
        .set_protection(&ProtectionRequest::enable(60))
        .await
        .unwrap();
}

#[tokio::test]
async fn disable_omits_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/task-protection/v1/state"))
        .and(body_json(serde_json::json!({ "ProtectionEnabled": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = AgentClient::new(&format!("{}/", server.uri())).unwrap();
    client
        .set_protection(&ProtectionRequest::disable())
        .await
        .unwrap();
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/task-protection/v1/state"))
        .respond_with(ResponseTemplate::new(400).set_body_string("InvalidParameterException"))
        .mount(&server)
        .await;

    let client = AgentClient::new(&server.uri()).unwrap();
    let err = client
        .set_protection(&ProtectionRequest::enable(5))
        .await
        .unwrap_err();

    match err {
        ProtectionError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "InvalidParameterException");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_agent_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = AgentClient::with_timeout(&server.uri(), Duration::from_millis(100)).unwrap();
    let err = client
        .set_protection(&ProtectionRequest::enable(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectionError::Http(_)));
}

#[tokio::test]
async fn unreachable_agent_is_a_failure() {
    let client = AgentClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let err = client
        .set_protection(&ProtectionRequest::disable())
        .await
        .unwrap_err();
    assert!(matches!(err, ProtectionError::Http(_)));
}
