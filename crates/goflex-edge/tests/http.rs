//! Router tests against an in-process transport.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use goflex_edge::{AppState, RelayInfo, router};
use goflex_mailer::{
    MailTransport, OutboundEmail, RejectedRecipient, Reply, ReplyCode, SendError, SendReceipt,
    SessionState,
};
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

const NOTIFY: &str = "newacct@goflexconnect.com";

/// Accepts everything except the addresses in `refuse`.
#[derive(Default)]
struct FakeTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    refuse: Vec<String>,
    fail: bool,
}

impl FakeTransport {
    fn refusing(addresses: &[&str]) -> Self {
        Self {
            refuse: addresses.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, SendError> {
        self.sent.lock().unwrap().push(email.clone());
        if self.fail {
            return Err(SendError::Rejected {
                step: SessionState::Authenticating,
                code: 535,
                message: "5.7.8 Authentication credentials invalid".into(),
            });
        }

        let (refused, accepted): (Vec<_>, Vec<_>) = email
            .recipients()
            .iter()
            .cloned()
            .partition(|addr| self.refuse.iter().any(|r| r == addr.as_str()));

        Ok(SendReceipt {
            accepted,
            rejected: refused
                .into_iter()
                .map(|addr| RejectedRecipient {
                    address: addr.to_string(),
                    code: 550,
                    message: "5.1.1 No such user".into(),
                })
                .collect(),
            relay: "relay.test".into(),
            final_reply: Reply::new(ReplyCode::OK, vec!["2.0.0 Ok: queued".into()]),
            elapsed: Duration::from_millis(3),
        })
    }
}

fn state_with(transport: &Arc<FakeTransport>) -> AppState {
    AppState::new()
        .with_transport(transport.clone())
        .with_notification_email(NOTIFY)
        .with_admin_emails(vec![
            "ops@goflexconnect.com".into(),
            "owner@goflexconnect.com".into(),
        ])
        .with_relay(RelayInfo {
            host: "smtp.ionos.com".into(),
            from: "forgot@goflexconnect.com".into(),
        })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn call(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(AppState::new(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn send_email_delivers() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/send-email",
            &json!({"to": "a@x.com", "subject": "Test Email", "html": "<p>Hi</p>"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["accepted"], json!(["a@x.com"]));
    assert_eq!(body["rejected"], json!([]));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject(), "Test Email");
    assert_eq!(sent[0].html_body(), "<p>Hi</p>");
    assert_eq!(sent[0].plain_text_body(), None);
}

#[tokio::test]
async fn send_email_reports_partial_rejection() {
    let transport = Arc::new(FakeTransport::refusing(&["b@y.com"]));
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/send-email",
            &json!({
                "to": ["a@x.com", "b@y.com"],
                "subject": "s",
                "html": "<p>x</p>",
                "text": "x"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], json!(["a@x.com"]));
    assert_eq!(body["rejected"][0]["address"], "b@y.com");
    assert_eq!(body["rejected"][0]["code"], 550);
    assert_eq!(transport.sent()[0].plain_text_body(), Some("x"));
}

#[tokio::test]
async fn send_email_requires_fields() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(
        state_with(&transport),
        post_json("/send-email", &json!({"to": "a@x.com", "html": "<p>x</p>"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing required fields: to, subject, html");
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn send_email_rejects_bad_address() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/send-email",
            &json!({"to": ["a@x.com", "nobody"], "subject": "s", "html": "<p>x</p>"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("nobody"));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(AppState::new(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unconfigured_service_is_unavailable() {
    let state = AppState::new().with_notification_email(NOTIFY);

    let (status, body) = call(
        state.clone(),
        post_json(
            "/send-email",
            &json!({"to": "a@x.com", "subject": "s", "html": "<p>x</p>"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let (status, _) = call(state.clone(), post_empty("/test-email")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = call(state, post_empty("/admin-test-email")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn relay_failure_is_server_error() {
    let transport = Arc::new(FakeTransport::failing());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/send-email",
            &json!({"to": "a@x.com", "subject": "s", "html": "<p>x</p>"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to send email");
    assert!(body["details"].as_str().unwrap().contains("535"));
}

#[tokio::test]
async fn test_email_goes_to_notification_address() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(state_with(&transport), post_empty("/test-email")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Test email sent successfully to newacct@goflexconnect.com"
    );

    let sent = transport.sent();
    assert_eq!(sent[0].recipients()[0].as_str(), NOTIFY);
    assert_eq!(sent[0].subject(), "SMTP Test - GoFlex Connect");
    assert!(sent[0].html_body().contains("Server: smtp.ionos.com"));
}

#[tokio::test]
async fn test_email_failure_is_reported() {
    let transport = Arc::new(FakeTransport::failing());
    let (status, body) = call(state_with(&transport), post_empty("/test-email")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send test email");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn admin_test_email_reaches_every_admin() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(state_with(&transport), post_empty("/admin-test-email")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Test email sent successfully to 2 admin recipient(s)"
    );
    assert!(body["testId"].as_str().unwrap().starts_with("test-"));
    let details = body["details"].as_str().unwrap();
    assert!(details.starts_with("Delivered in ") && details.ends_with("ms"));

    let sent = transport.sent();
    let to: Vec<&str> = sent[0].recipients().iter().map(|a| a.as_str()).collect();
    assert_eq!(to, ["ops@goflexconnect.com", "owner@goflexconnect.com"]);
    assert!(sent[0].html_body().contains("2 admin(s)"));
    assert!(
        sent[0]
            .html_body()
            .contains(body["testId"].as_str().unwrap())
    );
}

#[tokio::test]
async fn admin_test_email_failure_keeps_test_id() {
    let transport = Arc::new(FakeTransport::failing());
    let (status, body) = call(state_with(&transport), post_empty("/admin-test-email")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["testId"].as_str().unwrap().starts_with("test-"));
    assert!(body["details"].as_str().unwrap().starts_with("Failed after "));
    assert!(body["message"].as_str().unwrap().contains("535"));
}

#[tokio::test]
async fn admin_test_email_needs_admins() {
    let transport = Arc::new(FakeTransport::default());
    let state = state_with(&transport).with_admin_emails(Vec::new());
    let (status, _) = call(state, post_empty("/admin-test-email")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn new_user_insert_notifies() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/new-user-notification",
            &json!({
                "type": "INSERT",
                "table": "users",
                "schema": "public",
                "record": {
                    "id": "5b7c1a2e-0000-4000-8000-000000000001",
                    "email": "tech@carrier.example",
                    "created_at": "2024-03-01T12:30:00Z"
                },
                "old_record": null
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Notification sent"}));

    let sent = transport.sent();
    assert_eq!(sent[0].recipients()[0].as_str(), NOTIFY);
    assert_eq!(sent[0].subject(), "New User Registration - GoFlex Connect");
    assert!(sent[0].html_body().contains("tech@carrier.example"));
    assert!(sent[0].html_body().contains("2024-03-01 12:30:00 UTC"));
}

#[tokio::test]
async fn other_webhooks_are_ignored() {
    let transport = Arc::new(FakeTransport::default());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/new-user-notification",
            &json!({"type": "UPDATE", "table": "users", "record": {"email": "a@x.com"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No action taken");
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn malformed_webhook_is_bad_request() {
    let transport = Arc::new(FakeTransport::default());
    let (status, _) = call(
        state_with(&transport),
        post_json("/new-user-notification", &json!({"record": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        state_with(&transport),
        post_json(
            "/new-user-notification",
            &json!({"type": "INSERT", "table": "users"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn webhook_failure_is_server_error() {
    let transport = Arc::new(FakeTransport::failing());
    let (status, body) = call(
        state_with(&transport),
        post_json(
            "/new-user-notification",
            &json!({"type": "INSERT", "table": "users", "record": {"email": "a@x.com"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process webhook");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/send-email")
        .header(header::ORIGIN, "https://app.goflexconnect.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            "content-type,apikey,x-client-info",
        )
        .body(Body::empty())
        .unwrap();

    let response = router(AppState::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("apikey"));
    assert!(allowed.contains("x-client-info"));
}
