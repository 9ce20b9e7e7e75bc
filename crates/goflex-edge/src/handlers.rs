//! Route handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{SecondsFormat, Utc};
use goflex_mailer::OutboundEmail;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;
use crate::templates;

const MISSING_FIELDS: &str = "Missing required fields: to, subject, html";

/// One address or several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    /// A single address.
    One(String),
    /// Several addresses, in send order.
    Many(Vec<String>),
}

impl Recipients {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(to) => vec![to],
            Self::Many(to) => to,
        }
    }
}

/// Body of `POST /send-email`.
#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    /// Recipient or recipients.
    pub to: Option<Recipients>,
    /// Subject line.
    pub subject: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Optional plain-text alternative.
    pub text: Option<String>,
}

impl SendEmailRequest {
    fn into_email(self) -> Result<OutboundEmail, ApiError> {
        let recipients = self.to.map(Recipients::into_vec).unwrap_or_default();
        let subject = self.subject.filter(|s| !s.trim().is_empty());
        let html = self.html.filter(|h| !h.trim().is_empty());

        let (Some(subject), Some(html)) = (subject, html) else {
            return Err(ApiError::BadRequest(MISSING_FIELDS.into()));
        };
        if recipients.is_empty() {
            return Err(ApiError::BadRequest(MISSING_FIELDS.into()));
        }

        let email = OutboundEmail::new(&recipients, subject, html)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        Ok(match self.text {
            Some(text) => email.with_plain_text(text),
            None => email,
        })
    }
}

/// Database change webhook.
#[derive(Debug, Deserialize)]
pub struct UserWebhook {
    /// `INSERT`, `UPDATE` or `DELETE`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Table that changed.
    pub table: String,
    /// The new row.
    #[serde(default)]
    pub record: Option<UserRecord>,
    /// Schema of the table.
    #[serde(default)]
    pub schema: Option<String>,
    /// The previous row, for updates and deletes.
    #[serde(default)]
    pub old_record: Option<Value>,
}

/// The parts of a `users` row the notice shows.
#[derive(Debug, Deserialize)]
pub struct UserRecord {
    /// Row id, usually a UUID.
    #[serde(default)]
    pub id: Option<Value>,
    /// The user's email address.
    pub email: String,
    /// Signup time.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserWebhook {
    fn is_new_user(&self) -> bool {
        self.kind == "INSERT" && self.table == "users"
    }
}

/// `POST /send-email`
///
/// # Errors
///
/// 400 on a bad body, 503 without credentials, 500 when the relay fails.
pub async fn send_email(
    State(state): State<AppState>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let email = request.into_email()?;
    let transport = state.transport()?;

    let receipt = transport.send(email).await.map_err(|err| {
        error!(error = %err, step = ?err.step(), "send-email failed");
        ApiError::delivery("Failed to send email", &err)
    })?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Email sent to {} recipient(s)", receipt.accepted.len()),
        "accepted": receipt.accepted_addresses(),
        "rejected": receipt.rejected,
    })))
}

/// `POST /test-email`
///
/// # Errors
///
/// 503 without credentials or a notification address, 500 when the relay fails.
pub async fn test_email(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let transport = state.transport()?;
    let to = state.notification_email()?;
    let email = templates::smtp_test(state.relay())
        .into_email([to])
        .map_err(|err| ApiError::NotConfigured(format!("notification address: {err}")))?;

    info!(recipient = %to, "sending SMTP test email");
    transport.send(email).await.map_err(|err| {
        error!(error = %err, step = ?err.step(), "SMTP test email failed");
        ApiError::delivery("Failed to send test email", &err)
    })?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Test email sent successfully to {to}"),
        "details": "Check the service logs for SMTP conversation details",
    })))
}

/// `POST /admin-test-email`
///
/// # Errors
///
/// 503 without credentials or admin recipients, 500 when the relay fails.
pub async fn admin_test_email(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let now = Utc::now();
    let test_id = format!("test-{}", now.timestamp_millis());

    let transport = state.transport()?;
    let admins = state.admin_emails();
    if admins.is_empty() {
        return Err(ApiError::NotConfigured("ADMIN_EMAILS is not configured".into()));
    }

    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let email = templates::admin_test(&test_id, &timestamp, admins.len())
        .into_email(admins)
        .map_err(|err| ApiError::NotConfigured(format!("admin address: {err}")))?;

    info!(test_id = %test_id, recipients = admins.len(), "sending admin test email");
    match transport.send(email).await {
        Ok(receipt) => {
            let elapsed = started.elapsed().as_millis();
            info!(test_id = %test_id, elapsed_ms = elapsed, "admin test email delivered");
            Ok(Json(json!({
                "success": true,
                "message": format!(
                    "Test email sent successfully to {} admin recipient(s)",
                    receipt.accepted.len()
                ),
                "details": format!("Delivered in {elapsed}ms"),
                "testId": test_id,
            })))
        }
        Err(err) => {
            let elapsed = started.elapsed().as_millis();
            error!(test_id = %test_id, error = %err, step = ?err.step(), "admin test email failed");
            Err(ApiError::Delivery {
                error: "Failed to send test email",
                details: format!("Failed after {elapsed}ms"),
                message: Some(err.to_string()),
                test_id: Some(test_id),
            })
        }
    }
}

/// `POST /new-user-notification`
///
/// # Errors
///
/// 400 on a malformed payload, 503 without credentials or a notification
/// address, 500 when the relay fails.
pub async fn new_user_notification(
    State(state): State<AppState>,
    payload: Result<Json<UserWebhook>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(hook) = payload?;
    if !hook.is_new_user() {
        info!(kind = %hook.kind, table = %hook.table, "webhook ignored");
        return Ok(Json(json!({ "success": true, "message": "No action taken" })));
    }
    let Some(record) = hook.record else {
        return Err(ApiError::BadRequest("webhook record is missing".into()));
    };

    let transport = state.transport()?;
    let to = state.notification_email()?;
    let email = templates::new_user(&record.email, record.created_at.as_deref())
        .into_email([to])
        .map_err(|err| ApiError::NotConfigured(format!("notification address: {err}")))?;

    transport.send(email).await.map_err(|err| {
        error!(user = %record.email, error = %err, step = ?err.step(), "new user notification failed");
        ApiError::delivery("Failed to process webhook", &err)
    })?;

    info!(user = %record.email, user_id = ?record.id, "new user notification sent");
    Ok(Json(json!({ "success": true, "message": "Notification sent" })))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
