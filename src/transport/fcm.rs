//! Firebase Cloud Messaging (HTTP v1) transport.
//!
//! Sends `POST {endpoint}/v1/projects/{project_id}/messages:send` with a
//! bearer access token and classifies failures:
//!
//! | Response                           | Result                        |
//! |------------------------------------|-------------------------------|
//! | 2xx                                | `Ok(())`                      |
//! | 404, or `errorCode: UNREGISTERED`  | [`SendError::Unregistered`]   |
//! | 429, 5xx                           | [`SendError::Unavailable`]    |
//! | other 4xx                          | [`SendError::Rejected`]       |
//! | connection / timeout failure       | [`SendError::Transport`]      |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Notification, NotificationTransport, SendError};

/// Default FCM API origin.
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

/// FCM HTTP v1 transport.
#[derive(Debug, Clone)]
pub struct FcmTransport {
    client: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl FcmTransport {
    /// Creates a transport for `project_id` against `endpoint`.
    ///
    /// `request_timeout` bounds each HTTP exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        project_id: &str,
        access_token: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            send_url: format!(
                "{}/v1/projects/{project_id}/messages:send",
                endpoint.trim_end_matches('/')
            ),
            access_token: access_token.into(),
        })
    }

    fn classify(status: u16, body: &str) -> SendError {
        let parsed: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
        let unregistered = parsed.as_ref().is_some_and(|env| {
            env.error
                .details
                .iter()
                .any(|d| d.error_code.as_deref() == Some("UNREGISTERED"))
        });
        let message = parsed
            .map(|env| env.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.chars().take(200).collect());

        match status {
            404 => SendError::Unregistered,
            _ if unregistered => SendError::Unregistered,
            429 | 500..=599 => SendError::Unavailable { status, message },
            _ => SendError::Rejected { status, message },
        }
    }
}

#[async_trait]
impl NotificationTransport for FcmTransport {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        let payload = json!({
            "message": {
                "token": notification.token,
                "notification": {
                    "title": notification.title,
                    "body": notification.body,
                }
            }
        });

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify(status.as_u16(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn transport(server: &mockito::Server) -> FcmTransport {
        FcmTransport::new(&server.url(), "demo", "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_v1_message_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/projects/demo/messages:send")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "message": {
                    "token": "tok1",
                    "notification": {
                        "title": "Task Reminder",
                        "body": "Don't forget to: buy milk"
                    }
                }
            })))
            .with_status(200)
            .with_body(r#"{"name":"projects/demo/messages/1"}"#)
            .create_async()
            .await;

        transport(&server)
            .send(&Notification::reminder("tok1", "buy milk"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unregistered_token_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/projects/demo/messages:send")
            .with_status(400)
            .with_body(
                r#"{"error":{"code":400,"message":"not a valid FCM registration token","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#,
            )
            .create_async()
            .await;

        let err = transport(&server)
            .send(&Notification::reminder("stale", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Unregistered));
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/projects/demo/messages:send")
            .with_status(503)
            .with_body(r#"{"error":{"code":503,"message":"backend busy"}}"#)
            .create_async()
            .await;

        let err = transport(&server)
            .send(&Notification::reminder("tok", "x"))
            .await
            .unwrap_err();
        match err {
            SendError::Unavailable { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "backend busy");
            },
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn classify_falls_back_to_raw_body() {
        match FcmTransport::classify(403, "forbidden") {
            SendError::Rejected { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            },
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(matches!(
            FcmTransport::classify(404, ""),
            SendError::Unregistered
        ));
    }
}
