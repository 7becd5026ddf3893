//! Microsoft Graph `sendMail` client.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::message::{Attachment, OutgoingMessage, Sender};

/// Public cloud Graph endpoint.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const FILE_ATTACHMENT: &str = "#microsoft.graph.fileAttachment";

#[derive(Serialize)]
struct SendMailRequest<'a> {
    message: GraphMessage<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage<'a> {
    subject: &'a str,
    body: GraphBody<'a>,
    to_recipients: Vec<GraphRecipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc_recipients: Vec<GraphRecipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc_recipients: Vec<GraphRecipient<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<GraphRecipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<GraphAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient<'a> {
    email_address: GraphEmailAddress<'a>,
}

#[derive(Serialize)]
struct GraphEmailAddress<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttachment<'a> {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: &'a str,
    content_type: &'a str,
    content_bytes: String,
}

#[derive(Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn recipients(addresses: &[String]) -> Vec<GraphRecipient<'_>> {
    addresses
        .iter()
        .map(|address| GraphRecipient {
            email_address: GraphEmailAddress {
                address,
                name: None,
            },
        })
        .collect()
}

fn sender(sender: &Sender) -> GraphRecipient<'_> {
    GraphRecipient {
        email_address: GraphEmailAddress {
            address: &sender.address,
            name: sender.name.as_deref(),
        },
    }
}

fn attachment(attachment: &Attachment) -> GraphAttachment<'_> {
    GraphAttachment {
        odata_type: FILE_ATTACHMENT,
        name: &attachment.name,
        content_type: &attachment.content_type,
        content_bytes: STANDARD.encode(&attachment.data),
    }
}

fn request_body(message: &OutgoingMessage) -> SendMailRequest<'_> {
    SendMailRequest {
        message: GraphMessage {
            subject: &message.subject,
            body: GraphBody {
                content_type: if message.is_html { "HTML" } else { "Text" },
                content: &message.body,
            },
            to_recipients: recipients(&message.to),
            cc_recipients: recipients(&message.cc),
            bcc_recipients: recipients(&message.bcc),
            from: message.from.as_ref().map(sender),
            attachments: message.attachments.iter().map(attachment).collect(),
        },
    }
}

/// Graph's `error.message` when present, otherwise the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<GraphErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or(body)
}

/// Posts messages to `{base}/me/sendMail`.
#[derive(Debug, Clone)]
pub struct GraphClient {
    base_url: String,
    http_client: Client,
}

impl GraphClient {
    /// Creates a client against the given Graph base URL.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client =
            graphmail_oauth::http_client().map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Uses a custom HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// The `sendMail` endpoint.
    #[must_use]
    pub fn send_mail_url(&self) -> String {
        format!("{}/me/sendMail", self.base_url)
    }

    /// Sends one message with a bearer token. Single attempt, no retry.
    ///
    /// # Errors
    ///
    /// Returns `SendFailed` with the HTTP status on a non-2xx response, or
    /// without a status when the request could not be completed.
    pub async fn send(&self, access_token: &str, message: &OutgoingMessage) -> Result<()> {
        let url = self.send_mail_url();
        debug!(
            recipients = message.to.len(),
            attachments = message.attachments.len(),
            "Posting message to Graph"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&request_body(message))
            .send()
            .await
            .map_err(|e| Error::SendFailed {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "Message accepted by Graph");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::SendFailed {
            status: Some(status.as_u16()),
            message: error_message(body),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn message() -> OutgoingMessage {
        OutgoingMessage::new("Report", "<b>done</b>")
            .to("ann@contoso.com")
            .html(true)
            .from(Sender::new("noreply@contoso.com").with_name("Contoso"))
    }

    #[test]
    fn test_envelope_shape() {
        let message = message()
            .cc("cc@contoso.com")
            .attach(Attachment::new("a.txt", "text/plain", b"hello".to_vec()));
        let value = serde_json::to_value(request_body(&message)).unwrap();

        assert_eq!(
            value,
            json!({
                "message": {
                    "subject": "Report",
                    "body": {"contentType": "HTML", "content": "<b>done</b>"},
                    "toRecipients": [{"emailAddress": {"address": "ann@contoso.com"}}],
                    "ccRecipients": [{"emailAddress": {"address": "cc@contoso.com"}}],
                    "from": {"emailAddress": {"address": "noreply@contoso.com", "name": "Contoso"}},
                    "attachments": [{
                        "@odata.type": "#microsoft.graph.fileAttachment",
                        "name": "a.txt",
                        "contentType": "text/plain",
                        "contentBytes": "aGVsbG8="
                    }]
                }
            })
        );
    }

    #[test]
    fn test_empty_lists_omitted() {
        let plain = OutgoingMessage::new("s", "b").to("x@contoso.com");
        let value = serde_json::to_value(request_body(&plain)).unwrap();
        let message = value.get("message").unwrap();

        assert_eq!(message["body"]["contentType"], "Text");
        assert!(message.get("ccRecipients").is_none());
        assert!(message.get("bccRecipients").is_none());
        assert!(message.get("attachments").is_none());
        assert!(message.get("from").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":"ErrorAccessDenied","message":"Access is denied."}}"#;
        assert_eq!(error_message(body.to_string()), "Access is denied.");
        assert_eq!(error_message("gateway down".to_string()), "gateway down");
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/me/sendMail")
            .match_header("authorization", "Bearer token-123")
            .match_body(Matcher::PartialJson(json!({
                "message": {"subject": "Report"}
            })))
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let client = GraphClient::new(format!("{}/", server.url())).unwrap();
        client.send("token-123", &message()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_failure_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/me/sendMail")
            .with_status(403)
            .with_body(r#"{"error":{"code":"ErrorAccessDenied","message":"Access is denied."}}"#)
            .create_async()
            .await;

        let client = GraphClient::new(server.url()).unwrap();
        let err = client.send("t", &message()).await.unwrap_err();
        match err {
            Error::SendFailed { status, message } => {
                assert_eq!(status, Some(403));
                assert_eq!(message, "Access is denied.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let client = GraphClient::new("http://127.0.0.1:1").unwrap();
        let err = client.send("t", &message()).await.unwrap_err();
        assert!(matches!(err, Error::SendFailed { status: None, .. }));
    }
}
