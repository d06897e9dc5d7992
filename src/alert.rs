use crate::validator::{MessageValidator, ValidatedRecord};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Records that were classified as spam, in batch order.
pub type AlertPayload = Vec<ValidatedRecord>;

/// Pick the records whose label is `true`.
pub fn spam_subset(batch: &[ValidatedRecord], labels: &[bool]) -> AlertPayload {
    batch
        .iter()
        .zip(labels)
        .filter(|(_, is_spam)| **is_spam)
        .map(|(record, _)| record.clone())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum AlertDeliveryError {
    #[error("Alert endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Alert request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AlertDeliveryError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AlertDeliveryError::Status { status, .. } => Some(*status),
            AlertDeliveryError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Destination for spam alerts. One delivery attempt per call.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, payload: &[ValidatedRecord]) -> Result<(), AlertDeliveryError>;
}

/// Posts alert payloads as a JSON array to an HTTP endpoint, authenticated
/// with `Authorization: Token <token>`.
pub struct HttpAlertSink {
    client: Client,
    endpoint: Url,
    token: String,
}

impl HttpAlertSink {
    pub fn new(endpoint: Url, token: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spamd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl AlertSink for HttpAlertSink {
    async fn alert(&self, payload: &[ValidatedRecord]) -> Result<(), AlertDeliveryError> {
        log::debug!(
            "Posting {} spam record(s) to {}",
            payload.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        let body = match response.bytes().await {
            Ok(bytes) => MessageValidator::excerpt(&bytes),
            Err(e) => format!("<unreadable body: {e}>"),
        };
        Err(AlertDeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn record(owner: &str, text: &str) -> ValidatedRecord {
        ValidatedRecord {
            owner_id: owner.to_string(),
            text: text.to_string(),
            id: String::new(),
            source: String::new(),
        }
    }

    /// Accept one connection, capture the raw request and answer with the
    /// given status line and body.
    async fn one_shot_server(status_line: &'static str, body: &str) -> (Url, JoinHandle<String>) {
        let body = body.to_string();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        let url = Url::parse(&format!("http://{addr}/spam")).unwrap();
        (url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_spam_subset_keeps_only_flagged_records_in_order() {
        let batch = vec![record("u1", "a"), record("u2", "b"), record("u3", "c")];
        let subset = spam_subset(&batch, &[true, false, true]);
        let owners: Vec<_> = subset.iter().map(|r| r.owner_id.as_str()).collect();
        assert_eq!(owners, vec!["u1", "u3"]);
        assert!(spam_subset(&batch, &[false, false, false]).is_empty());
    }

    #[tokio::test]
    async fn test_post_carries_token_and_json_array() {
        let (url, server) = one_shot_server("201 Created", "").await;
        let sink = HttpAlertSink::new(url, "s3cret".to_string(), Duration::from_secs(5)).unwrap();

        sink.alert(&[record("u1", "buy now")]).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /spam HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: token s3cret"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let sent: Vec<ValidatedRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(sent, vec![record("u1", "buy now")]);
        let raw: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            raw[0],
            serde_json::json!({"owner_id": "u1", "text": "buy now", "id": "", "source": ""})
        );
    }

    #[tokio::test]
    async fn test_ok_status_is_success() {
        let (url, server) = one_shot_server("200 OK", "fine").await;
        let sink = HttpAlertSink::new(url, "t".to_string(), Duration::from_secs(5)).unwrap();
        assert!(sink.alert(&[record("u1", "x")]).await.is_ok());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let (url, server) = one_shot_server("500 Internal Server Error", "db down").await;
        let sink = HttpAlertSink::new(url, "t".to_string(), Duration::from_secs(5)).unwrap();

        let err = sink.alert(&[record("u1", "x")]).await.unwrap_err();
        server.await.unwrap();

        assert_eq!(err.status(), Some(500));
        match err {
            AlertDeliveryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "db down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_long_error_body_is_truncated() {
        let long_body = "e".repeat(5000);
        let (url, server) = one_shot_server("502 Bad Gateway", &long_body).await;
        let sink = HttpAlertSink::new(url, "t".to_string(), Duration::from_secs(5)).unwrap();

        let err = sink.alert(&[record("u1", "x")]).await.unwrap_err();
        server.await.unwrap();

        match err {
            AlertDeliveryError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), crate::validator::EXCERPT_LEN + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_content_is_not_success() {
        let (url, server) = one_shot_server("204 No Content", "").await;
        let sink = HttpAlertSink::new(url, "t".to_string(), Duration::from_secs(5)).unwrap();
        let err = sink.alert(&[record("u1", "x")]).await.unwrap_err();
        server.await.unwrap();
        assert_eq!(err.status(), Some(204));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/spam")).unwrap();
        let sink = HttpAlertSink::new(url, "t".to_string(), Duration::from_secs(2)).unwrap();
        let err = sink.alert(&[record("u1", "x")]).await.unwrap_err();
        assert!(matches!(err, AlertDeliveryError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
