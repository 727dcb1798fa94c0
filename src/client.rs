use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::ChatRequest;

const CHAT_PATH: &str = "api/chat";

/// A response body delivered as byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can carry a chat request to the service and hand back the
/// raw response body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response body as a byte stream.
    ///
    /// Errors returned here mean no response stream was obtained at all.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// HTTP transport for the chat service.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    chat_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let chat_url = base.join(CHAT_PATH)?;

        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            chat_url,
            timeout,
        })
    }

    /// Create a client from a resolved configuration.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout)
    }

    /// The URL chat requests are posted to.
    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| body.trim().to_string());
        Error::api(status_code, message)
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let response = self
            .client
            .post(self.chat_url.clone())
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "chat request rejected");
            return Err(err);
        }
        tracing::debug!(status = %response.status(), "chat response stream opened");

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new("http://127.0.0.1:5000", Duration::from_secs(30)).unwrap();
        assert_eq!(client.chat_url().as_str(), "http://127.0.0.1:5000/api/chat");
        assert_eq!(client.timeout, Duration::from_secs(30));

        let client =
            ChatClient::new("https://chat.example.com/v2", Duration::from_secs(30)).unwrap();
        assert_eq!(
            client.chat_url().as_str(),
            "https://chat.example.com/v2/api/chat"
        );

        let client =
            ChatClient::new("https://chat.example.com/v2/", Duration::from_secs(30)).unwrap();
        assert_eq!(
            client.chat_url().as_str(),
            "https://chat.example.com/v2/api/chat"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ChatClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = ChatConfig::new().with_base_url("http://localhost:8080");
        let client = ChatClient::from_config(&config).unwrap();
        assert_eq!(client.chat_url().as_str(), "http://localhost:8080/api/chat");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = ChatClient::new(&base_url, Duration::from_secs(5)).unwrap();
        let Err(err) = client.open(&ChatRequest::new("hi")).await else {
            panic!("nothing is listening on {base_url}");
        };
        assert!(err.is_connection(), "unexpected error: {err}");
        assert!(!err.is_timeout());
    }
}
