//! Chat Endpoints

use futures::Stream;

use super::{check, ApiConfig, ChatRequest, ChatResponse, RequestError};
use crate::streaming::{consume, StreamEvent};

const CHAT_PATH: &str = "/api/chat";
const CHAT_STREAM_PATH: &str = "/api/chat/stream";

/// Client for the chat endpoints
#[derive(Clone, Debug)]
pub struct ChatClient {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl ChatClient {
    /// Create a client for `config`
    ///
    /// The client-wide timeout only bounds connecting; streamed bodies may
    /// stay open as long as the server keeps writing.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Http`] if the TLS backend cannot be initialized.
    pub fn new(config: ApiConfig) -> Result<Self, RequestError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(config, http_client))
    }

    /// Create a client sharing an existing connection pool
    #[must_use]
    pub fn with_client(config: ApiConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Underlying HTTP client
    #[must_use]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Start a streamed reply
    ///
    /// Resolves once the response headers arrive; the body is read lazily
    /// through [`ReplyBody::into_events`].
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure or a non-2xx status.
    pub async fn stream_reply(&self, request: &ChatRequest) -> Result<ReplyBody, RequestError> {
        tracing::debug!(
            chars = request.message.chars().count(),
            session_id = ?request.session_id,
            "Requesting streamed reply"
        );

        let response = self
            .http_client
            .post(self.config.url(CHAT_STREAM_PATH))
            .json(request)
            .send()
            .await?;

        Ok(ReplyBody(check(CHAT_STREAM_PATH, response).await?))
    }

    /// Request a complete reply in one response
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] on transport failure, a non-2xx status, or a
    /// body that is not a chat response.
    pub async fn reply(&self, request: &ChatRequest) -> Result<ChatResponse, RequestError> {
        let response = self
            .http_client
            .post(self.config.url(CHAT_PATH))
            .timeout(self.config.request_timeout())
            .json(request)
            .send()
            .await?;

        Ok(check(CHAT_PATH, response).await?.json::<ChatResponse>().await?)
    }
}

/// An accepted streaming response whose body has not been read yet
#[derive(Debug)]
pub struct ReplyBody(reqwest::Response);

impl ReplyBody {
    /// HTTP status of the accepted response
    #[must_use]
    pub fn status(&self) -> u16 {
        self.0.status().as_u16()
    }

    /// Read the body as a lazy sequence of reply events
    pub fn into_events(self) -> impl Stream<Item = StreamEvent> + Send {
        consume(self.0.bytes_stream())
    }
}
