use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::ndjson::process_ndjson;
use crate::observability::{CATALOG_ERRORS, CATALOG_REQUESTS, STREAM_REQUESTS};
use crate::types::{ChatMessage, ChatRequest, ModelList};

const DEFAULT_HOST: &str = "http://127.0.0.1:11434/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for an Ollama-compatible inference server.
///
/// Only two endpoints are used: `GET api/tags` to list models and
/// `POST api/chat` to stream a completion.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
}

impl Ollama {
    /// Create a new client.
    ///
    /// The host can be provided directly or read from the DAYBOOK_HOST or
    /// OLLAMA_HOST environment variables, falling back to the local default.
    pub fn new(host: Option<String>) -> Result<Self> {
        Self::with_options(host, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(host: Option<String>, connect_timeout: Option<Duration>) -> Result<Self> {
        let host = match host {
            Some(host) => host,
            None => env::var("DAYBOOK_HOST")
                .or_else(|_| env::var("OLLAMA_HOST"))
                .unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        };
        let base_url = parse_base_url(&host)?;

        // No overall timeout: a long generation is not a failure.
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    /// The server base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(
                format!("Cannot reach {}: {}", self.base_url, e),
                Some(Box::new(e)),
            )
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or(error_body);

        match status_code {
            404 => Error::not_found(error_message, None),
            408 => Error::timeout(error_message, None),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_message),
        }
    }

    /// List the identifiers of the models the server has available.
    ///
    /// Any response that is not `{"models": [{"name": ...}, ...]}` is an error.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        CATALOG_REQUESTS.click();
        let result = self.fetch_model_list().await;
        if let Err(err) = &result {
            CATALOG_ERRORS.click();
            tracing::warn!(error = %err, "model catalog fetch failed");
        }
        result
    }

    async fn fetch_model_list(&self) -> Result<Vec<String>> {
        let url = self.endpoint("api/tags")?;
        tracing::debug!(%url, "fetching model catalog");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.bytes().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read model list: {}", e),
                Some(Box::new(e)),
            )
        })?;
        let list: ModelList = serde_json::from_slice(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse model list: {}", e),
                Some(Box::new(e)),
            )
        })?;

        tracing::debug!(count = list.models.len(), "model catalog fetched");
        Ok(list.names())
    }

    /// Send a chat request and get a stream of response text fragments.
    ///
    /// Fragments are yielded in delivery order.  Concatenating them gives the
    /// assistant's reply.  A transport or decode failure is yielded as the
    /// final item.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send>>> {
        STREAM_REQUESTS.click();
        let url = self.endpoint("api/chat")?;
        let request = ChatRequest::streaming(model, messages);
        tracing::debug!(%url, model, messages = messages.len(), "starting chat stream");

        let mut headers = Self::default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/x-ndjson"),
        );

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(process_ndjson(response.bytes_stream())))
    }
}

/// Turn a host setting into a base URL ending in `/`.
///
/// Accepts `host:port` without a scheme, as OLLAMA_HOST commonly is.
fn parse_base_url(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::validation(
            "host must not be empty",
            Some("host".to_string()),
        ));
    }
    let mut base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?)
}
