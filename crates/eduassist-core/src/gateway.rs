use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::signing;
use crate::state::Turn;

/// Prepended to every question before it is sent; never stored in the transcript
pub const INSTRUCTION_PREFIX: &str =
    "Provide a brief, bullet-pointed answer tailored for a TBI or spinal cord injury patient: \n";

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const ACCEPT_ANY: &str = "*/*";

const REQUEST_ID_HEADER: &str = "x-amzn-requestid";
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Body of an invoke call: prior turns plus the prefixed new message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub chat_history: Vec<Turn>,
    pub message: String,
}

impl CompletionRequest {
    pub fn new(history: &[Turn], message: &str) -> Self {
        Self {
            chat_history: history.to_vec(),
            message: format!("{}{}", INSTRUCTION_PREFIX, message),
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error(
        "completion service returned HTTP {status} (request id {}): {body}",
        .request_id.as_deref().unwrap_or("unknown")
    )]
    Status {
        status: u16,
        request_id: Option<String>,
        body: String,
    },
    #[error("could not reach completion service: {0}")]
    Transport(String),
    #[error("could not build request: {0}")]
    Request(String),
    #[error("unexpected response from completion service: {0}")]
    MalformedResponse(String),
    #[error("request cancelled")]
    Cancelled,
}

/// Reply text, or why there is none
pub type Completion = Result<String, CompletionError>;

/// Stateless client for the hosted model's invoke endpoint
#[derive(Clone)]
pub struct CompletionGateway {
    client: Client,
    config: Arc<GatewayConfig>,
}

impl CompletionGateway {
    pub fn new(config: GatewayConfig) -> Self {
        // Proxy settings from the environment never apply to a local endpoint
        let mut builder = Client::builder();
        if is_loopback(&config.endpoint) {
            builder = builder.no_proxy();
        }
        let client = builder.build().unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        });

        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// `{endpoint}/model/{model id}/invoke`, with the model id percent-encoded
    pub fn invoke_url(&self) -> Url {
        let mut url = self.config.endpoint.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!(
            "{}/model/{}/invoke",
            base,
            urlencoding::encode(&self.config.model_id)
        ));
        url
    }

    /// Send `message` with the preceding `history` and return the reply.
    ///
    /// Failures come back as `Err`; nothing is retried.
    pub async fn complete(&self, history: &[Turn], message: &str) -> Completion {
        let request = CompletionRequest::new(history, message);
        log::debug!(
            "Invoking {} with {} history turns ({} chars)",
            self.config.model_id,
            request.chat_history.len(),
            message.chars().count()
        );

        let result = self.send(&request).await;
        if let Err(e) = &result {
            log::warn!("Completion failed: {}", e);
        }
        result
    }

    async fn send(&self, request: &CompletionRequest) -> Completion {
        let body = serde_json::to_vec(request).map_err(|e| CompletionError::Request(e.to_string()))?;
        let url = self.invoke_url();

        let signed = signing::signed_headers(
            &self.config.credentials,
            &self.config.region,
            "POST",
            url.as_str(),
            &[("content-type", JSON_CONTENT_TYPE)],
            &body,
            SystemTime::now(),
        )
        .map_err(CompletionError::Request)?;

        let mut builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, ACCEPT_ANY);
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let request_id = response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                request_id,
                body: truncate(text.trim(), MAX_ERROR_BODY_CHARS),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        let parsed: CompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials};

    fn gateway(endpoint: &str) -> CompletionGateway {
        let config = Config {
            endpoint: Some(endpoint.to_string()),
            ..Config::default()
        };
        CompletionGateway::new(GatewayConfig::resolve(&config, Credentials::new("a", "b")).unwrap())
    }

    #[test]
    fn request_prefixes_message_only() {
        let history = vec![Turn::user("hi"), Turn::assistant("- hello")];
        let request = CompletionRequest::new(&history, "What is TBI?");
        assert_eq!(request.chat_history, history);
        assert_eq!(
            request.message,
            "Provide a brief, bullet-pointed answer tailored for a TBI or spinal cord injury patient: \nWhat is TBI?"
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_history"][1]["role"], "CHATBOT");
        assert_eq!(json["chat_history"][0]["message"], "hi");
    }

    #[test]
    fn invoke_url_encodes_model_id() {
        let gw = gateway("https://bedrock-runtime.us-west-2.amazonaws.com");
        assert_eq!(
            gw.invoke_url().as_str(),
            "https://bedrock-runtime.us-west-2.amazonaws.com/model/cohere.command-r-plus-v1%3A0/invoke"
        );

        let gw = gateway("http://127.0.0.1:8080/proxy/");
        assert_eq!(gw.invoke_url().path(), "/proxy/model/cohere.command-r-plus-v1%3A0/invoke");
    }

    #[test]
    fn status_error_describes_response() {
        let err = CompletionError::Status {
            status: 403,
            request_id: Some("abc-123".to_string()),
            body: "{\"message\":\"denied\"}".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("abc-123"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn loopback_detection() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert!(is_loopback(&url("http://127.0.0.1:8080")));
        assert!(is_loopback(&url("http://localhost:3000")));
        assert!(is_loopback(&url("http://[::1]:9000")));
        assert!(!is_loopback(&url("https://bedrock-runtime.us-west-2.amazonaws.com")));
    }

    #[test]
    fn truncates_long_bodies_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
