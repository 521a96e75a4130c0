//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API via the base URL override in
//! [`EngineConfig`]. One provider holds exactly one API key. The client's
//! built-in retry is disabled: every failure is returned on the first
//! attempt and the credential pool decides where to retry.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_trait::async_trait;

use crate::agent::config::EngineConfig;
use crate::agent::message::{
    ChatMessage, CompletionRequest, CompletionResponse, Role, TokenUsage,
};
use crate::agent::provider::LlmProvider;
use crate::error::{AgentError, FailureKind};

/// API error fragments that mean the key itself was rejected.
const AUTH_MARKERS: &[&str] = &[
    "invalid_api_key",
    "incorrect api key",
    "api key",
    "authentication",
    "permission",
    "unauthorized",
];

/// API error fragments that mean "try again elsewhere or later".
const TRANSIENT_MARKERS: &[&str] = &[
    "insufficient_quota",
    "rate_limit",
    "rate limit",
    "too many requests",
    "server_error",
    "overloaded",
    "temporarily unavailable",
];

/// `OpenAI`-compatible LLM provider bound to one credential.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a provider for `api_key` using the base URL from `config`.
    #[must_use]
    pub fn new(config: &EngineConfig, api_key: &str) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &CompletionRequest) -> CreateChatCompletionRequest {
        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            ..Default::default()
        }
    }

    /// Classifies an SDK error for the credential pool.
    fn classify(err: &OpenAIError) -> AgentError {
        let message = err.to_string();
        match err {
            OpenAIError::Reqwest(e) => {
                let status = e.status().map(|s| s.as_u16());
                let kind = if e.is_timeout() || e.is_connect() {
                    FailureKind::Transient
                } else {
                    status.map_or(FailureKind::Transient, FailureKind::from_status)
                };
                AgentError::Provider {
                    kind,
                    message,
                    status,
                }
            }
            OpenAIError::ApiError(api) => {
                let haystack = format!(
                    "{} {}",
                    api.r#type.as_deref().unwrap_or_default(),
                    api.message
                )
                .to_lowercase();
                AgentError::Provider {
                    kind: classify_api_message(&haystack),
                    message,
                    status: None,
                }
            }
            OpenAIError::StreamError(_) => AgentError::Provider {
                kind: FailureKind::Transient,
                message,
                status: None,
            },
            _ => AgentError::Provider {
                kind: FailureKind::Fatal,
                message,
                status: None,
            },
        }
    }
}

/// Classifies an API error body by its type and message text.
fn classify_api_message(haystack: &str) -> FailureKind {
    if TRANSIENT_MARKERS.iter().any(|m| haystack.contains(m)) {
        FailureKind::Transient
    } else if AUTH_MARKERS.iter().any(|m| haystack.contains(m)) {
        FailureKind::Authentication
    } else {
        FailureKind::Fatal
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| Self::classify(&e))?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(CompletionResponse {
            content,
            usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_case::test_case;

    #[test]
    fn test_convert_messages() {
        assert!(matches!(
            OpenAiProvider::convert_message(&message::system_message("s")),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            OpenAiProvider::convert_message(&message::user_message("u")),
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            OpenAiProvider::convert_message(&message::assistant_message("a")),
            ChatCompletionRequestMessage::Assistant(_)
        ));
    }

    #[test]
    fn test_build_request() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                message::system_message("explain"),
                message::user_message("evidence"),
            ],
            temperature: Some(0.0),
            max_tokens: Some(300),
        };
        let built = OpenAiProvider::build_request(&request);
        assert_eq!(built.model, "gpt-4o-mini");
        assert_eq!(built.messages.len(), 2);
        assert!(built.temperature.is_none());
        assert_eq!(built.max_completion_tokens, Some(300));
    }

    #[test_case("insufficient_quota You exceeded your current quota", FailureKind::Transient ; "quota")]
    #[test_case("requests rate limit reached for requests", FailureKind::Transient ; "rate limit")]
    #[test_case("server_error the server had an error", FailureKind::Transient ; "server error")]
    #[test_case("invalid_request_error incorrect api key provided", FailureKind::Authentication ; "bad key")]
    #[test_case("invalid_request_error you must provide a model parameter", FailureKind::Fatal ; "malformed")]
    fn test_classify_api_message(haystack: &str, expected: FailureKind) {
        assert_eq!(classify_api_message(haystack), expected);
    }

    /// Serves `429` to every request on a local port.
    fn rate_limited_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream);
                let body = r#"{"error":{"message":"Rate limit reached for requests","type":"requests","param":null,"code":"rate_limit_exceeded"}}"#;
                let response = format!(
                    "HTTP/1.1 429 Too Many Requests\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        (format!("http://{addr}/v1"), hits)
    }

    /// Reads headers and the full body so closing does not reset the socket.
    fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut chunk) else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_rate_limit_returned_on_first_attempt() {
        let (base_url, hits) = rate_limited_server();
        let config = EngineConfig::builder()
            .base_url(base_url)
            .build()
            .unwrap();
        let provider = OpenAiProvider::new(&config, "sk-test-0000000000");
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![message::user_message("hi")],
            temperature: None,
            max_tokens: None,
        };

        let result = tokio::time::timeout(Duration::from_secs(5), provider.chat(&request))
            .await
            .expect("provider retried internally instead of returning");
        let err = result.expect_err("429 must be an error");
        assert_eq!(err.failure_kind(), FailureKind::Transient);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify_stream_and_parse_errors() {
        let stream = OpenAiProvider::classify(&OpenAIError::StreamError("reset".to_string()));
        assert_eq!(stream.failure_kind(), FailureKind::Transient);

        let invalid =
            OpenAiProvider::classify(&OpenAIError::InvalidArgument("bad".to_string()));
        assert_eq!(invalid.failure_kind(), FailureKind::Fatal);
    }
}
