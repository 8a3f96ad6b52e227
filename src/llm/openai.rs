//! Client for OpenAI-compatible chat-completion and image endpoints.
//!
//! Requests go to `{base_url}/chat/completions` and `{base_url}/images/generations`
//! with bearer authentication, optionally through an HTTP(S) proxy.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Proxy, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::core::config::ApiConfig;
use crate::chat::core::ids::ModelId;
use crate::llm::error::CompletionError;
use crate::llm::messages::ChatMessage;

/// Boxed future type for completion operations.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Connection timeout for the endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest error body kept in diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;
/// Image size requested from the image endpoint.
const IMAGE_SIZE: &str = "1024x1024";

/// Anything that turns an ordered message list into a reply.
pub trait CompletionClient: Send + Sync {
    /// Send one completion request and return the first choice's text.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response carries no choice.
    fn complete(&self, messages: Vec<ChatMessage>)
    -> CompletionFuture<'_, Result<String, CompletionError>>;
}

/// Anything that turns a prompt into generated image URLs.
pub trait ImageGenerator: Send + Sync {
    /// Generate images for a prompt and return their URLs.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response carries no image.
    fn generate_images(&self, prompt: String)
    -> CompletionFuture<'_, Result<Vec<String>, CompletionError>>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Async client for an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: ModelId,
    chat_url: String,
    images_url: String,
}

impl OpenAiClient {
    /// Build a client from endpoint settings.
    ///
    /// # Errors
    /// Returns an error if the proxy URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, CompletionError> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.request_timeout_seconds));
        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|err| CompletionError::Config(format!("invalid proxy {proxy}: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| CompletionError::Config(err.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            chat_url: format!("{base_url}/chat/completions"),
            images_url: format!("{base_url}/images/generations"),
        })
    }

    /// Model used for completions.
    #[must_use]
    pub const fn model(&self) -> &ModelId {
        &self.model
    }

    async fn post_chat(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: self.model.as_str(),
            messages,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: ChatCompletionResponse = response.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoices)?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn post_images(&self, prompt: &str) -> Result<Vec<String>, CompletionError> {
        let request = ImageRequest {
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            response_format: "url",
        };

        let response = self
            .client
            .post(&self.images_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: ImageResponse = response.json().await?;
        let urls: Vec<String> = body.data.into_iter().filter_map(|d| d.url).collect();
        if urls.is_empty() {
            return Err(CompletionError::NoImages);
        }
        Ok(urls)
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> CompletionFuture<'_, Result<String, CompletionError>> {
        Box::pin(async move { self.post_chat(&messages).await })
    }
}

impl ImageGenerator for OpenAiClient {
    fn generate_images(
        &self,
        prompt: String,
    ) -> CompletionFuture<'_, Result<Vec<String>, CompletionError>> {
        Box::pin(async move { self.post_images(&prompt).await })
    }
}

async fn ensure_success(response: Response) -> Result<Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CompletionError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(&ApiConfig::new("sk-test", format!("{}/v1/", server.uri()))).unwrap()
    }

    #[tokio::test]
    async fn sends_model_and_messages_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi"},
                    {"role": "user", "content": "how are you"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "fine"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(vec![
                ChatMessage::user("hello"),
                ChatMessage::assistant("hi"),
                ChatMessage::user("how are you"),
            ])
            .await
            .unwrap();
        assert_eq!(reply, "fine");
    }

    #[tokio::test]
    async fn non_success_status_keeps_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Status { status: 429, .. }));
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::NoChoices));
    }

    #[tokio::test]
    async fn null_content_reads_as_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(vec![ChatMessage::user("hello")])
            .await
            .unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn generates_image_urls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_json(serde_json::json!({
                "prompt": "a red fox",
                "n": 1,
                "size": "1024x1024",
                "response_format": "url"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"url": "https://img.example.com/fox.png"}]
            })))
            .mount(&server)
            .await;

        let urls = client_for(&server)
            .generate_images("a red fox".to_string())
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://img.example.com/fox.png".to_string()]);
    }

    #[test]
    fn rejects_invalid_proxy() {
        let mut config = ApiConfig::new("k", "https://api.example.com");
        config.proxy = Some("::not a proxy::".to_string());
        assert!(matches!(
            OpenAiClient::new(&config),
            Err(CompletionError::Config(_))
        ));
    }

    #[test]
    fn accepts_http_proxy() {
        let mut config = ApiConfig::new("k", "https://api.example.com/v1");
        config.proxy = Some("http://127.0.0.1:7890".to_string());
        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.chat_url, "https://api.example.com/v1/chat/completions");
        assert_eq!(client.model().as_str(), "gpt-3.5-turbo");
    }
}
