//! Ollama client.
//!
//! Talks to a local Ollama instance over its `/api/generate` endpoint.
//! Conversation context is rendered into a single prompt with the tutor
//! persona as the system instruction.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, ConnectionStatus, InferenceError};
use crate::session::Role;
use parley_common::config::OllamaConfig;

/// System instruction defining the tutor persona.
const SYSTEM_PROMPT: &str = "\
You are an enthusiastic and patient English language tutor. Your role is to:

1. Have natural, engaging conversations with students learning English
2. Ask interesting questions about their daily life, hobbies, interests, and opinions
3. Listen actively and provide constructive feedback on their responses
4. Gently correct grammar mistakes in a supportive way
5. Suggest better vocabulary choices when appropriate
6. Encourage them to express themselves more
7. Keep the conversation flowing naturally by asking follow-up questions
8. Adapt to their English level - if they make many mistakes, use simpler language; if they're advanced, challenge them more
9. Be encouraging and positive - learning a language should be fun!
10. Keep your responses conversational and not too long (2-4 sentences typically)

Guidelines:
- Start with a warm greeting and an easy question
- When you notice mistakes, acknowledge their effort first, then provide gentle corrections like \"Great effort! A better way to say that would be...\"
- End each response with a question to keep the conversation going
- Mix different topics: daily routines, preferences, experiences, opinions, hypothetical scenarios
- Show genuine interest in their responses
- If they're struggling, offer encouragement and maybe rephrase your question more simply

Remember: You're having a conversation, not giving a lecture. Be friendly, natural, and supportive!";

/// Greeting returned when the backend cannot produce one.
pub const FALLBACK_GREETING: &str = "Hello! I'm your English tutor, and I'm so excited to help \
you practice English today! Let's have a nice conversation together. To start, can you tell me \
a bit about yourself? What do you like to do in your free time?";

/// Probe timeout for `/api/tags`.
const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the Ollama API (defaults to http://localhost:11434)
    /// * `model` - Model name to generate with
    /// * `timeout` - Bound on each generation call
    pub fn new(base_url: Option<&str>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url
                .unwrap_or("http://localhost:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            timeout,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self::new(
            Some(&config.base_url),
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Render the conversation context into a single prompt.
    fn build_prompt(context: &[ChatMessage]) -> String {
        let mut prompt = String::from(SYSTEM_PROMPT);
        prompt.push_str("\n\n");

        for msg in context {
            match msg.role {
                Role::User => {
                    prompt.push_str("Student: ");
                    prompt.push_str(&msg.content);
                    prompt.push_str("\n\n");
                }
                Role::Assistant => {
                    prompt.push_str("Tutor: ");
                    prompt.push_str(&msg.content);
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.push_str("Tutor: ");
        prompt
    }

    async fn generate(&self, prompt: String, top_k: Option<i64>) -> Result<String, InferenceError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.8,
                top_p: 0.9,
                top_k,
            },
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::BadResponse(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::BadResponse(format!("undecodable body: {}", e)))?;

        Ok(result.response.trim().to_string())
    }

    fn map_send_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            InferenceError::Unreachable {
                url: self.base_url.clone(),
                reason: e.to_string(),
            }
        }
    }

    /// Generate the assistant's next reply for the given context.
    pub async fn chat(&self, context: &[ChatMessage]) -> Result<String, InferenceError> {
        let prompt = Self::build_prompt(context);
        self.generate(prompt, Some(40)).await
    }

    /// Request an opening message for a fresh conversation.
    ///
    /// Never fails: if the backend cannot produce a greeting the hardcoded
    /// fallback is returned instead.
    pub async fn greeting(&self) -> String {
        let prompt = format!(
            "{}\n\nYou are meeting a new student for the first time. Give them a warm, \
             friendly greeting and introduce yourself as their English tutor. Then ask them \
             an easy, engaging question to start the conversation (like about their day, \
             their interests, or where they're from). Keep it natural and encouraging!\n\nTutor: ",
            SYSTEM_PROMPT
        );

        match self.generate(prompt, None).await {
            Ok(greeting) => greeting,
            Err(e) => {
                tracing::warn!(error = %e, "Greeting generation failed, using fallback");
                FALLBACK_GREETING.to_string()
            }
        }
    }

    /// Probe the backend and report whether the configured model is present.
    pub async fn test_connection(&self) -> ConnectionStatus {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(CONNECTION_TEST_TIMEOUT)
            .send()
            .await;

        let tags: TagsResponse = match response {
            Ok(r) if r.status().is_success() => r.json().await.unwrap_or(TagsResponse {
                models: Vec::new(),
            }),
            _ => {
                return ConnectionStatus {
                    connected: false,
                    model_available: false,
                    available_models: Vec::new(),
                }
            }
        };

        let available_models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        let model_available = available_models.iter().any(|m| m.contains(&self.model));

        ConnectionStatus {
            connected: true,
            model_available,
            available_models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    #[test]
    fn default_url() {
        let c = OllamaClient::new(None, "llama2", Duration::from_secs(60));
        assert_eq!(c.base_url(), "http://localhost:11434");
    }

    #[test]
    fn custom_url_trailing_slash() {
        let c = OllamaClient::new(
            Some("http://192.168.1.100:11434/"),
            "llama2",
            Duration::from_secs(60),
        );
        assert_eq!(c.base_url(), "http://192.168.1.100:11434");
    }

    #[test]
    fn prompt_opens_with_system_instruction() {
        let prompt = OllamaClient::build_prompt(&[]);
        assert!(prompt.starts_with("You are an enthusiastic and patient English language tutor"));
        assert!(prompt.ends_with("Tutor: "));
    }

    #[test]
    fn prompt_renders_turns_in_order() {
        let prompt = OllamaClient::build_prompt(&[
            msg(Role::User, "Hello"),
            msg(Role::Assistant, "Hi! How are you?"),
            msg(Role::User, "I am fine"),
        ]);

        let student = prompt.find("Student: Hello").unwrap();
        let tutor = prompt.find("Tutor: Hi! How are you?").unwrap();
        let second = prompt.find("Student: I am fine").unwrap();
        assert!(student < tutor);
        assert!(tutor < second);
        assert!(prompt.ends_with("Tutor: "));
    }

    #[test]
    fn request_serializes_options() {
        let request = GenerateRequest {
            model: "llama2".into(),
            prompt: "hello".into(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.8,
                top_p: 0.9,
                top_k: Some(40),
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"temperature\":0.8"));
        assert!(json.contains("\"top_k\":40"));
    }

    #[test]
    fn request_omits_absent_top_k() {
        let request = GenerateRequest {
            model: "llama2".into(),
            prompt: "hello".into(),
            stream: false,
            options: GenerateOptions {
                temperature: 0.8,
                top_p: 0.9,
                top_k: None,
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("top_k"));
    }

    #[test]
    fn response_deserializes() {
        let json = r#"{"model":"llama2","response":"  Hi there!  ","done":true}"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.response, "  Hi there!  ");
    }

    #[test]
    fn tags_response_tolerates_missing_models() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_falls_back_for_greeting() {
        // Nothing listens on this port.
        let c = OllamaClient::new(Some("http://127.0.0.1:1"), "llama2", Duration::from_secs(1));
        assert_eq!(c.greeting().await, FALLBACK_GREETING);
    }

    #[tokio::test]
    async fn unreachable_backend_reports_disconnected() {
        let c = OllamaClient::new(Some("http://127.0.0.1:1"), "llama2", Duration::from_secs(1));
        let status = c.test_connection().await;
        assert!(!status.connected);
        assert!(!status.model_available);
    }
}
