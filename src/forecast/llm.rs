use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmSettings;
use crate::error::ForecastError;

/// A prompt whose answer must be JSON matching `schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPrompt {
    pub system: String,
    pub user: String,
    pub schema_name: String,
    pub schema: Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model's answer parsed as JSON. Schema conformance is
    /// checked by the caller.
    async fn complete_json(&self, prompt: StructuredPrompt) -> Result<Value, ForecastError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchema<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchema<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client using structured outputs.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, ForecastError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatClient {
    async fn complete_json(&self, prompt: StructuredPrompt) -> Result<Value, ForecastError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchema {
                    name: &prompt.schema_name,
                    strict: true,
                    schema: &prompt.schema,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ForecastError::Api(format!("{}: {}", status, error_text)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Api(format!("unreadable completion: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ForecastError::Api("completion has no content".to_string()))?;

        debug!("{} returned {} chars", self.model, content.len());
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_uses_json_schema_format() {
        let schema = json!({"type": "object"});
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchema {
                    name: "profit_forecast",
                    strict: true,
                    schema: &schema,
                },
            },
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "profit_forecast");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_content_is_optional() {
        let response: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"role": "assistant"}}]})).unwrap();
        assert!(response.choices[0].message.content.is_none());
    }

    #[test]
    fn test_client_trims_base_url() {
        let settings = LlmSettings {
            base_url: "http://llm.local/".to_string(),
            api_key: "key".to_string(),
            ..LlmSettings::default()
        };
        let client = OpenAiChatClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "http://llm.local");
    }
}
