use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One prompt sent to a language model: fixed instructions plus live context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

// Anything that can turn a prompt into text. The decision engine depends on
// this trait only, so tests drive it with `MockCompletionService` and the CLI
// can run fully offline.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

/// OpenAI chat completions, asked for a single JSON object.
pub struct OpenAiCompletion {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ]
        });

        let resp = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Failed to reach the OpenAI API")?
            .error_for_status()
            .context("OpenAI API returned an error status")?
            .json::<ChatResponse>()
            .await
            .context("Failed to decode the OpenAI response")?;

        let answer = &resp
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content;
        Ok(answer.clone())
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent`, with JSON output requested through the generation config.
pub struct GeminiCompletion {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiCompletion {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl CompletionService for GeminiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user }] }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json"
            }
        });

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Failed to reach the Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error status")?
            .json::<GeminiResponse>()
            .await
            .context("Failed to decode the Gemini response")?;

        let text: String = resp
            .candidates
            .first()
            .ok_or_else(|| anyhow::anyhow!("No candidates from Gemini"))?
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        Ok(text)
    }
}

/// A `CompletionService` that never calls out.
///
/// Every open-ended request gets `NONE`, so the assistant runs on its
/// deterministic rules alone. Useful without credentials and in demos.
pub struct OfflineCompletion;

#[async_trait]
impl CompletionService for OfflineCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Ok(r#"{"action": "NONE"}"#.to_string())
    }
}

/// Which completion backend a service talks to, from `COMPLETION_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionProvider {
    OpenAi,
    Gemini,
    Offline,
}

impl std::str::FromStr for CompletionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(CompletionProvider::OpenAi),
            "gemini" => Ok(CompletionProvider::Gemini),
            "offline" | "none" => Ok(CompletionProvider::Offline),
            other => Err(format!("unknown completion provider '{other}'")),
        }
    }
}

/// Builds the client for `provider`. Online providers need their API key.
pub fn connect(
    provider: CompletionProvider,
    openai_api_key: Option<&SecretString>,
    gemini_api_key: Option<&SecretString>,
    model: &str,
) -> Result<Arc<dyn CompletionService>> {
    let service: Arc<dyn CompletionService> = match provider {
        CompletionProvider::OpenAi => {
            let key = openai_api_key.context("OPENAI_API_KEY is required for the openai provider")?;
            Arc::new(OpenAiCompletion::new(key.clone(), model.to_string()))
        }
        CompletionProvider::Gemini => {
            let key = gemini_api_key.context("GEMINI_API_KEY is required for the gemini provider")?;
            Arc::new(GeminiCompletion::new(key.clone(), model.to_string()))
        }
        CompletionProvider::Offline => Arc::new(OfflineCompletion),
    };
    tracing::info!(?provider, model, "Completion service ready");
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_completion_stays_silent() {
        let request = CompletionRequest {
            system: "rules".to_string(),
            user: "Hey Veritas, what's the capital of France?".to_string(),
        };
        let reply = OfflineCompletion.complete(&request).await.unwrap();
        let wire = crate::action::parse_wire(&reply).unwrap();
        assert_eq!(wire.action, "NONE");
    }

    #[test]
    fn providers_parse_and_require_keys() {
        assert_eq!("OpenAI".parse(), Ok(CompletionProvider::OpenAi));
        assert_eq!("gemini".parse(), Ok(CompletionProvider::Gemini));
        assert_eq!("offline".parse(), Ok(CompletionProvider::Offline));
        assert!("claude".parse::<CompletionProvider>().is_err());

        assert!(connect(CompletionProvider::OpenAi, None, None, "gpt-4o").is_err());
        assert!(connect(CompletionProvider::Offline, None, None, "gpt-4o").is_ok());
        let key = SecretString::from("test-key".to_string());
        assert!(connect(CompletionProvider::Gemini, None, Some(&key), "gemini-1.5-flash").is_ok());
    }

    #[test]
    fn decodes_chat_and_gemini_shapes() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"action\":\"NONE\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.choices[0].message.content, r#"{"action":"NONE"}"#);

        let gemini: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"action\":"},{"text":"\"NONE\"}"}]}}]}"#,
        )
        .unwrap();
        let text: String = gemini.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, r#"{"action":"NONE"}"#);
    }

    /// Hits the real OpenAI API; run with `cargo test -- --ignored` and a key in `.env`.
    #[tokio::test]
    #[ignore]
    async fn openai_returns_a_json_object() {
        dotenvy::dotenv().ok();
        let key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");
        let client = OpenAiCompletion::new(SecretString::from(key), "gpt-4o-mini".to_string());
        let request = CompletionRequest {
            system: "Reply with a JSON object {\"action\": \"NONE\"} and nothing else.".to_string(),
            user: "hello".to_string(),
        };
        let reply = client.complete(&request).await.unwrap();
        assert!(crate::action::parse_wire(&reply).is_ok());
    }
}
