use crate::config::GatewaySettings;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const TEMPERATURE: f32 = 0.4;
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

// Every other upstream failure is an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamReply {
    Text(String),
    RateLimited,
    QuotaExhausted,
}

#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<UpstreamReply>;
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

impl GatewayClient {
    pub fn new(settings: &GatewaySettings) -> Result<Self> {
        let user_agent = format!("calc-insight/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(settings.timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build AI gateway HTTP client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionApi for GatewayClient {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<UpstreamReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("AI_GATEWAY_API_KEY is not configured"))?;

        let body = ChatCompletionBody {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: prompt.max_tokens,
            temperature: TEMPERATURE,
        };

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("AI gateway request failed")?;

        let status = res.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Ok(UpstreamReply::RateLimited),
            StatusCode::PAYMENT_REQUIRED => return Ok(UpstreamReply::QuotaExhausted),
            _ => {}
        }

        let text = res
            .text()
            .await
            .context("Failed to read AI gateway body")?;
        if !status.is_success() {
            let snippet: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(anyhow!(
                "AI gateway HTTP error (status {}): {}",
                status,
                snippet
            ));
        }

        parse_completion(&text).map(UpstreamReply::Text)
    }
}

pub fn parse_completion(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ChatCompletion {
        #[serde(default)]
        choices: Vec<Choice>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Option<Message>,
    }
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }

    let parsed: ChatCompletion =
        serde_json::from_str(body).context("Failed to parse AI gateway JSON")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("AI gateway returned no completion text"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::HeaderMap,
        routing::post,
        Json, Router,
    };
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Received {
        bodies: Arc<Mutex<Vec<Value>>>,
        auth: Arc<Mutex<Vec<String>>>,
    }

    async fn fake_upstream(
        State(received): State<Received>,
        Path(code): Path<u16>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, String) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        received.auth.lock().unwrap().push(auth);
        received.bodies.lock().unwrap().push(body);

        let status = StatusCode::from_u16(code).unwrap();
        if status.is_success() {
            let reply = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
            (status, reply.to_string())
        } else {
            (status, "boom".to_string())
        }
    }

    async fn spawn_upstream() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/:code/v1/chat/completions", post(fake_upstream))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    fn client_for(base: &str, code: u16) -> GatewayClient {
        GatewayClient::new(&GatewaySettings {
            endpoint: format!("{base}/{code}/v1/chat/completions"),
            model: "test/model".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn sample_prompt() -> CompletionPrompt {
        CompletionPrompt {
            system: "You are a supportive health coach.".to_string(),
            user: "Calculator: BMI Calculator".to_string(),
            max_tokens: 120,
        }
    }

    #[tokio::test]
    async fn maps_upstream_status_codes() {
        let (base, _) = spawn_upstream().await;
        let prompt = sample_prompt();

        let reply = client_for(&base, 429).complete(&prompt).await.unwrap();
        assert_eq!(reply, UpstreamReply::RateLimited);

        let reply = client_for(&base, 402).complete(&prompt).await.unwrap();
        assert_eq!(reply, UpstreamReply::QuotaExhausted);

        let err = client_for(&base, 500).complete(&prompt).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");

        let reply = client_for(&base, 200).complete(&prompt).await.unwrap();
        assert_eq!(reply, UpstreamReply::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn sends_chat_completion_request_shape() {
        let (base, received) = spawn_upstream().await;
        client_for(&base, 200)
            .complete(&sample_prompt())
            .await
            .unwrap();

        let auth = received.auth.lock().unwrap();
        assert_eq!(*auth, vec!["Bearer sk-test".to_string()]);

        let bodies = received.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["model"], "test/model");
        assert_eq!(body["max_tokens"], 120);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - f64::from(TEMPERATURE)).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][0]["content"],
            "You are a supportive health coach."
        );
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Calculator: BMI Calculator");
        assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(2));
    }

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{
            "id": "cmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "  Your BMI is in the healthy range.  " } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ]
        }"#;
        assert_eq!(
            parse_completion(body).unwrap(),
            "Your BMI is in the healthy range."
        );
    }

    #[test]
    fn rejects_empty_or_missing_content() {
        assert!(parse_completion(r#"{"choices": []}"#).is_err());
        assert!(parse_completion(r#"{"choices": [{"message": {"content": "   "}}]}"#).is_err());
        assert!(parse_completion(r#"{"choices": [{"message": null}]}"#).is_err());
        assert!(parse_completion(r#"{"error": "boom"}"#).is_err());
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_completion("<html>bad gateway</html>").is_err());
    }

    #[tokio::test]
    async fn missing_api_key_is_an_error() {
        let client = GatewayClient::new(&GatewaySettings {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let err = client
            .complete(&CompletionPrompt {
                system: "s".to_string(),
                user: "u".to_string(),
                max_tokens: 10,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AI_GATEWAY_API_KEY"));
    }
}
