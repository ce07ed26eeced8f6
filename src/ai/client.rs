use crate::config::CompletionSettings;
use crate::core::model::Message;
use crate::error::WorkbenchError;
use serde_json::{json, Value};
use tokio::time::Duration;

pub const MAX_TOKENS: u32 = 150;
pub const TEMPERATURE: f64 = 0.7;
pub const NO_RESPONSE: &str = "No response received.";

pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl CompletionClient {
    /// Returns `None` when no credential is configured.
    pub fn from_settings(settings: &CompletionSettings) -> Option<Self> {
        let api_key = settings.api_key.clone()?;
        Some(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the system prompt followed by `turns` and returns the reply text.
    pub async fn complete(&self, system_prompt: &str, turns: &[Message]) -> Result<String, WorkbenchError> {
        let payload = build_payload(&self.model, system_prompt, turns);

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let err_text = res.text().await.unwrap_or_default();
            log::error!("Completion API Error {status}: {err_text}");
            return Err(WorkbenchError::TransportFailure(format!("API Error {}", status.as_u16())));
        }

        let body: Value = res.json().await?;
        Ok(extract_reply(&body))
    }
}

fn build_payload(model: &str, system_prompt: &str, turns: &[Message]) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    messages.extend(
        turns
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content })),
    );

    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": TEMPERATURE,
        "messages": messages,
    })
}

fn extract_reply(body: &Value) -> String {
    body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or(NO_RESPONSE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(url: &str) -> CompletionClient {
        CompletionClient::from_settings(&CompletionSettings {
            api_url: format!("{url}/v1/chat/completions"),
            model: "test-model".into(),
            api_key: Some("sk-test".into()),
        })
        .unwrap()
    }

    #[test]
    fn no_client_without_key() {
        let settings = CompletionSettings {
            api_url: "http://localhost".into(),
            model: "m".into(),
            api_key: None,
        };
        assert!(CompletionClient::from_settings(&settings).is_none());
    }

    #[test]
    fn payload_has_system_prompt_first() {
        let turns = vec![Message::user("hi")];
        let payload = build_payload("m", "SYSTEM", &turns);
        assert_eq!(payload["max_tokens"], json!(150));
        assert_eq!(payload["temperature"], json!(0.7));
        assert_eq!(payload["messages"][0], json!({ "role": "system", "content": "SYSTEM" }));
        assert_eq!(payload["messages"][1], json!({ "role": "user", "content": "hi" }));
    }

    #[test]
    fn missing_content_falls_back() {
        assert_eq!(extract_reply(&json!({ "choices": [] })), NO_RESPONSE);
        assert_eq!(extract_reply(&json!({})), NO_RESPONSE);
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({ "model": "test-model", "max_tokens": 150 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Let's pause."}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let reply = client_for(&server.url())
            .complete("SYSTEM", &[Message::user("I'm anxious")])
            .await
            .unwrap();

        assert_eq!(reply, "Let's pause.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_transport_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = client_for(&server.url())
            .complete("SYSTEM", &[Message::user("hello")])
            .await
            .unwrap_err();

        assert!(matches!(err, WorkbenchError::TransportFailure(ref m) if m == "API Error 429"));
    }
}
