use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::OpenAiConfig;
use crate::retry::RetryPolicy;


const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";


/// Vision-to-text collaborator: asks a hosted model to describe an
/// image supplied as a base64 data URL.
///
/// Transport errors are retried with a fixed delay; a response shorter
/// than the configured minimum is re-requested up to the attempt budget
/// and then reported as a failure.
pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
    min_len: usize,
    max_attempts: u32,
    error_delay: Duration,
}

impl VisionClient {
    pub fn new(config: &OpenAiConfig, api_key: String) -> Self {
        Self {
            http: dropfill_chain_client::default_http_client(),
            api_key,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            min_len: config.description_min_len,
            max_attempts: config.max_attempts,
            error_delay: Duration::from_secs(config.error_delay_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn describe(&self, image_base64: &str, mime_type: &str) -> anyhow::Result<String> {
        let retry = RetryPolicy::unbounded(self.error_delay);
        let mut attempts_left = self.max_attempts;
        loop {
            let text = retry
                .run("vision api call", || self.request(image_base64, mime_type))
                .await?;

            if text.len() < self.min_len {
                if attempts_left > 0 {
                    attempts_left -= 1;
                    warn!(
                        len = text.len(),
                        min_len = self.min_len,
                        "description is too short, trying again ({} attempts left)",
                        attempts_left
                    );
                    continue;
                }
                return Err(anyhow!(
                    "the model kept answering below {} characters",
                    self.min_len
                ));
            }

            return Ok(text);
        }
    }

    async fn request(&self, image_base64: &str, mime_type: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.prompt },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", mime_type, image_base64)
                        }
                    }
                ]
            }]
        });

        let response: Value = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to decode the chat completion response")?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("chat completion response carries no message content"))
    }
}
