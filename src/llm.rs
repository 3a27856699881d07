use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

/// Text-completion capability consumed by the research engine.
///
/// Implementations must be safe to call concurrently; failures surface as `Err`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Token count used for trimming and chunking. Defaults to a chars/4 estimate.
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible chat completions client.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    tokenizer: CoreBPE,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:1234/v1".to_string());
        let model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "qwen/qwen3-8b".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        let temperature = match dotenv::var("LLM_TEMPERATURE") {
            Ok(raw) => raw
                .trim()
                .parse::<f32>()
                .with_context(|| format!("LLM_TEMPERATURE is not a number: {:?}", raw))?,
            Err(_) => 0.4,
        };
        let max_tokens = match dotenv::var("LLM_MAX_TOKENS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("LLM_MAX_TOKENS is not an integer: {:?}", raw))?,
            Err(_) => 4096,
        };
        let encoding =
            dotenv::var("LLM_TOKENIZER").unwrap_or_else(|_| "o200k_base".to_string());

        if url::Url::parse(&base_url).is_err() {
            bail!("LLM_BASE_URL is not a valid URL: {}", base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            temperature,
            max_tokens,
            tokenizer: load_tokenizer(&encoding)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;
        if !status.is_success() {
            bail!("LLM returned {}: {}", status, truncate(&text, 300));
        }
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        // choices[0].message.content may be null
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();

        if content.trim().is_empty() {
            bail!("LLM returned an empty completion");
        }
        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat(&messages).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode_with_special_tokens(text).len()
    }
}

fn load_tokenizer(encoding: &str) -> Result<CoreBPE> {
    let bpe = match encoding {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        other => bail!("Unsupported LLM_TOKENIZER {:?} (use o200k_base or cl100k_base)", other),
    };
    bpe.map_err(|e| anyhow::anyhow!("Failed to load {} tokenizer: {}", encoding, e))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
