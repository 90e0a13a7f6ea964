//! Chat-completion backed context scorer.

use crate::error::ContextScoringError;
use crate::extract::truncate_chars;
use crate::scoring::{ContextScorer, ANALYSIS_PROMPT_CHARS, CONTEXT_PROMPT_CHARS, MAX_CONTEXT_SCORE};
use crate::types::{join_areas, ServiceArea};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const ANALYST_SYSTEM_PROMPT: &str = "You are a senior business development manager for an actuarial advisory firm \
specializing in insurance, pensions, risk management, and regulatory compliance. Analyze tender opportunities \
and provide strategic business insights.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Context scorer that asks a chat-completion model for the score and narrative.
#[derive(Clone)]
pub struct LlmContextScorer {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmContextScorer {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<String, ContextScoringError> {
        let start = std::time::Instant::now();
        let request = ChatRequest { model: &self.model, messages };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Context scorer request failed");
                ContextScoringError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ContextScoringError::Api(format!("{}: {}", status, error_text)));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ContextScoringError::Api(format!("unreadable response: {}", e)))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion"
        );

        raw.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ContextScoringError::Empty)
    }
}

#[async_trait]
impl ContextScorer for LlmContextScorer {
    async fn score_context(&self, text: &str) -> Result<u8, ContextScoringError> {
        let prompt = format!(
            "Score this tender opportunity for an actuarial advisory firm on a scale of 0-{max} \
             (additional context points).\n\n\
             Consider:\n\
             - How closely the requirements match actuarial services\n\
             - Complexity and scope of work\n\
             - Potential for follow-on work\n\
             - Strategic value for the firm\n\n\
             Tender text: {text}\n\n\
             Return only a number between 0-{max}.",
            max = MAX_CONTEXT_SCORE,
            text = truncate_chars(text, CONTEXT_PROMPT_CHARS),
        );
        let content = self.chat(vec![Message::user(prompt)]).await?;
        parse_context_score(&content)
    }

    async fn generate_analysis(
        &self,
        text: &str,
        title: &str,
        service_areas: &BTreeSet<ServiceArea>,
    ) -> Result<String, ContextScoringError> {
        let prompt = format!(
            "Analyze this tender opportunity:\n\n\
             Title: {title}\n\
             Matched Service Areas: {areas}\n\n\
             Tender Content: {text}\n\n\
             Provide a concise analysis covering:\n\
             1. Key requirements and how they align with our actuarial services\n\
             2. Potential scope of work and engagement size\n\
             3. Strategic value and growth potential\n\
             4. Competitive landscape assessment\n\
             5. Recommended approach and team composition\n\
             6. Risk factors and challenges\n\n\
             Keep response to 300-400 words, focused on actionable business insights.",
            title = title,
            areas = join_areas(service_areas),
            text = truncate_chars(text, ANALYSIS_PROMPT_CHARS),
        );
        self.chat(vec![Message::system(ANALYST_SYSTEM_PROMPT), Message::user(prompt)])
            .await
    }
}

/// Parses the model's reply into a context score, clamped to the allowed range.
pub fn parse_context_score(content: &str) -> Result<u8, ContextScoringError> {
    let trimmed = content.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ContextScoringError::NotNumeric(trimmed.to_string()))?;
    Ok(value.clamp(0, i64::from(MAX_CONTEXT_SCORE)) as u8)
}
