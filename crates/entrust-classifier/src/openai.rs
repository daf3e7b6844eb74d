//! OpenAI chat-completions case classifier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use entrust_core::error::ClassifierError;
use entrust_core::traits::{
    build_prompt, extract_json_from_markdown, CaseClassifier, Classification,
    ClassificationRequest, DEFAULT_SYSTEM_PROMPT,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const TEMPERATURE: f64 = 0.1;

/// Classifier backed by an OpenAI-compatible chat-completions API.
pub struct OpenAiClassifier {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClassifierError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The JSON object the model is asked to answer with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EpaMapping {
    pub epa_code: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub suggested_comment: Option<String>,
}

/// Parse the model's reply and resolve its EPA code against the candidates.
pub(crate) fn parse_mapping(
    content: &str,
    request: &ClassificationRequest,
) -> Result<Classification, ClassifierError> {
    let json = extract_json_from_markdown(content);
    let mapping: EpaMapping = serde_json::from_str(&json)
        .map_err(|e| ClassifierError::Malformed(format!("invalid mapping JSON: {e}")))?;

    let epa = request
        .candidates
        .iter()
        .find(|epa| epa.code.eq_ignore_ascii_case(mapping.epa_code.trim()))
        .ok_or_else(|| {
            ClassifierError::NoMatch(format!("unknown EPA code '{}'", mapping.epa_code))
        })?;

    Ok(Classification {
        epa_id: epa.id,
        confidence: mapping.confidence,
        suggested_comment: mapping
            .suggested_comment
            .filter(|c| !c.trim().is_empty())
            .or_else(|| Some(format!("AI-mapped case: {}", request.case_text.trim()))),
        reasoning: mapping.reasoning,
    })
}

#[async_trait]
impl CaseClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, candidates = request.candidates.len()))]
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: DEFAULT_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(request),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ClassifierError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(ClassifierError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::AuthenticationFailed(body));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ApiError {
                status,
                message: body,
            });
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            ClassifierError::Malformed(format!("failed to parse response: {e}"))
        })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ClassifierError::Malformed("empty completion".into()))?;

        parse_mapping(&content, request)
    }
}
