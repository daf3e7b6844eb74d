//! The case classifier boundary.
//!
//! Free-text case descriptions are mapped to an EPA by an external service.
//! Implementations live in the `entrust-classifier` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClassifierError;
use crate::model::Epa;

/// Trait for services that map a free-text case to an EPA.
#[async_trait]
pub trait CaseClassifier: Send + Sync {
    /// Human-readable classifier name (e.g. "openai").
    fn name(&self) -> &str;

    /// Pick the best matching EPA among `request.candidates`.
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError>;
}

/// A case description and the EPAs it may be matched to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub case_text: String,
    pub candidates: Vec<Epa>,
}

/// The classifier's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Id of the chosen candidate. Callers must still check it resolves.
    pub epa_id: Uuid,
    /// 0.0 to 1.0.
    pub confidence: f64,
    #[serde(default)]
    pub suggested_comment: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Default system prompt for classifier backends.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a medical expert specializing in surgical education and EPA mapping. Always respond with valid JSON.";

/// Build the user prompt listing every candidate EPA.
pub fn build_prompt(request: &ClassificationRequest) -> String {
    let epa_list = request
        .candidates
        .iter()
        .map(|epa| match &epa.description {
            Some(d) => format!("{}: {} - {}", epa.code, epa.title, d),
            None => format!("{}: {}", epa.code, epa.title),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Match the following surgical case description to the most appropriate \
         Entrustable Professional Activity (EPA).\n\n\
         Case description: \"{}\"\n\n\
         Available EPAs:\n{}\n\n\
         Recognize common surgical shorthand (\"chole\" is cholecystectomy, \"appy\" is \
         appendectomy, \"egd\" and \"peg\" are endoscopy, \"sbo\" is small bowel obstruction, \
         \"lap\" is laparoscopic).\n\n\
         Respond with a JSON object: {{\"epaCode\": \"EPA-X\", \"confidence\": 0.0-1.0, \
         \"reasoning\": \"...\", \"suggestedComment\": \"...\"}}",
        request.case_text.trim(),
        epa_list
    )
}

/// Extract a JSON payload from a possibly markdown-fenced response.
///
/// Prefers ```json blocks, then generic ``` blocks, then the raw text.
pub fn extract_json_from_markdown(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    // Unclosed block: keep what was accumulated
    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_blocks.push(current_block);
        } else if is_generic_block {
            generic_blocks.push(current_block);
        }
    }

    json_blocks
        .into_iter()
        .next()
        .or_else(|| generic_blocks.into_iter().next())
        .unwrap_or_else(|| response.trim().to_string())
}
