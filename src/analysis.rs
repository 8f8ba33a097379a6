//! Analysis of pasted source material.
//!
//! Validates the form input, composes the prompt, calls the model, and
//! cleans the returned markup. The result is a draft for the user to edit;
//! nothing is stored here.

use material_library_core::{markup, prompt};
use serde::Deserialize;

use crate::llm::{ChatClient, LlmError};

/// Form input for one analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub title: String,
    pub source_text: String,
    pub topics: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("source text must not be empty")]
    MissingSourceText,

    #[error("at least one topic must be selected")]
    NoTopics,

    #[error("no API key in this session")]
    MissingCredential,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.source_text.trim().is_empty() {
            return Err(AnalysisError::MissingSourceText);
        }
        if self.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(AnalysisError::NoTopics);
        }
        Ok(())
    }

    pub fn prompt(&self) -> String {
        let topics: Vec<String> = self
            .topics
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        prompt::build_prompt(self.title.trim(), &self.source_text, &topics)
    }
}

/// Run one analysis and return the cleaned draft.
pub async fn analyze(
    client: &ChatClient,
    request: &AnalysisRequest,
) -> Result<String, AnalysisError> {
    request.validate()?;
    let output = client.complete(&request.prompt()).await?;
    Ok(markup::post_process(&output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &str, topics: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            title: "T".to_string(),
            source_text: source.to_string(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            request("  ", &["A"]).validate(),
            Err(AnalysisError::MissingSourceText)
        ));
        assert!(matches!(
            request("text", &[]).validate(),
            Err(AnalysisError::NoTopics)
        ));
        assert!(matches!(
            request("text", &[" "]).validate(),
            Err(AnalysisError::NoTopics)
        ));
        assert!(request("text", &["A"]).validate().is_ok());
    }

    #[test]
    fn test_prompt_skips_blank_topics() {
        let p = request("text", &["A", " ", "B"]).prompt();
        assert!(p.contains("《A》《B》"));
    }
}
