//! Canned assessor output used when no real backend is available.

use async_trait::async_trait;
use serde_json::Value;

use super::{Assessor, AssessorOutput, Finding, Recommendation, Risk};
use crate::error::Result;

/// Returns the same marked placeholder for every dimension.
///
/// Placeholder output never carries a score, so an orchestration assessed
/// only by placeholders never reports an overall score.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderAssessor;

impl PlaceholderAssessor {
    pub fn output_for(dimension: &str) -> AssessorOutput {
        AssessorOutput {
            findings: vec![Finding {
                title: format!("Placeholder {dimension} finding"),
                description: format!(
                    "No {dimension} assessment was performed; \
                     this entry stands in for real findings"
                ),
                evidence: "none".to_string(),
                dimension: dimension.to_string(),
            }],
            risks: vec![Risk {
                title: format!("Unassessed {dimension} risk"),
                description: format!("{dimension} has not been assessed by a live assessor"),
                severity: "medium".to_string(),
                impact: "Unknown until a real assessment runs".to_string(),
                dimension: dimension.to_string(),
            }],
            recommendations: vec![Recommendation {
                title: format!("Re-run the {dimension} assessment"),
                description: "Configure an assessor backend and assess this dimension again"
                    .to_string(),
                implementation: "Set ANTHROPIC_API_KEY and re-run `verity assess`".to_string(),
                priority: "medium".to_string(),
                dimension: dimension.to_string(),
            }],
            compliance_score: None,
            compliance_score_justification: format!(
                "No score: {dimension} was not assessed by a live assessor"
            ),
            placeholder: true,
        }
    }
}

#[async_trait]
impl Assessor for PlaceholderAssessor {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn assess(&self, dimension: &str, _evidence: &Value) -> Result<AssessorOutput> {
        Ok(Self::output_for(dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_is_marked_and_unscored() {
        let out = PlaceholderAssessor
            .assess("transparency", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(out.placeholder);
        assert!(out.compliance_score.is_none());
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.risks[0].dimension, "transparency");
        assert!(out.recommendations[0].title.contains("transparency"));
    }
}
