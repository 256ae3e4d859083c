//! The assessor capability: evidence in, findings and a score out.
//!
//! The orchestrator treats an assessor as an opaque, possibly remote call.
//! [`assess_with_fallback`] bounds that call with a timeout and substitutes a
//! clearly-marked placeholder when the assessor is unreachable, times out, or
//! returns an invalid score, so one dimension never takes down a whole run.
//!
//! # Module layout
//!
//! - [`placeholder`]: `PlaceholderAssessor`, canned output with no score
//! - [`claude`]: `ClaudeAssessor`, Messages API backend over `reqwest`

pub mod claude;
pub mod placeholder;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::observer::{AssessmentObserver, LifecycleEvent};
use crate::scoring::validate_score;

pub use claude::{ClaudeAssessor, ClaudeConfig};
pub use placeholder::PlaceholderAssessor;

/// Evidence key under which an agent's knowledge base reaches the assessor.
pub const REFERENCE_KNOWLEDGE_KEY: &str = "reference_knowledge";

/// Evidence for one dimension, with the agent's knowledge attached.
///
/// Knowledge is only attached to object (or null) evidence and only when
/// non-empty; otherwise the evidence is passed through untouched.
pub fn evidence_with_knowledge<'a>(
    evidence: &'a Value,
    knowledge: &Map<String, Value>,
) -> Cow<'a, Value> {
    if knowledge.is_empty() {
        return Cow::Borrowed(evidence);
    }
    let mut fields = match evidence {
        Value::Object(fields) => fields.clone(),
        Value::Null => Map::new(),
        _ => return Cow::Borrowed(evidence),
    };
    fields.insert(
        REFERENCE_KNOWLEDGE_KEY.to_string(),
        Value::Object(knowledge.clone()),
    );
    Cow::Owned(Value::Object(fields))
}

/// An observation about the system under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub dimension: String,
}

/// A potential harm, with severity and impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub dimension: String,
}

/// A remediation step, with implementation guidance and priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub dimension: String,
}

/// Everything an assessor returns for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessorOutput {
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    /// Dimension score on the 0.0–5.0 scale. Placeholders never carry one.
    #[serde(default)]
    pub compliance_score: Option<f64>,
    #[serde(default, alias = "compliance_justification")]
    pub compliance_score_justification: String,
    /// True when this output was not produced by a real assessment.
    #[serde(default)]
    pub placeholder: bool,
}

impl AssessorOutput {
    /// Fill in `dimension` on every item that left it empty.
    pub fn tag_dimension(mut self, dimension: &str) -> Self {
        for f in &mut self.findings {
            if f.dimension.is_empty() {
                f.dimension = dimension.to_string();
            }
        }
        for r in &mut self.risks {
            if r.dimension.is_empty() {
                r.dimension = dimension.to_string();
            }
        }
        for r in &mut self.recommendations {
            if r.dimension.is_empty() {
                r.dimension = dimension.to_string();
            }
        }
        self
    }
}

/// A backend that turns evidence into an assessment of one dimension.
#[async_trait]
pub trait Assessor: Send + Sync {
    /// Short backend name recorded alongside every result.
    fn name(&self) -> &str;

    /// Assess `evidence` for `dimension`.
    ///
    /// Returns `VerityError::AssessorUnavailable` when the backend cannot
    /// produce a result.
    async fn assess(&self, dimension: &str, evidence: &Value) -> Result<AssessorOutput>;
}

/// Run `assessor` with a timeout, degrading to a placeholder on any failure.
///
/// The returned output always has every item tagged with `dimension`.
pub async fn assess_with_fallback(
    assessor: &dyn Assessor,
    dimension: &str,
    evidence: &Value,
    timeout: Duration,
    observer: &dyn AssessmentObserver,
) -> AssessorOutput {
    let outcome = match tokio::time::timeout(timeout, assessor.assess(dimension, evidence)).await {
        Err(_) => Err(format!(
            "{} timed out after {}s",
            assessor.name(),
            timeout.as_secs_f64()
        )),
        Ok(Err(e)) => Err(e.to_string()),
        Ok(Ok(output)) => match output.compliance_score {
            Some(score) => validate_score(dimension, score)
                .map(|_| output)
                .map_err(|e| e.to_string()),
            None => Ok(output),
        },
    };

    match outcome {
        Ok(output) => output.tag_dimension(dimension),
        Err(reason) => {
            observer.observe(&LifecycleEvent::AssessorFallback {
                dimension: dimension.to_string(),
                reason,
            });
            PlaceholderAssessor::output_for(dimension)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerityError;
    use crate::observer::RecordingObserver;
    use serde_json::json;

    struct Fixed(Result<AssessorOutput>);

    #[async_trait]
    impl Assessor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn assess(&self, _dimension: &str, _evidence: &Value) -> Result<AssessorOutput> {
            match &self.0 {
                Ok(out) => Ok(out.clone()),
                Err(e) => Err(VerityError::AssessorUnavailable(e.to_string())),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl Assessor for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn assess(&self, _dimension: &str, _evidence: &Value) -> Result<AssessorOutput> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AssessorOutput::default())
        }
    }

    fn scored(score: f64) -> AssessorOutput {
        AssessorOutput {
            findings: vec![Finding {
                title: "t".to_string(),
                description: "d".to_string(),
                evidence: String::new(),
                dimension: String::new(),
            }],
            compliance_score: Some(score),
            compliance_score_justification: "because".to_string(),
            ..AssessorOutput::default()
        }
    }

    #[tokio::test]
    async fn successful_output_is_tagged() {
        let observer = RecordingObserver::new();
        let out = assess_with_fallback(
            &Fixed(Ok(scored(4.0))),
            "fairness",
            &json!({}),
            Duration::from_secs(5),
            &observer,
        )
        .await;
        assert_eq!(out.compliance_score, Some(4.0));
        assert_eq!(out.findings[0].dimension, "fairness");
        assert!(!out.placeholder);
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn unavailable_assessor_falls_back() {
        let observer = RecordingObserver::new();
        let out = assess_with_fallback(
            &Fixed(Err(VerityError::AssessorUnavailable("no key".to_string()))),
            "privacy",
            &json!({}),
            Duration::from_secs(5),
            &observer,
        )
        .await;
        assert!(out.placeholder);
        assert!(out.compliance_score.is_none());
        assert!(matches!(
            &observer.events()[0],
            LifecycleEvent::AssessorFallback { dimension, .. } if dimension == "privacy"
        ));
    }

    #[tokio::test]
    async fn out_of_range_score_falls_back() {
        let observer = RecordingObserver::new();
        let out = assess_with_fallback(
            &Fixed(Ok(scored(11.0))),
            "safety",
            &json!({}),
            Duration::from_secs(5),
            &observer,
        )
        .await;
        assert!(out.placeholder);
        assert_eq!(observer.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let observer = RecordingObserver::new();
        let out = assess_with_fallback(
            &Slow,
            "security",
            &json!({}),
            Duration::from_secs(30),
            &observer,
        )
        .await;
        assert!(out.placeholder);
        match &observer.events()[0] {
            LifecycleEvent::AssessorFallback { reason, .. } => {
                assert!(reason.contains("timed out"))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn knowledge_is_attached_only_when_present() {
        let evidence = json!({"documentation": "card"});
        let empty = Map::new();
        assert!(matches!(
            evidence_with_knowledge(&evidence, &empty),
            Cow::Borrowed(_)
        ));

        let mut knowledge = Map::new();
        knowledge.insert("frameworks".to_string(), json!(["GDPR"]));
        let merged = evidence_with_knowledge(&evidence, &knowledge);
        assert_eq!(merged["documentation"], "card");
        assert_eq!(merged[REFERENCE_KNOWLEDGE_KEY]["frameworks"], json!(["GDPR"]));

        let scalar = json!("just text");
        assert_eq!(*evidence_with_knowledge(&scalar, &knowledge), scalar);
    }

    #[test]
    fn legacy_justification_key_is_accepted() {
        let out: AssessorOutput = serde_json::from_value(json!({
            "findings": [],
            "risks": [],
            "recommendations": [],
            "compliance_score": 3.5,
            "compliance_justification": "legacy"
        }))
        .unwrap();
        assert_eq!(out.compliance_score_justification, "legacy");
        assert!(!out.placeholder);
    }
}
