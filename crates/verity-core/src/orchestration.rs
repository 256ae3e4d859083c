//! Orchestration records: one per comprehensive assessment run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assessment::{Assessment, AssessmentStatus, Entry};
use crate::scoring::overall_score;
use crate::timestamp;

/// Lifecycle state of an orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Initialized,
    /// Some agents failed to create their assessment; the rest proceeded.
    PartiallyInitialized,
    Completed,
}

/// State of one dimension within an orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    Initialized,
    Completed,
    Failed,
}

impl From<AssessmentStatus> for DimensionStatus {
    fn from(status: AssessmentStatus) -> Self {
        match status {
            AssessmentStatus::Initialized => DimensionStatus::Initialized,
            AssessmentStatus::Completed => DimensionStatus::Completed,
        }
    }
}

/// Manifest entry linking an agent to the assessment it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssessment {
    /// Absent when the agent failed before an assessment existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    pub specialization: String,
    pub status: DimensionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentAssessment {
    pub fn created(assessment_id: String, specialization: &str) -> Self {
        Self {
            assessment_id: Some(assessment_id),
            specialization: specialization.to_string(),
            status: DimensionStatus::Initialized,
            error: None,
        }
    }

    pub fn failed(assessment_id: Option<String>, specialization: &str, error: String) -> Self {
        Self {
            assessment_id,
            specialization: specialization.to_string(),
            status: DimensionStatus::Failed,
            error: Some(error),
        }
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = DimensionStatus::Failed;
        self.error = Some(error);
    }
}

/// The aggregate record spanning every dimension of one review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orchestration {
    pub orchestration_id: String,
    pub system_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub status: OrchestrationStatus,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    /// Agent ID → the assessment that agent owns for this run.
    #[serde(default)]
    pub agent_assessments: BTreeMap<String, AgentAssessment>,
    #[serde(default)]
    pub integrated_findings: Vec<Entry>,
    #[serde(default)]
    pub integrated_risks: Vec<Entry>,
    #[serde(default)]
    pub integrated_recommendations: Vec<Entry>,
    #[serde(default)]
    pub compliance_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub overall_compliance_score: Option<f64>,
}

impl Orchestration {
    pub fn new(orchestration_id: String, system_id: &str, metadata: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            orchestration_id,
            system_id: system_id.to_string(),
            metadata,
            status: OrchestrationStatus::Initialized,
            created_at: now,
            updated_at: now,
            completed_at: None,
            agent_assessments: BTreeMap::new(),
            integrated_findings: Vec::new(),
            integrated_risks: Vec::new(),
            integrated_recommendations: Vec::new(),
            compliance_scores: BTreeMap::new(),
            overall_compliance_score: None,
        }
    }

    fn tick(&self) -> DateTime<Utc> {
        Utc::now().max(self.updated_at)
    }

    /// Number of manifest entries whose dimension failed.
    pub fn failed_dimensions(&self) -> usize {
        self.agent_assessments
            .values()
            .filter(|a| a.status == DimensionStatus::Failed)
            .count()
    }

    pub fn touch(&mut self) {
        self.updated_at = self.tick();
    }

    /// Clear the aggregation slots before a fresh integration pass.
    pub fn reset_integration(&mut self) {
        self.integrated_findings.clear();
        self.integrated_risks.clear();
        self.integrated_recommendations.clear();
        self.compliance_scores.clear();
        self.overall_compliance_score = None;
    }

    /// Fold one constituent assessment into the aggregate.
    ///
    /// Mirrors the assessment's score for its own specialization and appends
    /// its findings, risks and recommendations, each tagged with `agent_id`.
    pub fn integrate(&mut self, agent_id: &str, assessment: &Assessment) {
        if let Some(score) = assessment.compliance_scores.get(&assessment.specialization) {
            self.compliance_scores
                .insert(assessment.specialization.clone(), *score);
        }

        let tag = |entries: &[Entry]| -> Vec<Entry> {
            entries
                .iter()
                .cloned()
                .map(|mut e| {
                    e.fields
                        .insert("agent_id".to_string(), Value::String(agent_id.to_string()));
                    e
                })
                .collect()
        };
        self.integrated_findings.extend(tag(assessment.findings.as_slice()));
        self.integrated_risks.extend(tag(assessment.risks.as_slice()));
        self.integrated_recommendations
            .extend(tag(assessment.recommendations.as_slice()));

        if let Some(entry) = self.agent_assessments.get_mut(agent_id) {
            entry.status = assessment.status.into();
        }
    }

    /// Recompute the overall score and mark the run completed.
    pub fn complete(&mut self) {
        self.overall_compliance_score = overall_score(&self.compliance_scores);
        let now = self.tick();
        self.status = OrchestrationStatus::Completed;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
