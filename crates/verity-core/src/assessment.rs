//! Per-dimension assessment records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, VerityError};
use crate::observer::EntryKind;
use crate::scoring::{overall_score, validate_score};
use crate::timestamp;

/// Lifecycle state of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Initialized,
    Completed,
}

/// One item in an append-only list, stamped when it was inserted.
///
/// The item's own fields are kept verbatim next to `timestamp`; a
/// caller-supplied `timestamp` field is replaced by the insertion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    /// Stamp a JSON object. Anything other than an object is rejected.
    pub fn stamp(item: Value, at: DateTime<Utc>) -> Result<Self> {
        let mut fields = match item {
            Value::Object(fields) => fields,
            other => {
                return Err(VerityError::InvalidEntry(format!(
                    "expected a JSON object, got {other}"
                )))
            }
        };
        fields.remove("timestamp");
        Ok(Self {
            timestamp: at,
            fields,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// The compliance record one agent keeps for one system under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_id: String,
    pub system_id: String,
    pub agent_id: String,
    /// Dimension this assessment's agent specialises in.
    pub specialization: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub status: AssessmentStatus,
    #[serde(default)]
    pub evidence: Vec<Entry>,
    #[serde(default)]
    pub findings: Vec<Entry>,
    #[serde(default)]
    pub risks: Vec<Entry>,
    #[serde(default)]
    pub recommendations: Vec<Entry>,
    #[serde(default)]
    pub compliance_scores: BTreeMap<String, f64>,
    /// Mean of the canonical dimension scores; `None` until all are present.
    #[serde(default)]
    pub compliance_score: Option<f64>,
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
}

impl Assessment {
    pub fn new(
        assessment_id: String,
        system_id: &str,
        agent_id: &str,
        specialization: &str,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            assessment_id,
            system_id: system_id.to_string(),
            agent_id: agent_id.to_string(),
            specialization: specialization.to_string(),
            metadata,
            status: AssessmentStatus::Initialized,
            evidence: Vec::new(),
            findings: Vec::new(),
            risks: Vec::new(),
            recommendations: Vec::new(),
            compliance_scores: BTreeMap::new(),
            compliance_score: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AssessmentStatus::Completed
    }

    /// Current time, never earlier than the last update.
    ///
    /// Keeps `created_at <= entry timestamps <= updated_at` even if the wall
    /// clock steps backwards.
    fn tick(&self) -> DateTime<Utc> {
        Utc::now().max(self.updated_at)
    }

    pub fn entries(&self, kind: EntryKind) -> &[Entry] {
        match kind {
            EntryKind::Evidence => &self.evidence,
            EntryKind::Finding => &self.findings,
            EntryKind::Risk => &self.risks,
            EntryKind::Recommendation => &self.recommendations,
        }
    }

    /// Append a stamped copy of `item` and return the new list length.
    pub fn push_entry(&mut self, kind: EntryKind, item: Value) -> Result<usize> {
        let now = self.tick();
        let entry = Entry::stamp(item, now)?;
        let list = match kind {
            EntryKind::Evidence => &mut self.evidence,
            EntryKind::Finding => &mut self.findings,
            EntryKind::Risk => &mut self.risks,
            EntryKind::Recommendation => &mut self.recommendations,
        };
        list.push(entry);
        let len = list.len();
        self.updated_at = now;
        Ok(len)
    }

    /// Set or overwrite one dimension's score and recompute the overall score.
    pub fn set_score(&mut self, dimension: &str, score: f64) -> Result<Option<f64>> {
        validate_score(dimension, score)?;
        self.compliance_scores.insert(dimension.to_string(), score);
        self.compliance_score = overall_score(&self.compliance_scores);
        self.updated_at = self.tick();
        Ok(self.compliance_score)
    }

    /// Move to `completed` and stamp `completed_at`.
    pub fn complete(&mut self) {
        let now = self.tick();
        self.status = AssessmentStatus::Completed;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
