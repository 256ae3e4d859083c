//! Validation agents: one per compliance dimension.
//!
//! An agent owns an in-memory cache of the assessments it created. The record
//! store is the source of truth; any ID missing from the cache is loaded from
//! the store on first use. Every mutation is write-through: the updated
//! record is persisted before the cache is updated, so a failed write leaves
//! both the cache and the store at the previous version.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use verity_store::{load_record, save_record, RecordStore};

use crate::assessment::Assessment;
use crate::error::{RecordKind, Result, VerityError};
use crate::ids;
use crate::observer::{AssessmentObserver, EntryKind, LifecycleEvent, TracingObserver};
use crate::scoring::Dimension;

/// A dimension-specialised agent that creates and mutates assessments.
pub struct ValidationAgent {
    agent_id: String,
    specialization: String,
    store: Arc<dyn RecordStore>,
    observer: Arc<dyn AssessmentObserver>,
    /// Reference material for the specialization, handed to the assessor.
    knowledge: Map<String, Value>,
    cache: HashMap<String, Assessment>,
}

impl std::fmt::Debug for ValidationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationAgent")
            .field("agent_id", &self.agent_id)
            .field("specialization", &self.specialization)
            .field("knowledge_entries", &self.knowledge.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl ValidationAgent {
    pub fn new(
        agent_id: impl Into<String>,
        specialization: impl Into<String>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            specialization: specialization.into(),
            store,
            observer: TracingObserver::shared(),
            knowledge: Map::new(),
            cache: HashMap::new(),
        }
    }

    /// Agent for a canonical dimension, named `<dimension>_agent`.
    pub fn for_dimension(dimension: Dimension, store: Arc<dyn RecordStore>) -> Self {
        Self::new(dimension.default_agent_id(), dimension.as_str(), store)
    }

    pub fn with_observer(mut self, observer: Arc<dyn AssessmentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_knowledge(mut self, knowledge: Map<String, Value>) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Load `<dir>/<specialization>.json` as this agent's knowledge base.
    ///
    /// A missing or unreadable file is reported to the observer and leaves
    /// the agent without knowledge; it never fails the agent. Returns whether
    /// knowledge was loaded.
    pub fn load_knowledge(&mut self, dir: &Path) -> bool {
        let path = dir.join(format!("{}.json", self.specialization));
        let display = path.display().to_string();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.knowledge.clear();
                self.observer.observe(&LifecycleEvent::KnowledgeMissing {
                    agent_id: self.agent_id.clone(),
                    path: display,
                });
                return false;
            }
            Err(e) => return self.knowledge_invalid(display, e.to_string()),
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(knowledge)) => {
                self.observer.observe(&LifecycleEvent::KnowledgeLoaded {
                    agent_id: self.agent_id.clone(),
                    specialization: self.specialization.clone(),
                    entries: knowledge.len(),
                });
                self.knowledge = knowledge;
                true
            }
            Ok(_) => self.knowledge_invalid(display, "expected a JSON object".to_string()),
            Err(e) => self.knowledge_invalid(display, e.to_string()),
        }
    }

    fn knowledge_invalid(&mut self, path: String, reason: String) -> bool {
        self.observer.observe(&LifecycleEvent::KnowledgeInvalid {
            agent_id: self.agent_id.clone(),
            path,
            reason,
        });
        self.knowledge.clear();
        false
    }

    pub fn knowledge(&self) -> &Map<String, Value> {
        &self.knowledge
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn specialization(&self) -> &str {
        &self.specialization
    }

    /// Create, persist and cache a new `initialized` assessment.
    pub fn create_assessment(
        &mut self,
        system_id: &str,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        let assessment_id = ids::assessment_id(system_id, chrono::Utc::now());
        let assessment = Assessment::new(
            assessment_id.clone(),
            system_id,
            &self.agent_id,
            &self.specialization,
            metadata,
        );

        self.persist(&assessment)?;
        self.cache.insert(assessment_id.clone(), assessment);

        self.observer.observe(&LifecycleEvent::AssessmentCreated {
            assessment_id: assessment_id.clone(),
            system_id: system_id.to_string(),
            agent_id: self.agent_id.clone(),
        });
        Ok(assessment_id)
    }

    pub fn add_evidence(&mut self, assessment_id: &str, evidence: impl Serialize) -> Result<()> {
        self.add_entry(assessment_id, EntryKind::Evidence, evidence)
    }

    pub fn add_finding(&mut self, assessment_id: &str, finding: impl Serialize) -> Result<()> {
        self.add_entry(assessment_id, EntryKind::Finding, finding)
    }

    pub fn add_risk(&mut self, assessment_id: &str, risk: impl Serialize) -> Result<()> {
        self.add_entry(assessment_id, EntryKind::Risk, risk)
    }

    pub fn add_recommendation(
        &mut self,
        assessment_id: &str,
        recommendation: impl Serialize,
    ) -> Result<()> {
        self.add_entry(assessment_id, EntryKind::Recommendation, recommendation)
    }

    fn add_entry(
        &mut self,
        assessment_id: &str,
        kind: EntryKind,
        item: impl Serialize,
    ) -> Result<()> {
        let item = serde_json::to_value(item)?;
        let count = self.mutate(assessment_id, |a| a.push_entry(kind, item))?;
        self.observer.observe(&LifecycleEvent::EntryAdded {
            assessment_id: assessment_id.to_string(),
            kind,
            count,
        });
        Ok(())
    }

    /// Set `compliance_scores[dimension]` and recompute the overall score.
    pub fn set_compliance_score(
        &mut self,
        assessment_id: &str,
        score: f64,
        dimension: &str,
    ) -> Result<()> {
        let overall = self.mutate(assessment_id, |a| a.set_score(dimension, score))?;
        self.observer.observe(&LifecycleEvent::ScoreSet {
            assessment_id: assessment_id.to_string(),
            dimension: dimension.to_string(),
            score,
            overall,
        });
        Ok(())
    }

    /// Mark the assessment `completed` and return the full record.
    pub fn finalize_assessment(&mut self, assessment_id: &str) -> Result<Assessment> {
        let finalized = self.mutate(assessment_id, |a| {
            a.complete();
            Ok(a.clone())
        })?;
        self.observer.observe(&LifecycleEvent::AssessmentFinalized {
            assessment_id: assessment_id.to_string(),
        });
        Ok(finalized)
    }

    /// Resolve an assessment from the cache, falling back to the store.
    pub fn assessment(&mut self, assessment_id: &str) -> Result<&Assessment> {
        self.ensure_loaded(assessment_id)?;
        self.cache
            .get(assessment_id)
            .ok_or_else(|| not_found(assessment_id))
    }

    /// Drop every cached record; later reads go to the store.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn ensure_loaded(&mut self, assessment_id: &str) -> Result<()> {
        if self.cache.contains_key(assessment_id) {
            return Ok(());
        }
        let assessment: Assessment = load_record(self.store.as_ref(), assessment_id)
            .map_err(|e| VerityError::from_store(RecordKind::Assessment, e))?;
        tracing::debug!(assessment_id = %assessment_id, "assessment loaded from store");
        self.cache.insert(assessment_id.to_string(), assessment);
        Ok(())
    }

    /// Apply `change` to a copy of the record, persist it, then swap it in.
    fn mutate<R>(
        &mut self,
        assessment_id: &str,
        change: impl FnOnce(&mut Assessment) -> Result<R>,
    ) -> Result<R> {
        self.ensure_loaded(assessment_id)?;
        let mut updated = self
            .cache
            .get(assessment_id)
            .cloned()
            .ok_or_else(|| not_found(assessment_id))?;

        if updated.is_completed() {
            self.observer.observe(&LifecycleEvent::MutatedAfterCompletion {
                assessment_id: assessment_id.to_string(),
            });
        }

        let out = change(&mut updated)?;
        self.persist(&updated)?;
        self.cache.insert(assessment_id.to_string(), updated);
        Ok(out)
    }

    fn persist(&self, assessment: &Assessment) -> Result<()> {
        save_record(self.store.as_ref(), &assessment.assessment_id, assessment)
            .map_err(|e| VerityError::from_store(RecordKind::Assessment, e))
    }
}

fn not_found(assessment_id: &str) -> VerityError {
    VerityError::NotFound {
        kind: RecordKind::Assessment,
        id: assessment_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::AssessmentStatus;
    use crate::observer::RecordingObserver;
    use serde_json::json;
    use verity_store::fakes::MemoryRecordStore;
    use verity_store::{StoreError, StoreResult};

    fn agent_with_store() -> (Arc<MemoryRecordStore>, ValidationAgent) {
        let store = Arc::new(MemoryRecordStore::new());
        let agent = ValidationAgent::for_dimension(Dimension::Privacy, store.clone());
        (store, agent)
    }

    #[test]
    fn create_persists_initialized_record() {
        let (store, mut agent) = agent_with_store();
        let id = agent.create_assessment("sysA", Map::new()).unwrap();

        assert!(store.exists(&id).unwrap());
        let stored: Assessment = load_record(store.as_ref(), &id).unwrap();
        assert_eq!(stored.status, AssessmentStatus::Initialized);
        assert_eq!(stored.agent_id, "privacy_agent");
        assert_eq!(stored.specialization, "privacy");
        assert_eq!(stored.system_id, "sysA");
    }

    #[test]
    fn mutations_are_written_through() {
        let (store, mut agent) = agent_with_store();
        let id = agent.create_assessment("sysA", Map::new()).unwrap();

        agent.add_finding(&id, json!({"title": "no DPIA"})).unwrap();
        agent.add_risk(&id, json!({"title": "re-identification"})).unwrap();
        agent
            .add_recommendation(&id, json!({"title": "run a DPIA"}))
            .unwrap();
        agent.add_evidence(&id, json!({"doc": "privacy policy"})).unwrap();

        let stored: Assessment = load_record(store.as_ref(), &id).unwrap();
        assert_eq!(stored.findings.len(), 1);
        assert_eq!(stored.risks.len(), 1);
        assert_eq!(stored.recommendations.len(), 1);
        assert_eq!(stored.evidence.len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (_store, mut agent) = agent_with_store();
        let err = agent
            .add_finding("never_created", json!({"title": "x"}))
            .unwrap_err();
        assert!(matches!(
            err,
            VerityError::NotFound {
                kind: RecordKind::Assessment,
                ..
            }
        ));
    }

    #[test]
    fn corrupt_record_is_surfaced() {
        let (store, mut agent) = agent_with_store();
        store.insert_raw("sysA_broken", b"{\"assessment_id\":");
        assert!(matches!(
            agent.assessment("sysA_broken"),
            Err(VerityError::Corrupt { .. })
        ));
    }

    #[test]
    fn another_agent_instance_falls_back_to_store() {
        let (store, mut agent) = agent_with_store();
        let id = agent.create_assessment("sysA", Map::new()).unwrap();
        agent.add_finding(&id, json!({"title": "first"})).unwrap();

        let mut fresh = ValidationAgent::for_dimension(Dimension::Privacy, store.clone());
        fresh.add_finding(&id, json!({"title": "second"})).unwrap();
        let finalized = fresh.finalize_assessment(&id).unwrap();

        assert_eq!(finalized.findings.len(), 2);
        assert_eq!(finalized.status, AssessmentStatus::Completed);
        assert!(finalized.completed_at.is_some());
    }

    #[test]
    fn score_out_of_range_is_rejected_and_not_persisted() {
        let (store, mut agent) = agent_with_store();
        let id = agent.create_assessment("sysA", Map::new()).unwrap();
        let err = agent.set_compliance_score(&id, 9.0, "privacy").unwrap_err();
        assert!(matches!(err, VerityError::ScoreOutOfRange { .. }));

        let stored: Assessment = load_record(store.as_ref(), &id).unwrap();
        assert!(stored.compliance_scores.is_empty());
    }

    #[test]
    fn all_eight_scores_produce_overall() {
        let (store, mut agent) = agent_with_store();
        let id = agent.create_assessment("sysA", Map::new()).unwrap();
        for d in Dimension::ALL {
            agent.set_compliance_score(&id, 4.0, d.as_str()).unwrap();
        }
        let stored: Assessment = load_record(store.as_ref(), &id).unwrap();
        assert_eq!(stored.compliance_score, Some(4.0));
    }

    /// Store whose writes always fail after the first `allowed` saves.
    struct FailingStore {
        inner: MemoryRecordStore,
        allowed: std::sync::atomic::AtomicUsize,
    }

    impl RecordStore for FailingStore {
        fn save(&self, id: &str, record: &Value) -> StoreResult<()> {
            use std::sync::atomic::Ordering;
            if self.allowed.load(Ordering::SeqCst) == 0 {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.allowed.fetch_sub(1, Ordering::SeqCst);
            self.inner.save(id, record)
        }

        fn load(&self, id: &str) -> StoreResult<Value> {
            self.inner.load(id)
        }

        fn exists(&self, id: &str) -> StoreResult<bool> {
            self.inner.exists(id)
        }
    }

    #[test]
    fn failed_write_surfaces_and_keeps_cache_consistent() {
        let store = Arc::new(FailingStore {
            inner: MemoryRecordStore::new(),
            allowed: std::sync::atomic::AtomicUsize::new(1),
        });
        let mut agent = ValidationAgent::new("a", "fairness", store);
        let id = agent.create_assessment("sysA", Map::new()).unwrap();

        let err = agent.add_finding(&id, json!({"title": "lost"})).unwrap_err();
        assert!(matches!(err, VerityError::Storage(_)));
        assert!(agent.assessment(&id).unwrap().findings.is_empty());
    }

    #[test]
    fn knowledge_is_loaded_for_the_specialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("privacy.json"),
            r#"{"frameworks": ["GDPR"], "checks": 12}"#,
        )
        .unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let (_store, agent) = agent_with_store();
        let mut agent = agent.with_observer(observer.clone());

        assert!(agent.load_knowledge(dir.path()));
        assert_eq!(agent.knowledge()["frameworks"], json!(["GDPR"]));
        assert!(matches!(
            &observer.events()[0],
            LifecycleEvent::KnowledgeLoaded { entries: 2, .. }
        ));
    }

    #[test]
    fn missing_knowledge_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let (_store, agent) = agent_with_store();
        let mut agent = agent.with_observer(observer.clone());

        assert!(!agent.load_knowledge(dir.path()));
        assert!(agent.knowledge().is_empty());
        match &observer.events()[0] {
            LifecycleEvent::KnowledgeMissing { path, .. } => {
                assert!(path.ends_with("privacy.json"))
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(agent.create_assessment("sysA", Map::new()).is_ok());
    }

    #[test]
    fn unreadable_knowledge_file_is_reported_as_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("privacy.json"), b"{\"frameworks\":").unwrap();
        std::fs::write(dir.path().join("safety.json"), b"[1, 2]").unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let store = Arc::new(MemoryRecordStore::new());

        let mut privacy = ValidationAgent::for_dimension(Dimension::Privacy, store.clone())
            .with_observer(observer.clone());
        let mut safety = ValidationAgent::for_dimension(Dimension::Safety, store)
            .with_observer(observer.clone());
        assert!(!privacy.load_knowledge(dir.path()));
        assert!(!safety.load_knowledge(dir.path()));

        let events = observer.events();
        assert!(matches!(&events[0], LifecycleEvent::KnowledgeInvalid { .. }));
        match &events[1] {
            LifecycleEvent::KnowledgeInvalid { reason, .. } => {
                assert!(reason.contains("JSON object"))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn observer_sees_lifecycle_in_order() {
        let store = Arc::new(MemoryRecordStore::new());
        let observer = Arc::new(RecordingObserver::new());
        let mut agent = ValidationAgent::for_dimension(Dimension::Safety, store)
            .with_observer(observer.clone());

        let id = agent.create_assessment("sysA", Map::new()).unwrap();
        agent.add_finding(&id, json!({"title": "t"})).unwrap();
        agent.set_compliance_score(&id, 3.0, "safety").unwrap();
        agent.finalize_assessment(&id).unwrap();
        agent.add_finding(&id, json!({"title": "late"})).unwrap();

        let events = observer.events();
        assert!(matches!(events[0], LifecycleEvent::AssessmentCreated { .. }));
        assert!(matches!(
            events[1],
            LifecycleEvent::EntryAdded {
                kind: EntryKind::Finding,
                count: 1,
                ..
            }
        ));
        assert!(matches!(events[2], LifecycleEvent::ScoreSet { overall: None, .. }));
        assert!(matches!(events[3], LifecycleEvent::AssessmentFinalized { .. }));
        assert!(matches!(events[4], LifecycleEvent::MutatedAfterCompletion { .. }));
    }
}
