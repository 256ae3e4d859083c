//! The orchestrator: fans one review out across every registered agent.
//!
//! A comprehensive run has three phases:
//!
//! 1. **Create**: every registered agent opens an assessment for the system
//!    (best effort; agents that fail are recorded as `failed`).
//! 2. **Assess**: the assessor is called once per created dimension,
//!    concurrently and bounded by `max_concurrent_assessors`. Results are then
//!    applied one dimension at a time, so each assessment has a single writer.
//! 3. **Finalize**: constituent scores and lists are folded into the
//!    orchestration record, which is then persisted as `completed`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use tracing::Instrument;
use verity_store::{load_record, save_record, RecordStore};

use crate::agent::ValidationAgent;
use crate::assessment::Assessment;
use crate::assessor::{
    assess_with_fallback, evidence_with_knowledge, Assessor, AssessorOutput, PlaceholderAssessor,
};
use crate::config::OrchestratorConfig;
use crate::error::{RecordKind, Result, VerityError};
use crate::ids;
use crate::observer::{
    orchestration_span, AssessmentObserver, LifecycleEvent, OrchestrationSpan, TracingObserver,
};
use crate::orchestration::{
    AgentAssessment, DimensionStatus, Orchestration, OrchestrationStatus,
};
use crate::reporting::{self, ReportFormat};
use crate::scoring::Dimension;

/// One dimension awaiting its assessor result.
#[derive(Debug, Clone)]
struct DimensionTask {
    /// Position of the owning agent in the registration list.
    agent_index: usize,
    agent_id: String,
    assessment_id: String,
    specialization: String,
    knowledge: Map<String, Value>,
}

/// Coordinates validation agents, the assessor and orchestration records.
pub struct Orchestrator {
    /// Registered agents, in registration order.
    agents: Vec<ValidationAgent>,
    orchestrations: HashMap<String, Orchestration>,
    store: Arc<dyn RecordStore>,
    assessor: Arc<dyn Assessor>,
    observer: Arc<dyn AssessmentObserver>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents)
            .field("orchestrations", &self.orchestrations.len())
            .field("assessor", &self.assessor.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator with no agents, the placeholder assessor and default config.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            agents: Vec::new(),
            orchestrations: HashMap::new(),
            store,
            assessor: Arc::new(PlaceholderAssessor),
            observer: TracingObserver::shared(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_assessor(mut self, assessor: Arc<dyn Assessor>) -> Self {
        self.assessor = assessor;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AssessmentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Register `agent`. An agent with the same ID is replaced in place.
    pub fn register_agent(&mut self, agent: ValidationAgent) {
        let event = LifecycleEvent::AgentRegistered {
            agent_id: agent.agent_id().to_string(),
            specialization: agent.specialization().to_string(),
        };
        match self
            .agents
            .iter_mut()
            .find(|existing| existing.agent_id() == agent.agent_id())
        {
            Some(slot) => *slot = agent,
            None => self.agents.push(agent),
        }
        self.observer.observe(&event);
    }

    /// Register one `<dimension>_agent` per canonical dimension, sharing this
    /// orchestrator's store and observer.
    ///
    /// With a configured `knowledge_dir`, each agent loads its knowledge base
    /// from there first.
    pub fn register_dimension_agents(&mut self) {
        for dimension in Dimension::ALL {
            let mut agent = ValidationAgent::for_dimension(dimension, self.store())
                .with_observer(Arc::clone(&self.observer));
            if let Some(dir) = &self.config.knowledge_dir {
                agent.load_knowledge(dir);
            }
            self.register_agent(agent);
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &ValidationAgent> {
        self.agents.iter()
    }

    pub fn agent_mut(&mut self, agent_id: &str) -> Option<&mut ValidationAgent> {
        self.agents.iter_mut().find(|a| a.agent_id() == agent_id)
    }

    /// Open one assessment per registered agent and persist the manifest.
    ///
    /// Agents that fail are recorded as `failed` and the orchestration is
    /// marked `partially_initialized`. If every agent fails nothing is
    /// persisted and `FanOutFailed` is returned.
    pub fn create_comprehensive_assessment(
        &mut self,
        system_id: &str,
        metadata: Map<String, Value>,
    ) -> Result<String> {
        if self.agents.is_empty() {
            return Err(VerityError::NoAgentsRegistered);
        }

        let orchestration_id = ids::orchestration_id(system_id, chrono::Utc::now());
        let _span = OrchestrationSpan::enter(&orchestration_id);
        let mut orchestration =
            Orchestration::new(orchestration_id.clone(), system_id, metadata.clone());

        let mut first_error = None;
        for agent in &mut self.agents {
            let entry = match agent.create_assessment(system_id, metadata.clone()) {
                Ok(assessment_id) => {
                    AgentAssessment::created(assessment_id, agent.specialization())
                }
                Err(e) => {
                    self.observer.observe(&LifecycleEvent::DimensionFailed {
                        orchestration_id: orchestration_id.clone(),
                        agent_id: agent.agent_id().to_string(),
                        error: e.to_string(),
                    });
                    first_error.get_or_insert_with(|| format!("{}: {e}", agent.agent_id()));
                    AgentAssessment::failed(None, agent.specialization(), e.to_string())
                }
            };
            orchestration
                .agent_assessments
                .insert(agent.agent_id().to_string(), entry);
        }

        let failed = orchestration.failed_dimensions();
        if failed == orchestration.agent_assessments.len() {
            return Err(VerityError::FanOutFailed {
                system_id: system_id.to_string(),
                cause: first_error.unwrap_or_default(),
            });
        }
        if failed > 0 {
            orchestration.status = OrchestrationStatus::PartiallyInitialized;
        }

        self.persist(&orchestration)?;
        self.observer.observe(&LifecycleEvent::OrchestrationCreated {
            orchestration_id: orchestration_id.clone(),
            system_id: system_id.to_string(),
            agents: orchestration.agent_assessments.len(),
            failed,
        });
        self.orchestrations
            .insert(orchestration_id.clone(), orchestration);
        Ok(orchestration_id)
    }

    /// Create, assess every dimension against `evidence`, then finalize.
    pub async fn run_comprehensive_assessment(
        &mut self,
        system_id: &str,
        metadata: Map<String, Value>,
        evidence: &Value,
    ) -> Result<Orchestration> {
        let orchestration_id = self.create_comprehensive_assessment(system_id, metadata)?;
        let tasks = self.pending_tasks(&orchestration_id)?;

        let assessor = Arc::clone(&self.assessor);
        let observer = Arc::clone(&self.observer);
        let timeout = self.config.assessor_timeout;
        let limit = self.config.max_concurrent_assessors.max(1);

        let results: Vec<(DimensionTask, AssessorOutput)> = stream::iter(tasks)
            .map(|task| {
                let assessor = Arc::clone(&assessor);
                let observer = Arc::clone(&observer);
                async move {
                    let evidence = evidence_with_knowledge(evidence, &task.knowledge);
                    let output = assess_with_fallback(
                        assessor.as_ref(),
                        &task.specialization,
                        &evidence,
                        timeout,
                        observer.as_ref(),
                    )
                    .await;
                    (task, output)
                }
            })
            .buffered(limit)
            .collect()
            .instrument(orchestration_span(&orchestration_id))
            .await;

        for (task, output) in results {
            if let Err(e) = self.apply_output(&task, &output) {
                self.mark_dimension_failed(&orchestration_id, &task.agent_id, e.to_string());
            }
        }

        self.finalize_comprehensive_assessment(&orchestration_id)
    }

    /// Fold every constituent assessment into the orchestration and mark it
    /// `completed`.
    ///
    /// Lists are merged in agent registration order; manifest entries whose
    /// agent is not registered here follow in agent-ID order.
    pub fn finalize_comprehensive_assessment(
        &mut self,
        orchestration_id: &str,
    ) -> Result<Orchestration> {
        let _span = OrchestrationSpan::enter(orchestration_id);
        let mut updated = self.orchestration(orchestration_id)?.clone();
        updated.reset_integration();

        for agent_id in self.integration_order(&updated) {
            let Some(entry) = updated.agent_assessments.get(&agent_id) else {
                continue;
            };
            if entry.status == DimensionStatus::Failed {
                continue;
            }
            let Some(assessment_id) = entry.assessment_id.clone() else {
                continue;
            };

            match self.constituent(&agent_id, &assessment_id) {
                Ok(assessment) => updated.integrate(&agent_id, &assessment),
                Err(e) => {
                    self.observer.observe(&LifecycleEvent::DimensionFailed {
                        orchestration_id: orchestration_id.to_string(),
                        agent_id: agent_id.clone(),
                        error: e.to_string(),
                    });
                    if let Some(entry) = updated.agent_assessments.get_mut(&agent_id) {
                        entry.mark_failed(e.to_string());
                    }
                }
            }
        }

        updated.complete();
        self.persist(&updated)?;
        self.observer.observe(&LifecycleEvent::OrchestrationFinalized {
            orchestration_id: orchestration_id.to_string(),
            overall: updated.overall_compliance_score,
        });
        self.orchestrations
            .insert(orchestration_id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Resolve an orchestration from memory, falling back to the store.
    pub fn orchestration(&mut self, orchestration_id: &str) -> Result<&Orchestration> {
        if !self.orchestrations.contains_key(orchestration_id) {
            let loaded: Orchestration = load_record(self.store.as_ref(), orchestration_id)
                .map_err(|e| VerityError::from_store(RecordKind::Orchestration, e))?;
            tracing::debug!(
                orchestration_id = %orchestration_id,
                "orchestration loaded from store"
            );
            self.orchestrations
                .insert(orchestration_id.to_string(), loaded);
        }
        self.orchestrations
            .get(orchestration_id)
            .ok_or_else(|| VerityError::NotFound {
                kind: RecordKind::Orchestration,
                id: orchestration_id.to_string(),
            })
    }

    /// Render an orchestration as `structured`/`json` or `narrative`/`markdown`.
    pub fn generate_report(&mut self, orchestration_id: &str, format: &str) -> Result<String> {
        let format: ReportFormat = format.parse()?;
        let report = reporting::render(self.orchestration(orchestration_id)?, format)?;
        self.observer.observe(&LifecycleEvent::ReportGenerated {
            orchestration_id: orchestration_id.to_string(),
            format: format.to_string(),
        });
        Ok(report)
    }

    fn pending_tasks(&mut self, orchestration_id: &str) -> Result<Vec<DimensionTask>> {
        let orchestration = self.orchestration(orchestration_id)?.clone();
        let tasks = orchestration
            .agent_assessments
            .iter()
            .filter(|(_, entry)| entry.status == DimensionStatus::Initialized)
            .filter_map(|(agent_id, entry)| {
                let agent_index = self.agents.iter().position(|a| a.agent_id() == agent_id)?;
                Some(DimensionTask {
                    agent_index,
                    agent_id: agent_id.clone(),
                    assessment_id: entry.assessment_id.clone()?,
                    specialization: entry.specialization.clone(),
                    knowledge: self.agents[agent_index].knowledge().clone(),
                })
            })
            .collect();
        Ok(tasks)
    }

    /// Write one assessor result into its assessment and finalize it.
    fn apply_output(&mut self, task: &DimensionTask, output: &AssessorOutput) -> Result<()> {
        let assessor = self.assessor.name().to_string();
        let agent = self.agents.get_mut(task.agent_index).ok_or_else(|| {
            VerityError::InvalidEntry(format!("agent {} is no longer registered", task.agent_id))
        })?;
        let id = task.assessment_id.as_str();

        agent.add_evidence(
            id,
            json!({
                "source": "assessor",
                "assessor": assessor,
                "placeholder": output.placeholder,
                "compliance_score_justification": output.compliance_score_justification,
            }),
        )?;
        for finding in &output.findings {
            agent.add_finding(id, finding)?;
        }
        for risk in &output.risks {
            agent.add_risk(id, risk)?;
        }
        for recommendation in &output.recommendations {
            agent.add_recommendation(id, recommendation)?;
        }
        if let (Some(score), false) = (output.compliance_score, output.placeholder) {
            agent.set_compliance_score(id, score, &task.specialization)?;
        }
        agent.finalize_assessment(id)?;
        Ok(())
    }

    fn mark_dimension_failed(&mut self, orchestration_id: &str, agent_id: &str, error: String) {
        self.observer.observe(&LifecycleEvent::DimensionFailed {
            orchestration_id: orchestration_id.to_string(),
            agent_id: agent_id.to_string(),
            error: error.clone(),
        });
        if let Some(entry) = self
            .orchestrations
            .get_mut(orchestration_id)
            .and_then(|o| o.agent_assessments.get_mut(agent_id))
        {
            entry.mark_failed(error);
        }
    }

    fn integration_order(&self, orchestration: &Orchestration) -> Vec<String> {
        let mut order: Vec<String> = self
            .agents
            .iter()
            .map(|a| a.agent_id().to_string())
            .filter(|id| orchestration.agent_assessments.contains_key(id))
            .collect();
        for agent_id in orchestration.agent_assessments.keys() {
            if !order.contains(agent_id) {
                order.push(agent_id.clone());
            }
        }
        order
    }

    /// Resolve a constituent assessment through its agent, or the store when
    /// the agent is not registered here.
    fn constituent(&mut self, agent_id: &str, assessment_id: &str) -> Result<Assessment> {
        match self.agent_mut(agent_id) {
            Some(agent) => agent.assessment(assessment_id).cloned(),
            None => load_record(self.store.as_ref(), assessment_id)
                .map_err(|e| VerityError::from_store(RecordKind::Assessment, e)),
        }
    }

    fn persist(&self, orchestration: &Orchestration) -> Result<()> {
        save_record(
            self.store.as_ref(),
            &orchestration.orchestration_id,
            orchestration,
        )
        .map_err(|e| VerityError::from_store(RecordKind::Orchestration, e))
    }
}
