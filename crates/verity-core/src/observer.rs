//! Lifecycle observation for assessments and orchestrations.
//!
//! Components never configure logging on their own. Each `ValidationAgent`
//! and `Orchestrator` is handed an [`AssessmentObserver`] at construction and
//! reports every lifecycle step to it. [`TracingObserver`] turns those steps
//! into structured `tracing` events; tests can substitute
//! [`RecordingObserver`] and assert on what happened.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

/// Which append-only list an entry went into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Evidence,
    Finding,
    Risk,
    Recommendation,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Evidence => "evidence",
            EntryKind::Finding => "finding",
            EntryKind::Risk => "risk",
            EntryKind::Recommendation => "recommendation",
        }
    }
}

/// A single lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AssessmentCreated {
        assessment_id: String,
        system_id: String,
        agent_id: String,
    },
    EntryAdded {
        assessment_id: String,
        kind: EntryKind,
        count: usize,
    },
    ScoreSet {
        assessment_id: String,
        dimension: String,
        score: f64,
        overall: Option<f64>,
    },
    AssessmentFinalized {
        assessment_id: String,
    },
    /// A mutation reached an assessment that was already completed.
    MutatedAfterCompletion {
        assessment_id: String,
    },
    AgentRegistered {
        agent_id: String,
        specialization: String,
    },
    KnowledgeLoaded {
        agent_id: String,
        specialization: String,
        entries: usize,
    },
    /// No knowledge file exists for the agent's specialization.
    KnowledgeMissing {
        agent_id: String,
        path: String,
    },
    /// A knowledge file exists but is not a readable JSON object.
    KnowledgeInvalid {
        agent_id: String,
        path: String,
        reason: String,
    },
    OrchestrationCreated {
        orchestration_id: String,
        system_id: String,
        agents: usize,
        failed: usize,
    },
    AssessorFallback {
        dimension: String,
        reason: String,
    },
    DimensionFailed {
        orchestration_id: String,
        agent_id: String,
        error: String,
    },
    OrchestrationFinalized {
        orchestration_id: String,
        overall: Option<f64>,
    },
    ReportGenerated {
        orchestration_id: String,
        format: String,
    },
}

/// Receiver for lifecycle events.
pub trait AssessmentObserver: Send + Sync {
    fn observe(&self, event: &LifecycleEvent);
}

/// Emits every lifecycle event as a structured `tracing` event.
///
/// Unreadable knowledge files are emitted at `error!`, other failures and
/// fallbacks at `warn!`, everything else at `info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn shared() -> Arc<dyn AssessmentObserver> {
        Arc::new(TracingObserver)
    }
}

impl AssessmentObserver for TracingObserver {
    fn observe(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::AssessmentCreated {
                assessment_id,
                system_id,
                agent_id,
            } => info!(
                event = "assessment.created",
                assessment_id = %assessment_id,
                system_id = %system_id,
                agent_id = %agent_id,
            ),
            LifecycleEvent::EntryAdded {
                assessment_id,
                kind,
                count,
            } => info!(
                event = "assessment.entry_added",
                assessment_id = %assessment_id,
                kind = kind.as_str(),
                count = count,
            ),
            LifecycleEvent::ScoreSet {
                assessment_id,
                dimension,
                score,
                overall,
            } => info!(
                event = "assessment.score_set",
                assessment_id = %assessment_id,
                dimension = %dimension,
                score = score,
                overall = ?overall,
            ),
            LifecycleEvent::AssessmentFinalized { assessment_id } => {
                info!(event = "assessment.finalized", assessment_id = %assessment_id)
            }
            LifecycleEvent::MutatedAfterCompletion { assessment_id } => warn!(
                event = "assessment.mutated_after_completion",
                assessment_id = %assessment_id,
            ),
            LifecycleEvent::AgentRegistered {
                agent_id,
                specialization,
            } => info!(
                event = "agent.registered",
                agent_id = %agent_id,
                specialization = %specialization,
            ),
            LifecycleEvent::KnowledgeLoaded {
                agent_id,
                specialization,
                entries,
            } => info!(
                event = "agent.knowledge_loaded",
                agent_id = %agent_id,
                specialization = %specialization,
                entries = entries,
            ),
            LifecycleEvent::KnowledgeMissing { agent_id, path } => warn!(
                event = "agent.knowledge_missing",
                agent_id = %agent_id,
                path = %path,
            ),
            LifecycleEvent::KnowledgeInvalid {
                agent_id,
                path,
                reason,
            } => error!(
                event = "agent.knowledge_invalid",
                agent_id = %agent_id,
                path = %path,
                reason = %reason,
            ),
            LifecycleEvent::OrchestrationCreated {
                orchestration_id,
                system_id,
                agents,
                failed,
            } => info!(
                event = "orchestration.created",
                orchestration_id = %orchestration_id,
                system_id = %system_id,
                agents = agents,
                failed = failed,
            ),
            LifecycleEvent::AssessorFallback { dimension, reason } => warn!(
                event = "assessor.fallback",
                dimension = %dimension,
                reason = %reason,
            ),
            LifecycleEvent::DimensionFailed {
                orchestration_id,
                agent_id,
                error,
            } => warn!(
                event = "dimension.failed",
                orchestration_id = %orchestration_id,
                agent_id = %agent_id,
                error = %error,
            ),
            LifecycleEvent::OrchestrationFinalized {
                orchestration_id,
                overall,
            } => info!(
                event = "orchestration.finalized",
                orchestration_id = %orchestration_id,
                overall = ?overall,
            ),
            LifecycleEvent::ReportGenerated {
                orchestration_id,
                format,
            } => info!(
                event = "report.generated",
                orchestration_id = %orchestration_id,
                format = %format,
            ),
        }
    }
}

/// Keeps every observed event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything observed so far, in order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AssessmentObserver for RecordingObserver {
    fn observe(&self, event: &LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// RAII guard that enters an orchestration-scoped tracing span.
///
/// ```ignore
/// let _span = OrchestrationSpan::enter("orch_sysA_20250426151852_1a2b3c4d");
/// // every event emitted here carries orchestration_id
/// ```
pub struct OrchestrationSpan {
    _span: tracing::span::EnteredSpan,
}

impl OrchestrationSpan {
    pub fn enter(orchestration_id: &str) -> Self {
        Self {
            _span: orchestration_span(orchestration_id).entered(),
        }
    }
}

/// The orchestration span itself, for instrumenting futures.
///
/// An entered guard must not be held across `.await`; use
/// `future.instrument(orchestration_span(id))` there instead.
pub fn orchestration_span(orchestration_id: &str) -> tracing::Span {
    tracing::info_span!("verity.orchestration", orchestration_id = %orchestration_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.observe(&LifecycleEvent::AssessmentFinalized {
            assessment_id: "a".to_string(),
        });
        observer.observe(&LifecycleEvent::ReportGenerated {
            orchestration_id: "o".to_string(),
            format: "narrative".to_string(),
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LifecycleEvent::AssessmentFinalized { .. }));
    }

    #[test]
    fn tracing_observer_accepts_every_event() {
        let observer = TracingObserver;
        observer.observe(&LifecycleEvent::ScoreSet {
            assessment_id: "a".to_string(),
            dimension: "privacy".to_string(),
            score: 4.0,
            overall: None,
        });
        observer.observe(&LifecycleEvent::AssessorFallback {
            dimension: "privacy".to_string(),
            reason: "timeout".to_string(),
        });
    }

    #[test]
    fn orchestration_span_enters() {
        let _span = OrchestrationSpan::enter("orch-test");
    }
}
