//! VerityAI Core Library
//!
//! Assessment lifecycle, multi-agent orchestration and reporting for AI
//! compliance reviews. Persistence is delegated to `verity-store`.

pub mod agent;
pub mod assessment;
pub mod assessor;
pub mod config;
pub mod error;
pub mod ids;
pub mod observer;
pub mod orchestration;
pub mod orchestrator;
pub mod reporting;
pub mod scoring;
pub mod telemetry;
pub mod timestamp;

pub use agent::ValidationAgent;
pub use assessment::{Assessment, AssessmentStatus, Entry};
pub use assessor::{
    assess_with_fallback, Assessor, AssessorOutput, ClaudeAssessor, ClaudeConfig, Finding,
    PlaceholderAssessor, Recommendation, Risk,
};
pub use config::OrchestratorConfig;
pub use error::{RecordKind, Result, VerityError};
pub use observer::{
    AssessmentObserver, EntryKind, LifecycleEvent, OrchestrationSpan, RecordingObserver,
    TracingObserver,
};
pub use orchestration::{AgentAssessment, DimensionStatus, Orchestration, OrchestrationStatus};
pub use orchestrator::Orchestrator;
pub use reporting::ReportFormat;
pub use scoring::{overall_score, Dimension, Rating, MAX_SCORE, MIN_SCORE};

pub use verity_store::{FsRecordStore, RecordStore};

/// Crate version, as recorded in generated reports and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
