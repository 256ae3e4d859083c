//! VerityAI - compliance assessment CLI
//!
//! The `verity` command runs multi-agent compliance assessments of AI systems.
//!
//! ## Commands
//!
//! - `assess`: assess a system against every dimension and write both reports
//! - `create-agent`: create a validation agent for a specialization
//! - `report`: regenerate a report for a stored orchestration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use verity_core::{
    Assessor, ClaudeAssessor, ClaudeConfig, Dimension, FsRecordStore, Orchestrator,
    OrchestratorConfig, PlaceholderAssessor, ReportFormat, ValidationAgent,
};

#[derive(Parser)]
#[command(name = "verity")]
#[command(author = "VerityAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "VerityAI multi-agent compliance assessment", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding assessment and orchestration records
    #[arg(long, global = true, env = "VERITY_STORE_DIR", default_value = "./assessments")]
    store_dir: PathBuf,

    /// Directory of `<specialization>.json` knowledge files for agents
    #[arg(long, global = true, env = "VERITY_KNOWLEDGE_DIR")]
    knowledge_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a comprehensive assessment
    Assess {
        /// ID of the AI system to assess
        #[arg(long)]
        system_id: String,

        /// Path to evidence JSON file
        #[arg(long)]
        evidence: PathBuf,

        /// Directory to save results
        #[arg(long, default_value = "./results")]
        output_dir: PathBuf,

        /// Skip the Claude backend and record placeholder results
        #[arg(long)]
        placeholder: bool,
    },

    /// Create a specialized agent
    CreateAgent {
        /// ID for the new agent
        #[arg(long)]
        agent_id: String,

        /// Agent specialization
        #[arg(long)]
        specialization: String,
    },

    /// Regenerate a report for a stored orchestration
    Report {
        /// Orchestration ID to report on
        #[arg(long)]
        orchestration_id: String,

        /// Report format: json/structured or markdown/narrative
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    verity_core::telemetry::init_tracing(cli.json, level);

    let mut config = OrchestratorConfig::from_env();
    if let Some(dir) = &cli.knowledge_dir {
        config = config.with_knowledge_dir(dir);
    }

    match cli.command {
        Commands::Assess {
            system_id,
            evidence,
            output_dir,
            placeholder,
        } => {
            let assessor = select_assessor(placeholder)?;
            let written = cmd_assess(
                &cli.store_dir,
                &system_id,
                &evidence,
                &output_dir,
                assessor,
                config,
            )
            .await?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::CreateAgent {
            agent_id,
            specialization,
        } => cmd_create_agent(
            &cli.store_dir,
            &agent_id,
            &specialization,
            config.knowledge_dir.as_deref(),
        )
        .map(|_| ()),
        Commands::Report {
            orchestration_id,
            format,
            output,
        } => cmd_report(&cli.store_dir, &orchestration_id, &format, output.as_deref()),
    }
}

/// Claude when an API key is configured, otherwise the placeholder assessor.
fn select_assessor(force_placeholder: bool) -> Result<Arc<dyn Assessor>> {
    if force_placeholder {
        return Ok(Arc::new(PlaceholderAssessor));
    }
    let config = ClaudeConfig::from_env();
    if config.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; recording placeholder results");
        return Ok(Arc::new(PlaceholderAssessor));
    }
    let assessor = ClaudeAssessor::new(config).context("Failed to build Claude assessor")?;
    Ok(Arc::new(assessor))
}

fn open_store(store_dir: &Path) -> Result<Arc<FsRecordStore>> {
    let store = FsRecordStore::new(store_dir)
        .with_context(|| format!("Failed to open record store at {:?}", store_dir))?;
    Ok(Arc::new(store))
}

/// Metadata threaded into every per-dimension assessment.
fn assessment_metadata(evidence_path: &Path, evidence: &Value) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "evidence_path".to_string(),
        json!(evidence_path.display().to_string()),
    );
    metadata.insert(
        "assessment_date".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "evidence_metadata".to_string(),
        evidence.get("metadata").cloned().unwrap_or_else(|| json!({})),
    );
    metadata
}

/// Assess `system_id` against every dimension; returns the written report paths.
async fn cmd_assess(
    store_dir: &Path,
    system_id: &str,
    evidence_path: &Path,
    output_dir: &Path,
    assessor: Arc<dyn Assessor>,
    config: OrchestratorConfig,
) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(evidence_path)
        .with_context(|| format!("Failed to read evidence file: {:?}", evidence_path))?;
    let evidence: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in evidence file: {:?}", evidence_path))?;

    let mut orchestrator = Orchestrator::new(open_store(store_dir)?)
        .with_assessor(assessor)
        .with_config(config);
    orchestrator.register_dimension_agents();

    let metadata = assessment_metadata(evidence_path, &evidence);
    let orchestration = orchestrator
        .run_comprehensive_assessment(system_id, metadata, &evidence)
        .await
        .context("Assessment failed")?;
    let orchestration_id = orchestration.orchestration_id;
    info!(orchestration_id = %orchestration_id, "assessment created");

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut written = Vec::new();
    for format in [ReportFormat::Structured, ReportFormat::Narrative] {
        let report = orchestrator.generate_report(&orchestration_id, format.as_str())?;
        let path = output_dir.join(format!("{orchestration_id}.{}", format.file_extension()));
        std::fs::write(&path, report).with_context(|| format!("write {:?}", path))?;
        written.push(path);
    }

    info!(output_dir = ?output_dir, "assessment completed");
    Ok(written)
}

/// Create an agent, loading its knowledge base when a directory is given.
///
/// Returns the number of knowledge entries loaded.
fn cmd_create_agent(
    store_dir: &Path,
    agent_id: &str,
    specialization: &str,
    knowledge_dir: Option<&Path>,
) -> Result<usize> {
    if specialization.parse::<Dimension>().is_err() {
        warn!(
            specialization = %specialization,
            "specialization is not a canonical dimension; \
             it will not count towards the overall score"
        );
    }
    let mut agent = ValidationAgent::new(agent_id, specialization, open_store(store_dir)?);
    if let Some(dir) = knowledge_dir {
        agent.load_knowledge(dir);
    }
    let entries = agent.knowledge().len();
    info!(
        agent_id = %agent.agent_id(),
        specialization = %agent.specialization(),
        knowledge_entries = entries,
        "agent created"
    );
    println!(
        "Created agent {} with specialization {} ({} knowledge entries)",
        agent.agent_id(),
        agent.specialization(),
        entries
    );
    Ok(entries)
}

fn cmd_report(
    store_dir: &Path,
    orchestration_id: &str,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut orchestrator = Orchestrator::new(open_store(store_dir)?);
    let report = orchestrator
        .generate_report(orchestration_id, format)
        .with_context(|| format!("Failed to generate report for {orchestration_id}"))?;

    match output {
        Some(path) => {
            std::fs::write(path, report).with_context(|| format!("write {:?}", path))?;
            println!("{}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}
