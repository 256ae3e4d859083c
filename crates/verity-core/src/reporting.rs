//! Structured and narrative renderings of an orchestration.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Result, VerityError};
use crate::orchestration::{DimensionStatus, Orchestration};
use crate::scoring::{Dimension, Rating};

const ABOUT_VERITY: &str = "VerityAI provides independent AI validation services to help \
organizations ensure their AI systems are compliant with regulatory requirements, industry \
standards, and ethical guidelines.";

/// Output format accepted by `generate_report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// The full orchestration record as pretty JSON.
    Structured,
    /// Human-readable markdown summary.
    Narrative,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Structured => "structured",
            ReportFormat::Narrative => "narrative",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            ReportFormat::Structured => "json",
            ReportFormat::Narrative => "md",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = VerityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(ReportFormat::Structured),
            "narrative" | "markdown" | "md" => Ok(ReportFormat::Narrative),
            _ => Err(VerityError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Render `orchestration` in `format`.
pub fn render(orchestration: &Orchestration, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Structured => render_structured(orchestration),
        ReportFormat::Narrative => Ok(render_narrative(orchestration, Utc::now())),
    }
}

pub fn render_structured(orchestration: &Orchestration) -> Result<String> {
    Ok(serde_json::to_string_pretty(orchestration)?)
}

/// Render the markdown report, stamped with `generated_at`.
pub fn render_narrative(orchestration: &Orchestration, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# AI System Compliance Assessment: {}\n",
        orchestration.system_id
    ));
    out.push_str(&format!(
        "*Generated by VerityAI on {}*\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    out.push_str("## Executive Summary\n\n");
    match orchestration.overall_compliance_score {
        Some(score) => {
            // Rating is banded on the two-decimal score that is printed.
            let shown = (score * 100.0).round() / 100.0;
            out.push_str(&format!("**Overall Compliance Score:** {shown:.2}/5.0\n"));
            out.push_str(&format!("**Rating:** {}\n", Rating::from_score(shown)));
        }
        None => {
            let scored = Dimension::ALL
                .iter()
                .filter(|d| orchestration.compliance_scores.contains_key(d.as_str()))
                .count();
            out.push_str(&format!(
                "**Overall Compliance Score:** pending ({scored} of {} dimensions scored)\n",
                Dimension::ALL.len()
            ));
        }
    }
    out.push('\n');

    out.push_str("## Dimension Scores\n\n");
    for dimension in Dimension::ALL {
        let line = match orchestration.compliance_scores.get(dimension.as_str()) {
            Some(score) => format!("- {dimension}: {score:.2}/5.0\n"),
            None => format!("- {dimension}: not scored\n"),
        };
        out.push_str(&line);
    }
    let failed: Vec<&str> = orchestration
        .agent_assessments
        .iter()
        .filter(|(_, a)| a.status == DimensionStatus::Failed)
        .map(|(agent_id, _)| agent_id.as_str())
        .collect();
    if !failed.is_empty() {
        out.push_str(&format!("\n**Failed agents:** {}\n", failed.join(", ")));
    }
    out.push('\n');

    out.push_str("## Assessment Information\n\n");
    out.push_str(&format!(
        "**Assessment ID:** {}\n",
        orchestration.orchestration_id
    ));
    out.push_str(&format!("**System ID:** {}\n", orchestration.system_id));
    let completed = orchestration
        .completed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!("**Date Completed:** {completed}\n"));
    out.push_str("**Conducted By:** VerityAI Assessment Platform\n\n");

    out.push_str("---\n");
    out.push_str("## About VerityAI\n\n");
    out.push_str(ABOUT_VERITY);
    out.push_str("\n\nFor more information, visit [verityai.co](https://verityai.co).\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::AgentAssessment;
    use serde_json::Map;

    fn orchestration(score: Option<f64>) -> Orchestration {
        let mut o = Orchestration::new("orch_sysA_1".to_string(), "sysA", Map::new());
        if let Some(score) = score {
            for d in Dimension::ALL {
                o.compliance_scores.insert(d.as_str().to_string(), score);
            }
        }
        o.complete();
        o
    }

    #[test]
    fn format_names_and_aliases() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Structured);
        assert_eq!("structured".parse::<ReportFormat>().unwrap(), ReportFormat::Structured);
        assert_eq!("markdown".parse::<ReportFormat>().unwrap(), ReportFormat::Narrative);
        assert_eq!("narrative".parse::<ReportFormat>().unwrap(), ReportFormat::Narrative);
        assert!(matches!(
            "xml".parse::<ReportFormat>(),
            Err(VerityError::UnsupportedFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn narrative_for_all_fours_is_very_good() {
        let o = orchestration(Some(4.0));
        let md = render_narrative(&o, Utc::now());
        assert!(md.starts_with("# AI System Compliance Assessment: sysA\n"));
        assert!(md.contains("**Overall Compliance Score:** 4.00/5.0"));
        assert!(md.contains("**Rating:** Very Good"));
        assert!(md.contains("**Assessment ID:** orch_sysA_1"));
        assert!(md.contains("## About VerityAI"));
        assert!(!md.contains("Date Completed:** N/A"));
    }

    #[test]
    fn rating_follows_the_printed_score() {
        let md = render_narrative(&orchestration(Some(4.4975)), Utc::now());
        assert!(md.contains("**Overall Compliance Score:** 4.50/5.0"));
        assert!(md.contains("**Rating:** Excellent"));

        let md = render_narrative(&orchestration(Some(4.494)), Utc::now());
        assert!(md.contains("**Overall Compliance Score:** 4.49/5.0"));
        assert!(md.contains("**Rating:** Very Good"));
    }

    #[test]
    fn narrative_without_overall_shows_pending() {
        let mut o = Orchestration::new("orch_sysA_2".to_string(), "sysA", Map::new());
        o.compliance_scores.insert("privacy".to_string(), 3.0);
        o.agent_assessments.insert(
            "safety_agent".to_string(),
            AgentAssessment::failed(None, "safety", "boom".to_string()),
        );
        let md = render_narrative(&o, Utc::now());
        assert!(md.contains("pending (1 of 8 dimensions scored)"));
        assert!(!md.contains("**Rating:**"));
        assert!(md.contains("- privacy: 3.00/5.0"));
        assert!(md.contains("- fairness: not scored"));
        assert!(md.contains("**Failed agents:** safety_agent"));
        assert!(md.contains("**Date Completed:** N/A"));
    }

    #[test]
    fn structured_report_parses_back() {
        let o = orchestration(Some(3.0));
        let json = render(&o, ReportFormat::Structured).unwrap();
        let back: Orchestration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, o);
    }
}
