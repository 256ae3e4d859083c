//! Compliance dimensions, score aggregation and rating bands.
//!
//! Scores live on a 0.0–5.0 scale. An overall score only exists once every
//! canonical dimension has been scored, and it is the plain mean of those
//! eight values. Extra, non-canonical dimensions are kept but never averaged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerityError};

/// Lowest valid score.
pub const MIN_SCORE: f64 = 0.0;
/// Highest valid score.
pub const MAX_SCORE: f64 = 5.0;

/// The canonical compliance dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Transparency,
    Accountability,
    Fairness,
    Privacy,
    Safety,
    Security,
    HumanValue,
    SocialImpact,
}

impl Dimension {
    /// All canonical dimensions, in reporting order.
    pub const ALL: [Dimension; 8] = [
        Dimension::Transparency,
        Dimension::Accountability,
        Dimension::Fairness,
        Dimension::Privacy,
        Dimension::Safety,
        Dimension::Security,
        Dimension::HumanValue,
        Dimension::SocialImpact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Transparency => "transparency",
            Dimension::Accountability => "accountability",
            Dimension::Fairness => "fairness",
            Dimension::Privacy => "privacy",
            Dimension::Safety => "safety",
            Dimension::Security => "security",
            Dimension::HumanValue => "human_value",
            Dimension::SocialImpact => "social_impact",
        }
    }

    /// Conventional agent ID for the agent specialising in this dimension.
    pub fn default_agent_id(self) -> String {
        format!("{}_agent", self.as_str())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension: {s}"))
    }
}

/// Reject non-finite scores and scores outside `MIN_SCORE..=MAX_SCORE`.
pub fn validate_score(dimension: &str, score: f64) -> Result<()> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(VerityError::ScoreOutOfRange {
            dimension: dimension.to_string(),
            score,
        });
    }
    Ok(())
}

/// Mean of the canonical dimension scores, or `None` while any is missing.
pub fn overall_score(scores: &BTreeMap<String, f64>) -> Option<f64> {
    let mut sum = 0.0;
    for dimension in Dimension::ALL {
        sum += scores.get(dimension.as_str())?;
    }
    Some(sum / Dimension::ALL.len() as f64)
}

/// Discrete rating band shown in the narrative report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    SignificantConcerns,
    NeedsImprovement,
    Satisfactory,
    Good,
    VeryGood,
    Excellent,
}

/// Inclusive lower bounds, highest band first.
const RATING_BANDS: [(f64, Rating); 5] = [
    (4.5, Rating::Excellent),
    (4.0, Rating::VeryGood),
    (3.5, Rating::Good),
    (3.0, Rating::Satisfactory),
    (2.0, Rating::NeedsImprovement),
];

impl Rating {
    pub fn from_score(score: f64) -> Self {
        RATING_BANDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, rating)| *rating)
            .unwrap_or(Rating::SignificantConcerns)
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::VeryGood => "Very Good",
            Rating::Good => "Good",
            Rating::Satisfactory => "Satisfactory",
            Rating::NeedsImprovement => "Needs Improvement",
            Rating::SignificantConcerns => "Significant Concerns",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
