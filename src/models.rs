use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::config::RankBound;

#[derive(Debug, Clone)]
pub struct CourseRecord {
    /// 1-based data row in the source file.
    pub row: usize,
    pub company: String,
    pub course: String,
    pub engagement_score: f64,
    pub user_count: Option<f64>,
    /// Raw cells of every non-identity column, parsed on lookup.
    pub cells: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Controllability {
    Instructor,
    Website,
    Other(String),
}

impl Controllability {
    pub fn is_adjustable(&self) -> bool {
        matches!(self, Controllability::Instructor | Controllability::Website)
    }
}

impl From<String> for Controllability {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "Instructor Features" => Controllability::Instructor,
            "Website Features" => Controllability::Website,
            _ => Controllability::Other(raw),
        }
    }
}

impl fmt::Display for Controllability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Controllability::Instructor => f.write_str("Instructor Features"),
            Controllability::Website => f.write_str("Website Features"),
            Controllability::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureImportance {
    #[serde(alias = "feature")]
    pub colname: String,
    #[serde(alias = "rank", default)]
    pub importance: Option<f64>,
    #[serde(alias = "category")]
    pub controllable: Controllability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdjustableFeature {
    /// 1-based position among the controllable features.
    pub rank: usize,
    pub name: String,
    pub importance: Option<f64>,
    pub bound: RankBound,
}

/// One course's model inputs, ordered by the model schema.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRecord {
    pub company: String,
    pub course: String,
    pub engagement_score: f64,
    pub display_score: f64,
    pub schema: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl BaselineRecord {
    pub fn value(&self, feature: &str) -> Option<f64> {
        self.schema
            .iter()
            .position(|name| name == feature)
            .and_then(|index| self.values[index])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideSet {
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseRanking {
    pub course: String,
    pub display_score: f64,
    pub user_count: Option<f64>,
    pub selected: bool,
}

/// Rounds half to even at `decimals` places, the way the source dataframes round.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
