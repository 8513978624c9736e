use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Result, WhatIfError};

/// Number of features exposed as adjustable sliders.
pub const ADJUSTABLE_FEATURE_COUNT: usize = 7;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataPaths,
    pub columns: ColumnNames,
    pub bounds: Vec<RankBound>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataPaths {
    pub courses: PathBuf,
    pub feature_importance: PathBuf,
    pub reference_features: PathBuf,
    pub model: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub company: String,
    pub course: String,
    pub engagement_score: String,
    pub user_count: String,
}

/// Inclusive slider range for the adjustable feature at `rank` (1-based).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RankBound {
    pub rank: usize,
    pub min: i64,
    pub max: i64,
}

impl RankBound {
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            courses: PathBuf::from("fifteen.csv"),
            feature_importance: PathBuf::from("featureimportance.csv"),
            reference_features: PathBuf::from("X.csv"),
            model: PathBuf::from("model.json"),
        }
    }
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            company: "companyid_words".to_string(),
            course: "courseid_num".to_string(),
            engagement_score: "Engagement Score".to_string(),
            user_count: "Number of Users".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataPaths::default(),
            columns: ColumnNames::default(),
            bounds: default_bounds(),
        }
    }
}

/// Ranks 1-6 slide over 0..=100, the seventh only over 0..=10.
pub fn default_bounds() -> Vec<RankBound> {
    (1..=ADJUSTABLE_FEATURE_COUNT)
        .map(|rank| RankBound {
            rank,
            min: 0,
            max: if rank == ADJUSTABLE_FEATURE_COUNT { 10 } else { 100 },
        })
        .collect()
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(raw)?;
        config.bounds.sort_by_key(|bound| bound.rank);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bounds.len() != ADJUSTABLE_FEATURE_COUNT {
            return Err(WhatIfError::InvalidConfig(format!(
                "expected {} slider bounds, found {}",
                ADJUSTABLE_FEATURE_COUNT,
                self.bounds.len()
            )));
        }

        for (index, bound) in self.bounds.iter().enumerate() {
            if bound.rank != index + 1 {
                return Err(WhatIfError::InvalidConfig(format!(
                    "slider bounds must cover ranks 1..={} exactly, found rank {}",
                    ADJUSTABLE_FEATURE_COUNT, bound.rank
                )));
            }
            if bound.min > bound.max {
                return Err(WhatIfError::InvalidConfig(format!(
                    "rank {} has min {} above max {}",
                    bound.rank, bound.min, bound.max
                )));
            }
        }

        Ok(())
    }

    /// Bound for a 1-based rank. Only valid after `validate`.
    pub fn bound_for_rank(&self, rank: usize) -> Option<RankBound> {
        self.bounds.iter().copied().find(|bound| bound.rank == rank)
    }

    /// Resolves relative data paths against `base`, normally the config file's directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.data.courses);
        resolve(&mut self.data.feature_importance);
        resolve(&mut self.data.reference_features);
        resolve(&mut self.data.model);
        self
    }
}
