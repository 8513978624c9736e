use thiserror::Error;

/// Failures of a single what-if interaction. None of them are retried.
#[derive(Error, Debug)]
pub enum WhatIfError {
    #[error("{kind} '{id}' not found{scope}")]
    NotFound {
        kind: &'static str,
        id: String,
        scope: String,
    },

    #[error("feature importance table has {found} controllable features, {required} are required")]
    InsufficientFeatures { found: usize, required: usize },

    #[error("override for '{feature}' (rank {rank}) is {value}, allowed range is {min}..={max}")]
    Range {
        feature: String,
        rank: usize,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("expected {expected} override values, got {actual}")]
    OverrideArity { expected: usize, actual: usize },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("feature '{0}' is missing and has no reference values to impute from")]
    Unimputable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid value '{value}' in column '{column}' at row {row}")]
    InvalidData {
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid model artifact: {0}")]
    InvalidModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WhatIfError {
    pub fn course_not_found(company: &str, course: &str) -> Self {
        WhatIfError::NotFound {
            kind: "course",
            id: course.to_string(),
            scope: format!(" for company '{company}'"),
        }
    }

    pub fn company_not_found(company: &str) -> Self {
        WhatIfError::NotFound {
            kind: "company",
            id: company.to_string(),
            scope: String::new(),
        }
    }

    pub fn feature_not_found(feature: &str) -> Self {
        WhatIfError::NotFound {
            kind: "adjustable feature",
            id: feature.to_string(),
            scope: String::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WhatIfError>;
