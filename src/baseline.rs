use log::debug;

use crate::config::AppConfig;
use crate::dataset::CourseDataset;
use crate::errors::{Result, WhatIfError};
use crate::features::select_adjustable_features;
use crate::models::{round_to, AdjustableFeature, BaselineRecord, FeatureImportance};

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub baseline: BaselineRecord,
    pub adjustable: Vec<AdjustableFeature>,
}

/// Looks up one course and shapes its features to `schema`, the model's input order.
pub fn extract(
    dataset: &CourseDataset,
    importance: &[FeatureImportance],
    schema: &[String],
    config: &AppConfig,
    company: &str,
    course: &str,
) -> Result<Extraction> {
    let record = dataset.find(company, course)?;
    let adjustable = select_adjustable_features(importance, config)?;

    let mut values = Vec::with_capacity(schema.len());
    for name in schema {
        if !dataset.has_column(name) {
            return Err(WhatIfError::SchemaMismatch(format!(
                "model feature '{name}' is not a column of the course dataset"
            )));
        }
        values.push(record.feature(name)?);
    }

    let baseline = BaselineRecord {
        company: record.company.clone(),
        course: record.course.clone(),
        engagement_score: record.engagement_score,
        display_score: round_to(record.engagement_score, 0),
        schema: schema.to_vec(),
        values,
    };

    debug!(
        "Extracted baseline for {} / {}: score {} ({} missing of {} features)",
        company,
        course,
        baseline.display_score,
        baseline.values.iter().filter(|v| v.is_none()).count(),
        schema.len()
    );

    Ok(Extraction {
        baseline,
        adjustable,
    })
}
