use crate::config::{AppConfig, ADJUSTABLE_FEATURE_COUNT};
use crate::errors::{Result, WhatIfError};
use crate::models::{AdjustableFeature, FeatureImportance};

/// The first seven instructor or website features, in table order.
pub fn select_adjustable_features(
    table: &[FeatureImportance],
    config: &AppConfig,
) -> Result<Vec<AdjustableFeature>> {
    let eligible: Vec<&FeatureImportance> = table
        .iter()
        .filter(|row| row.controllable.is_adjustable())
        .take(ADJUSTABLE_FEATURE_COUNT)
        .collect();

    if eligible.len() < ADJUSTABLE_FEATURE_COUNT {
        return Err(WhatIfError::InsufficientFeatures {
            found: eligible.len(),
            required: ADJUSTABLE_FEATURE_COUNT,
        });
    }

    eligible
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let rank = idx + 1;
            let bound = config.bound_for_rank(rank).ok_or_else(|| {
                WhatIfError::InvalidConfig(format!("no slider bound for rank {rank}"))
            })?;
            Ok(AdjustableFeature {
                rank,
                name: row.colname.clone(),
                importance: row.importance,
                bound,
            })
        })
        .collect()
}

/// Platform descriptions for the controllable features instructors see.
pub fn describe(feature: &str) -> Option<&'static str> {
    let description = match feature {
        "Content Pages" => "Text, slideshows, presentations, videos, list rolls, PDF viewers, ads, recipes, audio files, and articles",
        "Not-Graded Assessments" => "Surveys, tallies, and workbooks",
        "Certificates" => "Certificates given after course completion",
        "Interactive Pages" => "Assignments, flip card sets, notebooks, highlight zone sets, highlight zone quizzes, match pair sets, discussion boards, social share card sets, and images",
        "Graded Assessments" => "Tests and quizzes",
        "External Pages" => "LTI, shareable content objects, API objects, survey gizmos, embedded features, in-person events, and meeting information",
        "Teacher Comments" => "Number of times the instructor comments on an assignment",
        _ => return None,
    };
    Some(description)
}
