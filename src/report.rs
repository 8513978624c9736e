use std::fmt::Write;

use chrono::NaiveDate;

use crate::baseline::Extraction;
use crate::features::describe;
use crate::models::{CourseRanking, OverrideSet, PredictionResult};

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(value) if value.fract() == 0.0 => format!("{value:.0}"),
        Some(value) => format!("{value:.2}"),
        None => "n/a".to_string(),
    }
}

pub fn build_report(
    generated_on: NaiveDate,
    extraction: &Extraction,
    ranking: &[CourseRanking],
    overrides: &OverrideSet,
    prediction: &PredictionResult,
) -> String {
    let baseline = &extraction.baseline;
    let mut output = String::new();

    let _ = writeln!(output, "# Course Engagement What-If Report");
    let _ = writeln!(
        output,
        "Generated for course {} at {} on {}",
        baseline.course, baseline.company, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Current Engagement");
    let _ = writeln!(
        output,
        "The current engagement score is **{:.0}**.",
        baseline.display_score
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses at {}", baseline.company);
    for entry in ranking {
        let marker = if entry.selected { " (selected)" } else { "" };
        let _ = writeln!(
            output,
            "- {}{}: score {:.0}, {} users",
            entry.course,
            marker,
            entry.display_score,
            format_value(entry.user_count)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Adjustable Features");
    let _ = writeln!(output, "| Rank | Feature | Current | What-if | Range |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for (feature, value) in extraction.adjustable.iter().zip(&overrides.values) {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {}-{} |",
            feature.rank,
            feature.name,
            format_value(baseline.value(&feature.name)),
            value,
            feature.bound.min,
            feature.bound.max
        );
    }

    let described: Vec<_> = extraction
        .adjustable
        .iter()
        .filter_map(|feature| describe(&feature.name).map(|text| (&feature.name, text)))
        .collect();
    if !described.is_empty() {
        let _ = writeln!(output);
        for (name, text) in described {
            let _ = writeln!(output, "- **{name}**: {text}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Updated Engagement");
    let _ = writeln!(
        output,
        "With these changes the predicted engagement score is **{:.1}** (currently {:.0}).",
        prediction.value, baseline.display_score
    );

    output
}
