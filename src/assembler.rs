use log::debug;

use crate::config::ADJUSTABLE_FEATURE_COUNT;
use crate::dataset::FeatureTable;
use crate::errors::{Result, WhatIfError};
use crate::models::{round_to, AdjustableFeature, BaselineRecord, OverrideSet, PredictionResult};
use crate::regressor::Regressor;

impl OverrideSet {
    /// Slider positions before the user touches them: the course's own values,
    /// rounded and held inside each slider's range. Missing values start at the minimum.
    pub fn from_baseline(baseline: &BaselineRecord, adjustable: &[AdjustableFeature]) -> Self {
        let values = adjustable
            .iter()
            .map(|feature| match baseline.value(&feature.name) {
                Some(value) => {
                    (round_to(value, 0) as i64).clamp(feature.bound.min, feature.bound.max)
                }
                None => feature.bound.min,
            })
            .collect();
        Self { values }
    }

    /// Moves the slider for `feature`. Bounds are checked at prediction time.
    pub fn set(&mut self, adjustable: &[AdjustableFeature], feature: &str, value: i64) -> Result<()> {
        let idx = adjustable
            .iter()
            .position(|candidate| candidate.name == feature)
            .ok_or_else(|| WhatIfError::feature_not_found(feature))?;
        if idx >= self.values.len() {
            return Err(WhatIfError::OverrideArity {
                expected: adjustable.len(),
                actual: self.values.len(),
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    pub fn validate(&self, adjustable: &[AdjustableFeature]) -> Result<()> {
        if self.values.len() != ADJUSTABLE_FEATURE_COUNT || adjustable.len() != self.values.len() {
            return Err(WhatIfError::OverrideArity {
                expected: ADJUSTABLE_FEATURE_COUNT,
                actual: self.values.len(),
            });
        }

        for (feature, &value) in adjustable.iter().zip(&self.values) {
            if !feature.bound.contains(value) {
                return Err(WhatIfError::Range {
                    feature: feature.name.clone(),
                    rank: feature.rank,
                    value,
                    min: feature.bound.min,
                    max: feature.bound.max,
                });
            }
        }

        Ok(())
    }
}

fn check_schema(model_schema: &[String], baseline: &BaselineRecord) -> Result<()> {
    if model_schema == baseline.schema.as_slice() {
        return Ok(());
    }

    let detail = match model_schema
        .iter()
        .zip(&baseline.schema)
        .position(|(expected, actual)| expected != actual)
    {
        Some(idx) => format!(
            "column {} is '{}' but the model expects '{}'",
            idx, baseline.schema[idx], model_schema[idx]
        ),
        None => format!(
            "baseline has {} columns but the model expects {}",
            baseline.schema.len(),
            model_schema.len()
        ),
    };
    Err(WhatIfError::SchemaMismatch(detail))
}

/// Applies the overrides, imputes what is still missing from the full reference
/// table and asks the model for an updated engagement score.
pub fn predict<M: Regressor + ?Sized>(
    model: &M,
    reference: &FeatureTable,
    baseline: &BaselineRecord,
    adjustable: &[AdjustableFeature],
    overrides: &OverrideSet,
) -> Result<PredictionResult> {
    overrides.validate(adjustable)?;
    check_schema(model.feature_names(), baseline)?;

    let mut row = baseline.values.clone();
    for (feature, &value) in adjustable.iter().zip(&overrides.values) {
        let idx = baseline
            .schema
            .iter()
            .position(|name| *name == feature.name)
            .ok_or_else(|| {
                WhatIfError::SchemaMismatch(format!(
                    "adjustable feature '{}' is not a model input",
                    feature.name
                ))
            })?;
        row[idx] = Some(value as f64);
    }

    let mut imputed = 0usize;
    let mut completed = Vec::with_capacity(row.len());
    for (name, cell) in baseline.schema.iter().zip(row) {
        let value = match cell {
            Some(value) => value,
            None => {
                imputed += 1;
                reference
                    .column_mean(name)?
                    .ok_or_else(|| WhatIfError::Unimputable(name.clone()))?
            }
        };
        completed.push(value);
    }

    let raw = model.predict(&completed)?;
    if !raw.is_finite() {
        return Err(WhatIfError::InvalidModel(format!(
            "prediction for {} / {} is not finite",
            baseline.company, baseline.course
        )));
    }

    let result = PredictionResult {
        value: round_to(raw, 1),
    };
    debug!(
        "Predicted {} for {} / {} (raw {raw}, {imputed} imputed)",
        result.value, baseline.company, baseline.course
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::config::default_bounds;
    use crate::features::tests::RANKED;

    /// Records the row it was called with and returns a fixed linear function of it.
    struct RecordingModel {
        schema: Vec<String>,
        calls: Cell<usize>,
        last_row: RefCell<Vec<f64>>,
    }

    impl RecordingModel {
        fn new(schema: Vec<String>) -> Self {
            Self {
                schema,
                calls: Cell::new(0),
                last_row: RefCell::new(Vec::new()),
            }
        }
    }

    impl Regressor for RecordingModel {
        fn feature_names(&self) -> &[String] {
            &self.schema
        }

        fn predict(&self, row: &[f64]) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            *self.last_row.borrow_mut() = row.to_vec();
            Ok(20.0 + row.iter().sum::<f64>() / 30.0)
        }
    }

    fn schema() -> Vec<String> {
        let mut schema: Vec<String> = RANKED.iter().map(|s| s.to_string()).collect();
        schema.insert(2, "Region Code".to_string());
        schema
    }

    fn adjustable() -> Vec<AdjustableFeature> {
        RANKED
            .iter()
            .zip(default_bounds())
            .map(|(name, bound)| AdjustableFeature {
                rank: bound.rank,
                name: name.to_string(),
                importance: None,
                bound,
            })
            .collect()
    }

    fn baseline(region: Option<f64>) -> BaselineRecord {
        BaselineRecord {
            company: "Acme".to_string(),
            course: "C1".to_string(),
            engagement_score: 75.2,
            display_score: 75.0,
            schema: schema(),
            values: vec![
                Some(40.0),
                Some(3.0),
                region,
                Some(1.0),
                None,
                Some(2.0),
                Some(0.0),
                Some(4.5),
            ],
        }
    }

    /// "Region Code" averages 6 over its non-missing rows.
    fn reference() -> FeatureTable {
        let columns = schema();
        let row = |region: Option<f64>| -> Vec<Option<f64>> {
            columns
                .iter()
                .map(|name| if name == "Region Code" { region } else { Some(1.0) })
                .collect()
        };
        FeatureTable::new(
            columns.clone(),
            vec![row(Some(2.0)), row(Some(10.0)), row(None), row(Some(6.0))],
        )
    }

    fn overrides(values: [i64; 7]) -> OverrideSet {
        OverrideSet {
            values: values.to_vec(),
        }
    }

    #[test]
    fn overrides_replace_values_by_name_and_gaps_use_population_mean() {
        let model = RecordingModel::new(schema());
        let result = predict(
            &model,
            &reference(),
            &baseline(None),
            &adjustable(),
            &overrides([90, 10, 1, 5, 2, 0, 8]),
        )
        .unwrap();

        assert_eq!(model.calls.get(), 1);
        assert_eq!(
            *model.last_row.borrow(),
            vec![90.0, 10.0, 6.0, 1.0, 5.0, 2.0, 0.0, 8.0]
        );
        assert_eq!(result.value, round_to(20.0 + 122.0 / 30.0, 1));
        assert_eq!(result.value, 24.1);
    }

    #[test]
    fn prediction_is_idempotent() {
        let model = RecordingModel::new(schema());
        let (table, base, features) = (reference(), baseline(None), adjustable());
        let set = overrides([90, 3, 1, 0, 2, 0, 4]);
        let first = predict(&model, &table, &base, &features, &set).unwrap();
        let second = predict(&model, &table, &base, &features, &set).unwrap();
        assert_eq!(first, second);
        assert_eq!(model.calls.get(), 2);
    }

    #[test]
    fn complete_rows_ignore_the_reference_table() {
        let model = RecordingModel::new(schema());
        let empty = FeatureTable::new(Vec::new(), Vec::new());
        let set = overrides([90, 3, 1, 0, 2, 0, 4]);
        let with_table = predict(&model, &reference(), &baseline(Some(7.0)), &adjustable(), &set);
        let without = predict(&model, &empty, &baseline(Some(7.0)), &adjustable(), &set);
        assert_eq!(with_table.unwrap(), without.unwrap());
    }

    #[test]
    fn bounds_are_inclusive_and_rank_specific() {
        let model = RecordingModel::new(schema());
        let (table, base, features) = (reference(), baseline(None), adjustable());

        for values in [[0, 0, 0, 0, 0, 0, 0], [100, 100, 100, 100, 100, 100, 10]] {
            assert!(predict(&model, &table, &base, &features, &overrides(values)).is_ok());
        }

        for values in [
            [101, 0, 0, 0, 0, 0, 0],
            [-1, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 11],
            [0, 0, 0, 0, 0, 0, -1],
        ] {
            let err = predict(&model, &table, &base, &features, &overrides(values)).unwrap_err();
            assert!(matches!(err, WhatIfError::Range { .. }), "{values:?} gave {err}");
        }

        let err = predict(&model, &table, &base, &features, &overrides([0, 0, 0, 0, 0, 0, 100]))
            .unwrap_err();
        assert!(matches!(err, WhatIfError::Range { rank: 7, max: 10, .. }));
        assert_eq!(model.calls.get(), 2);
    }

    #[test]
    fn override_count_must_be_seven() {
        let model = RecordingModel::new(schema());
        let short = OverrideSet {
            values: vec![1, 2, 3],
        };
        let err = predict(&model, &reference(), &baseline(None), &adjustable(), &short).unwrap_err();
        assert!(matches!(
            err,
            WhatIfError::OverrideArity { expected: 7, actual: 3 }
        ));
    }

    #[test]
    fn reordered_schema_is_rejected() {
        let mut swapped = schema();
        swapped.swap(0, 1);
        let model = RecordingModel::new(swapped);
        let err = predict(
            &model,
            &reference(),
            &baseline(None),
            &adjustable(),
            &overrides([1; 7]),
        )
        .unwrap_err();
        assert!(matches!(err, WhatIfError::SchemaMismatch(_)));
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn adjustable_feature_outside_schema_is_rejected() {
        let mut features = adjustable();
        features[3].name = "Videos".to_string();
        let model = RecordingModel::new(schema());
        let err = predict(&model, &reference(), &baseline(None), &features, &overrides([1; 7]))
            .unwrap_err();
        assert!(matches!(err, WhatIfError::SchemaMismatch(_)));
    }

    #[test]
    fn missing_column_without_reference_values_is_unimputable() {
        let model = RecordingModel::new(schema());
        let mut table = reference();
        for row in &mut table.rows {
            row[2] = None;
        }
        let err = predict(&model, &table, &baseline(None), &adjustable(), &overrides([1; 7]))
            .unwrap_err();
        assert!(matches!(err, WhatIfError::Unimputable(ref name) if name == "Region Code"));
    }

    #[test]
    fn sliders_start_from_the_baseline() {
        let base = baseline(None);
        let features = adjustable();
        let mut set = OverrideSet::from_baseline(&base, &features);
        // Interactive Pages is missing; Teacher Comments 4.5 rounds to even.
        assert_eq!(set.values, vec![40, 3, 1, 0, 2, 0, 4]);

        set.set(&features, "Content Pages", 90).unwrap();
        assert_eq!(set.values[0], 90);
        assert!(matches!(
            set.set(&features, "Videos", 1),
            Err(WhatIfError::NotFound { .. })
        ));
    }

    #[test]
    fn slider_start_is_held_inside_its_range() {
        let mut base = baseline(None);
        base.values[7] = Some(42.0);
        base.values[0] = Some(250.0);
        let set = OverrideSet::from_baseline(&base, &adjustable());
        assert_eq!(set.values[0], 100);
        assert_eq!(set.values[6], 10);
    }
}
