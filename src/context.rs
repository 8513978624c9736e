use log::info;

use crate::assembler;
use crate::baseline::{self, Extraction};
use crate::config::AppConfig;
use crate::dataset::{load_feature_importance, CourseDataset, FeatureTable};
use crate::errors::Result;
use crate::features::select_adjustable_features;
use crate::models::{AdjustableFeature, FeatureImportance, OverrideSet, PredictionResult};
use crate::regressor::{ModelArtifact, Regressor};

/// Read-only inputs loaded once at startup and shared by every interaction.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub dataset: CourseDataset,
    pub importance: Vec<FeatureImportance>,
    pub reference: FeatureTable,
    pub model: ModelArtifact,
    pub adjustable: Vec<AdjustableFeature>,
}

impl AppContext {
    pub fn load(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let dataset = CourseDataset::load(&config.data.courses, &config.columns)?;
        let importance = load_feature_importance(&config.data.feature_importance)?;
        let reference = FeatureTable::load(&config.data.reference_features)?;
        let model = ModelArtifact::load(&config.data.model)?;
        Self::new(config, dataset, importance, reference, model)
    }

    pub fn new(
        config: AppConfig,
        dataset: CourseDataset,
        importance: Vec<FeatureImportance>,
        reference: FeatureTable,
        model: ModelArtifact,
    ) -> Result<Self> {
        let adjustable = select_adjustable_features(&importance, &config)?;
        info!(
            "Adjustable features: {}",
            adjustable
                .iter()
                .map(|feature| feature.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            config,
            dataset,
            importance,
            reference,
            model,
            adjustable,
        })
    }

    pub fn extract(&self, company: &str, course: &str) -> Result<Extraction> {
        baseline::extract(
            &self.dataset,
            &self.importance,
            self.model.feature_names(),
            &self.config,
            company,
            course,
        )
    }

    pub fn predict(&self, extraction: &Extraction, overrides: &OverrideSet) -> Result<PredictionResult> {
        assembler::predict(
            &self.model,
            &self.reference,
            &extraction.baseline,
            &extraction.adjustable,
            overrides,
        )
    }
}
