pub mod buckets;
pub mod classify;
pub mod compare;
pub mod faculty;
pub mod init;
pub mod overview;
pub mod summary;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use entrust_classifier::EntrustConfig;
use entrust_core::catalogue::Catalogue;
use entrust_core::dataset::Dataset;
use entrust_core::model::Actor;
use entrust_core::service::EvaluationService;

/// Config, catalogue and dataset for a dataset-backed command.
pub(crate) struct Workspace {
    pub config: EntrustConfig,
    pub catalogue: Catalogue,
    pub dataset: Dataset,
}

impl Workspace {
    pub fn load(dataset_path: &Path, config_path: Option<PathBuf>) -> Result<Self> {
        let config = entrust_classifier::load_config_from(config_path.as_deref())?;
        let catalogue = config.load_catalogue()?;
        let dataset = Dataset::load_json(dataset_path)?;
        tracing::debug!(
            actors = dataset.actors.len(),
            evaluations = dataset.evaluations.len(),
            catalogue = %catalogue.name,
            "loaded dataset"
        );
        Ok(Self {
            config,
            catalogue,
            dataset,
        })
    }

    pub fn actor(&self, key: &str) -> Result<Actor> {
        self.dataset
            .find_actor(key)
            .cloned()
            .with_context(|| format!("no actor with id or name '{key}' in dataset"))
    }

    /// Move the dataset into a store behind the evaluation service.
    pub fn into_service(self) -> EvaluationService {
        let service_config = self.config.service_config();
        EvaluationService::new(
            Arc::new(self.dataset.into_store()),
            self.catalogue,
            service_config,
        )
    }
}
