// Training service: fits one pipeline per target, persists it and publishes
// it to the registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use gpc_ml::{
    fit_and_evaluate, load_table, BayesianRidgeParams, GradientBoostingParams, ModelArtifact,
    PipelineParams, SampleTable,
};
use gpc_models::Target;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::registry::ModelRegistry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub bayesian: BayesianRidgeParams,
    pub boosting: GradientBoostingParams,
    /// Tree depth of the clogging model, which the permeability model does not share.
    pub clogging_max_depth: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            bayesian: BayesianRidgeParams::default(),
            boosting: GradientBoostingParams::default(),
            clogging_max_depth: 4,
        }
    }
}

impl TrainingConfig {
    pub fn pipeline_for(&self, target: Target) -> PipelineParams {
        match target {
            Target::Porosity => PipelineParams::bayesian_ridge(self.bayesian),
            Target::Permeability => PipelineParams::gradient_boosting(self.boosting),
            Target::CloggingRate => {
                PipelineParams::gradient_boosting(self.boosting.max_depth(self.clogging_max_depth))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupSummary {
    pub loaded: Vec<Target>,
    pub trained: Vec<Target>,
}

#[derive(Clone)]
pub struct TrainingService {
    registry: Arc<ModelRegistry>,
    config: TrainingConfig,
    models_dir: PathBuf,
    retrain_lock: Arc<Mutex<()>>,
}

impl TrainingService {
    pub fn new(registry: Arc<ModelRegistry>, config: TrainingConfig, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            config,
            models_dir: models_dir.into(),
            retrain_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn fit_target(&self, table: &SampleTable, target: Target) -> Result<ModelArtifact> {
        let started = Instant::now();
        let dataset = table
            .select(target.feature_columns(), target.column())
            .with_context(|| format!("selecting training columns for {target}"))?;

        let params = self.config.pipeline_for(target);
        let (pipeline, metrics) =
            fit_and_evaluate(&params, &dataset, self.config.test_fraction, self.config.seed)
                .with_context(|| format!("fitting {target} model"))?;

        info!(
            "🧠 Trained {} model ({}) on {} rows in {:.2?}: r2 {:.3}, rmse {:.3}",
            target,
            params.regressor.kind().name(),
            table.n_rows(),
            started.elapsed(),
            metrics.r2,
            metrics.rmse
        );
        Ok(ModelArtifact::new(target, pipeline, metrics, table.n_rows()))
    }

    /// Fits, saves and publishes the given targets. Nothing is saved or
    /// published unless every target fits and every file is written.
    pub fn train_blocking(&self, table: &SampleTable, targets: &[Target]) -> Result<Vec<Arc<ModelArtifact>>> {
        let _guard = self.retrain_lock.lock();

        let artifacts = targets
            .iter()
            .map(|target| self.fit_target(table, *target))
            .collect::<Result<Vec<_>>>()?;

        let staged = artifacts
            .iter()
            .map(|artifact| {
                artifact
                    .stage(&self.models_dir)
                    .with_context(|| format!("saving {} model", artifact.target))
            })
            .collect::<Result<Vec<_>>>()?;
        for file in staged {
            let path = file.path().to_path_buf();
            file.commit()
                .with_context(|| format!("replacing {}", path.display()))?;
        }

        let published: Vec<Arc<ModelArtifact>> = artifacts.into_iter().map(Arc::new).collect();
        for artifact in &published {
            self.registry.insert(Arc::clone(artifact));
        }
        Ok(published)
    }

    pub async fn train_targets(&self, table: SampleTable, targets: Vec<Target>) -> Result<Vec<Arc<ModelArtifact>>> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.train_blocking(&table, &targets))
            .await
            .context("training task panicked")?
    }

    pub async fn train_all(&self, table: SampleTable) -> Result<Vec<Arc<ModelArtifact>>> {
        self.train_targets(table, Target::ALL.to_vec()).await
    }

    pub async fn train_target(&self, table: SampleTable, target: Target) -> Result<Arc<ModelArtifact>> {
        let mut artifacts = self.train_targets(table, vec![target]).await?;
        artifacts.pop().context("training produced no model")
    }

    /// Publishes the artifacts already saved in the models directory. A
    /// corrupt or outdated file counts as missing.
    pub fn load_saved(&self) -> Vec<Target> {
        let mut loaded = Vec::new();
        for target in Target::ALL {
            match ModelArtifact::load_from(&self.models_dir, target) {
                Ok(Some(artifact)) => {
                    info!(
                        "📦 Loaded {} model trained at {} ({} rows)",
                        target, artifact.trained_at, artifact.n_samples
                    );
                    self.registry.insert(Arc::new(artifact));
                    loaded.push(target);
                }
                Ok(None) => {}
                Err(e) => warn!("⚠️  Ignoring saved {} model: {}", target, e),
            }
        }
        loaded
    }

    /// Loads saved models and trains whatever is missing from `data_path`.
    /// With `retrain` set, every model is trained again regardless.
    pub async fn load_or_train(&self, data_path: &Path, retrain: bool) -> Result<StartupSummary> {
        let loaded = if retrain { Vec::new() } else { self.load_saved() };
        let missing: Vec<Target> = Target::ALL
            .into_iter()
            .filter(|target| !loaded.contains(target))
            .collect();

        if missing.is_empty() {
            return Ok(StartupSummary { loaded, trained: Vec::new() });
        }

        info!("🔄 Training {:?} from {}", missing, data_path.display());
        let path = data_path.to_path_buf();
        let table = tokio::task::spawn_blocking(move || load_table(&path))
            .await
            .context("loading task panicked")?
            .with_context(|| format!("loading training data from {}", data_path.display()))?;

        let trained = self
            .train_targets(table, missing)
            .await?
            .iter()
            .map(|artifact| artifact.target)
            .collect();
        Ok(StartupSummary { loaded, trained })
    }
}
