//! Fitted pipelines persisted to disk together with their training metadata.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gpc_models::{ModelKind, Target};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MlError, Result};
use crate::evaluation::RegressionMetrics;
use crate::pipeline::FittedPipeline;

/// Bumped whenever the serialized layout of a pipeline changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub target: Target,
    pub pipeline: FittedPipeline,
    pub metrics: RegressionMetrics,
    pub n_samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn new(target: Target, pipeline: FittedPipeline, metrics: RegressionMetrics, n_samples: usize) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            target,
            pipeline,
            metrics,
            n_samples,
            trained_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.pipeline.kind()
    }

    /// `<dir>/<stem>_model.bin`, e.g. `models/porosity_model.bin`.
    pub fn path_in(dir: &Path, target: Target) -> PathBuf {
        dir.join(format!("{}_model.bin", target.artifact_stem()))
    }

    /// Writes the artifact next to its destination without replacing the
    /// current file. Nothing changes under the final name until
    /// [`StagedArtifact::commit`].
    pub fn stage(&self, dir: &Path) -> Result<StagedArtifact> {
        fs::create_dir_all(dir).map_err(|source| MlError::Io { path: dir.to_path_buf(), source })?;

        let path = Self::path_in(dir, self.target);
        let staged = StagedArtifact {
            target: self.target,
            staging: path.with_extension("bin.tmp"),
            path,
        };
        let io_err = |source| MlError::Io { path: staged.staging.clone(), source };

        let file = File::create(&staged.staging).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush().map_err(io_err)?;
        Ok(staged)
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        self.stage(dir)?.commit()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| MlError::Io { path: path.to_path_buf(), source })?;
        let artifact: Self = bincode::deserialize_from(BufReader::new(file))?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(MlError::IncompatibleArtifact(format!(
                "{} has format version {}, expected {}",
                path.display(),
                artifact.format_version,
                ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }

    /// Loads the artifact for `target` from `dir`, or `None` if there is none.
    pub fn load_from(dir: &Path, target: Target) -> Result<Option<Self>> {
        let path = Self::path_in(dir, target);
        if !path.exists() {
            return Ok(None);
        }

        let artifact = Self::load(&path)?;
        if artifact.target != target {
            return Err(MlError::IncompatibleArtifact(format!(
                "{} holds a {} model",
                path.display(),
                artifact.target
            )));
        }
        Ok(Some(artifact))
    }
}

/// A fully written model file that has not yet replaced the one in use.
/// Dropping it without committing removes the staging file.
#[derive(Debug)]
pub struct StagedArtifact {
    target: Target,
    staging: PathBuf,
    path: PathBuf,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(self) -> Result<PathBuf> {
        fs::rename(&self.staging, &self.path)
            .map_err(|source| MlError::Io { path: self.path.clone(), source })?;
        info!("💾 Saved {} model to {}", self.target, self.path.display());
        Ok(self.path.clone())
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        // Already renamed away after a commit.
        let _ = fs::remove_file(&self.staging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayesian_ridge::BayesianRidgeParams;
    use crate::boosting::GradientBoostingParams;
    use crate::evaluation::EvaluationSplit;
    use crate::pipeline::PipelineParams;
    use linfa::traits::{Fit, Predict};
    use linfa::Dataset;
    use ndarray::Array2;

    fn metrics() -> RegressionMetrics {
        RegressionMetrics { r2: 0.9, rmse: 1.0, mae: 0.8, n_train: 16, n_test: 4, split: EvaluationSplit::HoldOut }
    }

    fn dataset() -> Dataset<f64, f64, ndarray::Ix1> {
        let x = Array2::from_shape_fn((20, 3), |(i, j)| ((i * (j + 2)) % 11) as f64);
        let y: ndarray::Array1<f64> = x.rows().into_iter().map(|r| r[0] * 2.0 - r[2]).collect();
        Dataset::new(x, y).with_feature_names(vec!["a", "b", "c"])
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset();

        for params in [
            PipelineParams::bayesian_ridge(BayesianRidgeParams::default()),
            PipelineParams::gradient_boosting(GradientBoostingParams::default().n_estimators(30)),
        ] {
            let pipeline = params.fit(&dataset).unwrap();
            let artifact = ModelArtifact::new(Target::Permeability, pipeline, metrics(), 20);
            let path = artifact.save(dir.path()).unwrap();
            assert_eq!(path, dir.path().join("permeability_model.bin"));

            let loaded = ModelArtifact::load_from(dir.path(), Target::Permeability).unwrap().unwrap();
            assert_eq!(loaded.target, artifact.target);
            assert_eq!(loaded.metrics, artifact.metrics);
            assert_eq!(loaded.trained_at, artifact.trained_at);
            assert_eq!(loaded.pipeline.feature_columns(), artifact.pipeline.feature_columns());
            assert_eq!(
                loaded.pipeline.predict(dataset.records()),
                artifact.pipeline.predict(dataset.records())
            );
        }
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelArtifact::load_from(dir.path(), Target::Porosity).unwrap().is_none());
    }

    #[test]
    fn test_target_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset())
            .unwrap();
        ModelArtifact::new(Target::Porosity, pipeline, metrics(), 20).save(dir.path()).unwrap();

        fs::rename(
            ModelArtifact::path_in(dir.path(), Target::Porosity),
            ModelArtifact::path_in(dir.path(), Target::CloggingRate),
        )
        .unwrap();

        assert!(matches!(
            ModelArtifact::load_from(dir.path(), Target::CloggingRate),
            Err(MlError::IncompatibleArtifact(_))
        ));
    }

    #[test]
    fn test_garbage_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(ModelArtifact::path_in(dir.path(), Target::Porosity), b"not a model").unwrap();

        assert!(matches!(
            ModelArtifact::load_from(dir.path(), Target::Porosity),
            Err(MlError::Serialization(_))
        ));
    }

    #[test]
    fn test_format_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset())
            .unwrap();
        let artifact = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION + 98,
            ..ModelArtifact::new(Target::Porosity, pipeline, metrics(), 20)
        };
        artifact.save(dir.path()).unwrap();

        match ModelArtifact::load_from(dir.path(), Target::Porosity) {
            Err(MlError::IncompatibleArtifact(message)) => {
                assert!(message.contains("format version 99"), "{message}");
            }
            other => panic!("expected an incompatible artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_staged_artifact_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset())
            .unwrap();
        let artifact = ModelArtifact::new(Target::Porosity, pipeline, metrics(), 20);

        let staged = artifact.stage(dir.path()).unwrap();
        assert!(ModelArtifact::load_from(dir.path(), Target::Porosity).unwrap().is_none());
        staged.commit().unwrap();
        assert!(ModelArtifact::load_from(dir.path(), Target::Porosity).unwrap().is_some());

        drop(artifact.stage(dir.path()).unwrap());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
