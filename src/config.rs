use config::{Config, ConfigError, Environment, File};
use gpc_ml::{BayesianRidgeParams, GradientBoostingParams};
use gpc_services::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub models: ModelsConfig,
    pub training: SplitConfig,
    pub bayesian: BayesianRidgeParams,
    pub boosting: BoostingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Spreadsheet (or CSV) of historical samples.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    /// Ignore saved models and retrain from `data.path` at startup.
    pub retrain_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub clogging_max_depth: usize,
    pub reg_lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load(&run_mode)
    }

    pub fn load(run_mode: &str) -> Result<Self, ConfigError> {
        let bayesian = BayesianRidgeParams::default();
        let boosting = GradientBoostingParams::default();

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("data.path", "data/input data.xlsx")?
            .set_default("models.dir", "models")?
            .set_default("models.retrain_on_start", false)?
            .set_default("training.test_fraction", 0.2)?
            .set_default("training.seed", 42)?
            .set_default("bayesian.max_iter", bayesian.max_iter as u64)?
            .set_default("bayesian.tol", bayesian.tol)?
            .set_default("bayesian.alpha_1", bayesian.alpha_1)?
            .set_default("bayesian.alpha_2", bayesian.alpha_2)?
            .set_default("bayesian.lambda_1", bayesian.lambda_1)?
            .set_default("bayesian.lambda_2", bayesian.lambda_2)?
            .set_default("boosting.n_estimators", boosting.n_estimators as u64)?
            .set_default("boosting.learning_rate", boosting.learning_rate)?
            .set_default("boosting.max_depth", boosting.max_depth as u64)?
            .set_default("boosting.clogging_max_depth", 4)?
            .set_default("boosting.reg_lambda", boosting.reg_lambda)?
            .set_default("boosting.gamma", boosting.gamma)?
            .set_default("boosting.min_child_weight", boosting.min_child_weight)?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from environment variables, e.g. GPC__SERVER__PORT
            .add_source(Environment::with_prefix("GPC").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn training_config(&self) -> TrainingConfig {
        let boosting = &self.boosting;
        TrainingConfig {
            test_fraction: self.training.test_fraction,
            seed: self.training.seed,
            bayesian: self.bayesian,
            boosting: GradientBoostingParams {
                n_estimators: boosting.n_estimators,
                learning_rate: boosting.learning_rate,
                max_depth: boosting.max_depth,
                reg_lambda: boosting.reg_lambda,
                gamma: boosting.gamma,
                min_child_weight: boosting.min_child_weight,
            },
            clogging_max_depth: boosting.clogging_max_depth,
        }
    }
}
