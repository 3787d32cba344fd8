// Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use gpc_api::{ApiMetrics, AppState};
use gpc_ml::{GradientBoostingParams, SampleTable};
use gpc_models::*;
use gpc_services::{ModelRegistry, PredictorService, TrainingConfig, TrainingService};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

pub const COLUMNS: [&str; 9] = [
    WATER_BINDER_RATIO,
    NAOH_MOLARITY,
    NS_NH_RATIO,
    FINE_AGGREGATE_PERCENT,
    COMPRESSIVE_STRENGTH_MPA,
    PREDICTED_LIFESPAN_YEARS,
    POROSITY_PERCENT,
    PERMEABILITY_MM_HR,
    CLOGGING_RATE_PERCENT_PER_YEAR,
];

/// Synthetic samples inside the form ranges. Porosity is linear in the mix,
/// permeability grows with porosity and clogging grows with permeability.
pub fn synthetic_rows(n: usize, seed: u64) -> Vec<[f64; 9]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let wb = rng.gen_range(0.2..0.6);
            let m = rng.gen_range(6.0..16.0);
            let ns = rng.gen_range(0.5..3.0);
            let fa = rng.gen_range(0.0..40.0);
            let cs = rng.gen_range(5.0..60.0);
            let life = f64::from(rng.gen_range(1..=100_u32));
            let porosity = 30.0 - 15.0 * wb - 0.25 * fa + 0.3 * m - 0.1 * cs;
            let permeability = 60.0 * porosity + 100.0 * ns + rng.gen_range(-5.0..5.0);
            let clogging = 0.002 * permeability + 0.05 * life - 0.05 * porosity + 2.0;
            [wb, m, ns, fa, cs, life, porosity, permeability, clogging]
        })
        .collect()
}

pub fn synthetic_csv(n: usize, seed: u64) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS).unwrap();
    for row in synthetic_rows(n, seed) {
        writer.write_record(row.iter().map(|v| v.to_string())).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

pub fn synthetic_table(n: usize, seed: u64) -> SampleTable {
    let rows = synthetic_rows(n, seed);
    let columns = COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| (name.to_string(), rows.iter().map(|row| row[j]).collect()))
        .collect();
    SampleTable::from_columns(columns).unwrap()
}

pub fn fast_training_config() -> TrainingConfig {
    TrainingConfig {
        boosting: GradientBoostingParams::default().n_estimators(60),
        ..TrainingConfig::default()
    }
}

pub fn create_test_app_state(models_dir: &Path) -> AppState {
    let registry = Arc::new(ModelRegistry::new());
    let training = Arc::new(TrainingService::new(
        Arc::clone(&registry),
        fast_training_config(),
        models_dir,
    ));
    let predictor = Arc::new(PredictorService::new(registry));
    AppState::new(predictor, training, ApiMetrics::new().unwrap())
}

pub async fn create_trained_app_state(models_dir: &Path) -> AppState {
    let state = create_test_app_state(models_dir);
    state.training.train_all(synthetic_table(120, 7)).await.unwrap();
    state
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub const BOUNDARY: &str = "gpc-test-boundary";

/// multipart/form-data body with a single `file` part.
pub fn multipart_body(file_name: &str, contents: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}
