use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Form, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use gpc_ml::{load_table_from_bytes, ModelArtifact, RegressionMetrics, SampleTable, TableFormat};
use gpc_models::{
    CloggingInput, FieldSpec, GpcError, MixDesign, MixPrediction, ModelKind, PropertyPrediction, Target,
    CLOGGING_FIELDS, MIX_FIELDS,
};
use gpc_services::{PredictorService, TrainingService};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::ApiError;
use crate::html::{render_page, Outcome, Page};
use crate::metrics::ApiMetrics;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictorService>,
    pub training: Arc<TrainingService>,
    pub metrics: ApiMetrics,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(predictor: Arc<PredictorService>, training: Arc<TrainingService>, metrics: ApiMetrics) -> Self {
        Self {
            predictor,
            training,
            metrics,
            started_at: Utc::now(),
        }
    }

    fn reject(&self, error: impl Into<ApiError>) -> ApiError {
        let error = error.into();
        self.metrics.record_error(error.kind());
        error
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, message: Some(message.into()) }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: String,
    pub models_loaded: usize,
}

#[derive(Serialize)]
pub struct TargetInfo {
    pub target: Target,
    pub column: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub features: &'static [&'static str],
}

#[derive(Serialize)]
pub struct SchemaResponse {
    pub mix_fields: Vec<FieldSpec>,
    pub clogging_fields: Vec<FieldSpec>,
    pub targets: Vec<TargetInfo>,
}

#[derive(Serialize)]
pub struct ModelInfo {
    pub target: Target,
    pub model_kind: ModelKind,
    pub feature_columns: Vec<String>,
    pub feature_importances: Vec<(String, f64)>,
    pub metrics: RegressionMetrics,
    pub n_samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl From<&ModelArtifact> for ModelInfo {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            target: artifact.target,
            model_kind: artifact.kind(),
            feature_columns: artifact.pipeline.feature_columns().to_vec(),
            feature_importances: artifact.pipeline.feature_importances(),
            metrics: artifact.metrics.clone(),
            n_samples: artifact.n_samples,
            trained_at: artifact.trained_at,
        }
    }
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Form UI
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/clogging", get(clogging_index).post(clogging_form))

        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))

        // JSON API
        .route("/api/v1/schema", get(get_schema))
        .route("/api/v1/predict", post(predict_mix))
        .route("/api/v1/predict/clogging", post(predict_clogging))
        .route("/api/v1/models", get(get_models))
        .route(
            "/api/v1/dataset",
            post(upload_dataset).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// Router with state, request tracing and CORS applied.
pub fn build_app(state: AppState) -> Router {
    create_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn timed<T>(state: &AppState, f: impl FnOnce() -> Result<T, GpcError>) -> Result<T, ApiError> {
    let timer = state.metrics.prediction_seconds.start_timer();
    let result = f();
    timer.observe_duration();
    result.map_err(|e| state.reject(e))
}

fn run_mix(state: &AppState, mix: &MixDesign) -> Result<MixPrediction, ApiError> {
    let result = timed(state, || state.predictor.predict_mix(mix))?;
    for prediction in result.iter() {
        state.metrics.record_prediction(prediction.target.artifact_stem());
    }
    Ok(result)
}

fn run_clogging(state: &AppState, input: &CloggingInput) -> Result<PropertyPrediction, ApiError> {
    let result = timed(state, || state.predictor.predict_clogging(input))?;
    state.metrics.record_prediction(result.target.artifact_stem());
    Ok(result)
}

/// Reads the page's fields from a submitted form. Absent fields take their
/// default; present ones must parse as numbers.
fn parse_form(page: Page, form: &HashMap<String, String>) -> Result<HashMap<String, f64>, GpcError> {
    page.fields()
        .iter()
        .map(|spec| {
            let value = match form.get(spec.column) {
                None => spec.default,
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| GpcError::NotFinite { field: spec.column.to_string() })?,
            };
            Ok((spec.column.to_string(), value))
        })
        .collect()
}

fn html_error(page: Page, form: &HashMap<String, String>, error: &ApiError) -> Response {
    let body = render_page(page, form, &Outcome::Error(error.message()));
    (error.status(), Html(body)).into_response()
}

async fn index() -> Html<String> {
    Html(render_page(Page::Mix, &HashMap::new(), &Outcome::Blank))
}

async fn predict_form(State(state): State<AppState>, Form(form): Form<HashMap<String, String>>) -> Response {
    let result = parse_form(Page::Mix, &form)
        .and_then(|values| MixDesign::from_feature_map(&values))
        .map_err(|e| state.reject(e))
        .and_then(|mix| run_mix(&state, &mix));

    match result {
        Ok(prediction) => Html(render_page(Page::Mix, &form, &Outcome::Mix(&prediction))).into_response(),
        Err(e) => html_error(Page::Mix, &form, &e),
    }
}

async fn clogging_index() -> Html<String> {
    Html(render_page(Page::Clogging, &HashMap::new(), &Outcome::Blank))
}

async fn clogging_form(State(state): State<AppState>, Form(form): Form<HashMap<String, String>>) -> Response {
    let result = parse_form(Page::Clogging, &form)
        .and_then(|values| CloggingInput::from_feature_map(&values))
        .map_err(|e| state.reject(e))
        .and_then(|input| run_clogging(&state, &input));

    match result {
        Ok(prediction) => {
            Html(render_page(Page::Clogging, &form, &Outcome::Clogging(&prediction))).into_response()
        }
        Err(e) => html_error(Page::Clogging, &form, &e),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.predictor.registry();
    let uptime = Utc::now().signed_duration_since(state.started_at);

    Json(HealthResponse {
        status: if registry.is_complete() { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: format!("{}s", uptime.num_seconds()),
        models_loaded: registry.len(),
    })
}

async fn prometheus_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("rendering metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

async fn get_schema() -> Json<ApiResponse<SchemaResponse>> {
    let targets = Target::ALL
        .into_iter()
        .map(|target| TargetInfo {
            target,
            column: target.column(),
            label: target.label(),
            unit: target.unit(),
            features: target.feature_columns(),
        })
        .collect();

    Json(ApiResponse::ok(SchemaResponse {
        mix_fields: MIX_FIELDS.to_vec(),
        clogging_fields: CLOGGING_FIELDS.to_vec(),
        targets,
    }))
}

async fn predict_mix(
    State(state): State<AppState>,
    body: Result<Json<MixDesign>, JsonRejection>,
) -> Result<Json<ApiResponse<MixPrediction>>, ApiError> {
    let Json(mix) = body.map_err(|e| state.reject(e))?;
    let result = run_mix(&state, &mix)?;
    Ok(Json(ApiResponse::ok(result)))
}

async fn predict_clogging(
    State(state): State<AppState>,
    body: Result<Json<CloggingInput>, JsonRejection>,
) -> Result<Json<ApiResponse<PropertyPrediction>>, ApiError> {
    let Json(input) = body.map_err(|e| state.reject(e))?;
    let result = run_clogging(&state, &input)?;
    Ok(Json(ApiResponse::ok(result)))
}

async fn get_models(State(state): State<AppState>) -> Json<ApiResponse<Vec<ModelInfo>>> {
    let models: Vec<ModelInfo> = state
        .predictor
        .registry()
        .snapshot()
        .iter()
        .map(|artifact| ModelInfo::from(artifact.as_ref()))
        .collect();

    let count = models.len();
    Json(ApiResponse::ok(models).with_message(format!("{count} of {} models loaded", Target::ALL.len())))
}

/// Every column any of the models trains on, sorted and deduplicated.
fn required_columns() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = Target::ALL
        .iter()
        .flat_map(|target| target.feature_columns().iter().copied().chain([target.column()]))
        .collect();
    columns.sort_unstable();
    columns.dedup();
    columns
}

/// Columns any of the models needs that the table lacks.
fn missing_columns(table: &SampleTable) -> Vec<&'static str> {
    required_columns()
        .into_iter()
        .filter(|column| !table.has_column(column))
        .collect()
}

/// Rejects a table that cannot be trained on: a required column is absent,
/// or holds a blank or non-numeric cell.
fn check_table(table: &SampleTable) -> Result<(), ApiError> {
    let missing = missing_columns(table);
    if !missing.is_empty() {
        return Err(ApiError::BadUpload(format!(
            "dataset is missing columns: {}",
            missing.join(", ")
        )));
    }

    for column in required_columns() {
        table.column(column).map_err(|e| ApiError::BadUpload(e.to_string()))?;
    }
    Ok(())
}

async fn upload_dataset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<ModelInfo>>>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.reject(ApiError::BadUpload(format!("malformed upload: {e}"))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| state.reject(ApiError::BadUpload(format!("reading upload: {e}"))))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| state.reject(ApiError::BadUpload("missing `file` field".to_string())))?;
    info!("📤 Received dataset {} ({} bytes)", file_name, bytes.len());

    let table = TableFormat::from_file_name(&file_name)
        .and_then(|format| load_table_from_bytes(bytes.to_vec(), format))
        .map_err(|e| state.reject(ApiError::BadUpload(e.to_string())))?;

    check_table(&table).map_err(|e| state.reject(e))?;

    let n_rows = table.n_rows();
    let artifacts = state
        .training
        .train_all(table)
        .await
        .map_err(|e| state.reject(e))?;
    state.metrics.training_runs_total.inc();

    let models = artifacts.iter().map(|artifact| ModelInfo::from(artifact.as_ref())).collect();
    Ok(Json(ApiResponse::ok(models).with_message(format!("Retrained on {n_rows} rows"))))
}
