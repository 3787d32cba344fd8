mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use gpc_api::build_app;
use gpc_models::{MixDesign, NAOH_MOLARITY, PERMEABILITY_MM_HR, WATER_BINDER_RATIO};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;

fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_test_app_state(dir.path()));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["models_loaded"], 0);
    assert!(health["timestamp"].is_string());
    assert!(health["version"].is_string());
}

#[tokio::test]
async fn test_predict_defaults_returns_three_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let state = create_trained_app_state(dir.path()).await;
    let app = build_app(state);

    let body = serde_json::to_value(MixDesign::default()).unwrap();
    let response = app.oneshot(json_post("/api/v1/predict", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    assert_eq!(result["success"], true);
    for key in ["porosity", "permeability", "clogging_rate"] {
        assert!(result["data"][key]["value"].is_f64(), "{key} missing: {result}");
    }
    assert_eq!(result["data"]["porosity"]["model_kind"], "bayesian_ridge");
    assert_eq!(result["data"]["permeability"]["unit"], "mm/hr");
}

#[tokio::test]
async fn test_partial_json_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_trained_app_state(dir.path()).await);

    let response = app
        .oneshot(json_post("/api/v1/predict", &json!({ WATER_BINDER_RATIO: 0.45 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_out_of_range_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let state = create_trained_app_state(dir.path()).await;
    let metrics = state.metrics.clone();
    let app = build_app(state);

    let response = app
        .oneshot(json_post("/api/v1/predict", &json!({ NAOH_MOLARITY: 25.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let result = body_json(response).await;
    assert_eq!(result["success"], false);
    assert!(result["message"].as_str().unwrap().contains(NAOH_MOLARITY));
    assert_eq!(metrics.prediction_errors_total.with_label_values(&["validation"]).get(), 1);
}

#[tokio::test]
async fn test_untrained_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_test_app_state(dir.path()));

    let body = serde_json::to_value(MixDesign::default()).unwrap();
    let response = app.oneshot(json_post("/api/v1/predict", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_clogging_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_trained_app_state(dir.path()).await);

    let response = app
        .oneshot(json_post("/api/v1/predict/clogging", &json!({ PERMEABILITY_MM_HR: 1500.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    assert_eq!(result["data"]["target"], "clogging_rate");
    assert_eq!(result["data"]["model_kind"], "gradient_boosting");
    assert!(result["data"]["value"].is_f64());
}

#[tokio::test]
async fn test_schema_lists_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_test_app_state(dir.path()));

    let response = app.oneshot(get("/api/v1/schema")).await.unwrap();
    let schema = body_json(response).await;

    assert_eq!(schema["data"]["mix_fields"].as_array().unwrap().len(), 6);
    assert_eq!(schema["data"]["clogging_fields"].as_array().unwrap().len(), 8);
    assert_eq!(schema["data"]["mix_fields"][0]["column"], WATER_BINDER_RATIO);
    assert_eq!(schema["data"]["targets"][1]["column"], PERMEABILITY_MM_HR);
}

#[tokio::test]
async fn test_form_page_and_submission() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_trained_app_state(dir.path()).await);

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Geopolymer Pervious Concrete – Property Prediction"));
    assert!(page.contains(r#"name="NaOH_Molarity""#));

    let response = app
        .clone()
        .oneshot(form_post("/predict", "Water_Binder_Ratio=0.3&NaOH_Molarity=12"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Porosity (%)"));
    assert!(page.contains("Permeability (mm/hr)"));
    assert!(page.contains("Clogging Rate (% per year)"));
    assert!(page.contains(r#"value="12""#));

    let response = app
        .oneshot(form_post("/predict", "Water_Binder_Ratio=0.95"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains(r#"class="error""#));
}

#[tokio::test]
async fn test_clogging_form_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_trained_app_state(dir.path()).await);

    let response = app.clone().oneshot(get("/clogging")).await.unwrap();
    assert!(body_text(response).await.contains(r#"name="Permeability_mm_hr""#));

    let response = app
        .oneshot(form_post("/clogging", "Permeability_mm_hr=800&Porosity_percent=18"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("metric-value"));
}

#[tokio::test]
async fn test_dataset_upload_retrains() {
    let dir = tempfile::tempdir().unwrap();
    let state = create_test_app_state(dir.path());
    let registry = state.predictor.registry().clone();
    let app = build_app(state);

    let csv = synthetic_csv(60, 3);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/dataset")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart_body("samples.csv", csv.as_bytes()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    assert_eq!(result["data"].as_array().unwrap().len(), 3);
    assert_eq!(result["data"][0]["metrics"]["n_test"], 12);
    assert!(registry.is_complete());

    let response = app.oneshot(get("/api/v1/models")).await.unwrap();
    let models = body_json(response).await;
    assert_eq!(models["data"][2]["target"], "clogging_rate");
    assert_eq!(models["data"][2]["feature_columns"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_bad_uploads_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_test_app_state(dir.path()));

    let upload = |name: &str, contents: &[u8]| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/dataset")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(multipart_body(name, contents))
            .unwrap()
    };

    let response = app.clone().oneshot(upload("samples.txt", b"a,b\n1,2\n")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(upload("samples.csv", b"Water_Binder_Ratio,NaOH_Molarity\n0.3,10\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let result = body_json(response).await;
    assert!(result["message"].as_str().unwrap().contains("missing columns"));
}

#[tokio::test]
async fn test_upload_with_non_numeric_cell_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = create_test_app_state(dir.path());
    let registry = state.predictor.registry().clone();
    let metrics = state.metrics.clone();
    let app = build_app(state);

    // Corrupt the permeability of the fifth data row.
    let column = COLUMNS.iter().position(|c| *c == PERMEABILITY_MM_HR).unwrap();
    let csv: Vec<String> = synthetic_csv(40, 11)
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 5 {
                let mut cells: Vec<&str> = line.split(',').collect();
                cells[column] = "n/a";
                cells.join(",")
            } else {
                line.to_string()
            }
        })
        .collect();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/dataset")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart_body("samples.csv", csv.join("\n").as_bytes()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let result = body_json(response).await;
    assert_eq!(result["success"], false);
    let message = result["message"].as_str().unwrap();
    assert!(message.contains(PERMEABILITY_MM_HR), "{message}");
    assert!(message.contains("row 5"), "{message}");

    assert!(registry.is_empty());
    assert_eq!(metrics.prediction_errors_total.with_label_values(&["upload"]).get(), 1);
}

#[tokio::test]
async fn test_unreadable_json_uses_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let state = create_test_app_state(dir.path());
    let metrics = state.metrics.clone();
    let app = build_app(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);

    let response = app
        .clone()
        .oneshot(json_post("/api/v1/predict", &json!({ NAOH_MOLARITY: "ten" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["success"], false);

    // A misspelled key is not silently replaced by its default.
    let response = app
        .oneshot(json_post("/api/v1/predict/clogging", &json!({ "NaOH_molarity": 14.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let result = body_json(response).await;
    assert!(result["message"].as_str().unwrap().contains("NaOH_molarity"));

    assert_eq!(metrics.prediction_errors_total.with_label_values(&["validation"]).get(), 3);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(create_trained_app_state(dir.path()).await);

    let body = serde_json::to_value(MixDesign::default()).unwrap();
    app.clone().oneshot(json_post("/api/v1/predict", &body)).await.unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("gpc_predictions_total{target=\"porosity\"} 1"));
    assert!(text.contains("gpc_prediction_seconds"));
}
