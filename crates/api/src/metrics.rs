use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Prometheus collectors for the prediction server, on a private registry.
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    pub predictions_total: IntCounterVec,
    pub prediction_errors_total: IntCounterVec,
    pub prediction_seconds: Histogram,
    pub training_runs_total: IntCounter,
}

impl ApiMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let predictions_total = IntCounterVec::new(
            Opts::new("gpc_predictions_total", "Predictions served, by target"),
            &["target"],
        )?;
        let prediction_errors_total = IntCounterVec::new(
            Opts::new("gpc_prediction_errors_total", "Rejected or failed requests, by kind"),
            &["kind"],
        )?;
        let prediction_seconds = Histogram::with_opts(
            HistogramOpts::new("gpc_prediction_seconds", "Time spent inside model inference")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        let training_runs_total =
            IntCounter::new("gpc_training_runs_total", "Completed retraining runs")?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_errors_total.clone()))?;
        registry.register(Box::new(prediction_seconds.clone()))?;
        registry.register(Box::new(training_runs_total.clone()))?;

        Ok(Self {
            registry,
            predictions_total,
            prediction_errors_total,
            prediction_seconds,
            training_runs_total,
        })
    }

    pub fn record_prediction(&self, target: &str) {
        self.predictions_total.with_label_values(&[target]).inc();
    }

    pub fn record_error(&self, kind: &str) {
        self.prediction_errors_total.with_label_values(&[kind]).inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
