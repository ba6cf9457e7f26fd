use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::{backend::BackingService, model::ModelRef};

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub model: ModelRef,
    pub completion: String,
    pub latency_ms: u128,
    pub tokens_generated: Option<u64>,
    pub tokens_per_second: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSample {
    pub model: ModelRef,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateMetrics {
    pub avg_latency_ms: Option<f64>,
    pub avg_tokens_per_second: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub prompt: String,
    pub samples: Vec<SampleReport>,
    pub failures: Vec<FailedSample>,
    pub aggregate: AggregateMetrics,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && !self.samples.is_empty()
    }
}

/// Sends `prompt` to each model in turn and records how each one answered.
pub async fn run_smoke_test<S>(service: &S, models: &[ModelRef], prompt: &str) -> SmokeReport
where
    S: BackingService + ?Sized,
{
    let mut samples = Vec::with_capacity(models.len());
    let mut failures = Vec::new();

    for model in models {
        let start = Instant::now();
        match service.generate(model, prompt).await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis();
                let tokens_per_second = match (response.eval_count, response.eval_duration) {
                    (Some(count), Some(nanos)) if nanos > 0 => {
                        Some(count as f64 / (nanos as f64 / 1e9))
                    }
                    _ => None,
                };
                info!(%model, latency_ms, "model answered");
                samples.push(SampleReport {
                    model: model.clone(),
                    completion: response.response.trim().to_string(),
                    latency_ms,
                    tokens_generated: response.eval_count,
                    tokens_per_second,
                });
            }
            Err(err) => {
                warn!(%model, error = %err, "model failed smoke test");
                failures.push(FailedSample {
                    model: model.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    let aggregate = summarize(&samples);
    SmokeReport {
        prompt: prompt.to_string(),
        samples,
        failures,
        aggregate,
    }
}

fn summarize(samples: &[SampleReport]) -> AggregateMetrics {
    let avg_latency_ms = mean(samples.iter().map(|s| s.latency_ms as f64));
    let avg_tokens_per_second = mean(samples.iter().filter_map(|s| s.tokens_per_second));
    AggregateMetrics {
        avg_latency_ms,
        avg_tokens_per_second,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
