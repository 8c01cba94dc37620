//! Per-completion performance metrics.
//!
//! Time-to-first-token is measured locally; token counts and throughput are
//! taken verbatim from the engine's end-of-completion summary because the
//! engine tokenizes internally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Timing summary reported by the engine when a completion ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Number of tokens the engine predicted.
    pub predicted_n: u64,
    /// Engine-measured prediction throughput.
    pub predicted_per_second: f64,
}

/// Measurements attached to an assistant message.
///
/// Created once when a completion finishes and never mutated afterwards.
/// A `time_to_first_token_ms` of `0.0` means "unmeasured", not "instant".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub time_to_first_token_ms: f64,
    pub completion_tokens: u64,
    pub tokens_per_second: f64,
}

impl ModelMetrics {
    /// Returns `true` when no first token was observed.
    pub fn is_ttft_unmeasured(&self) -> bool {
        self.time_to_first_token_ms == 0.0
    }
}

impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tokens: {} • TTFT: {}ms • {} tok/sec",
            self.completion_tokens,
            self.time_to_first_token_ms.round() as i64,
            self.tokens_per_second.round() as i64
        )
    }
}

/// Computes metrics from a completion's timing samples.
///
/// Pure and infallible: missing samples degrade to zero values.
pub fn compute_metrics(
    started_at: Instant,
    first_token_at: Option<Instant>,
    summary: Option<&TimingSummary>,
) -> ModelMetrics {
    let time_to_first_token_ms = first_token_at
        .map(|at| duration_ms(at.saturating_duration_since(started_at)))
        .unwrap_or(0.0);
    let summary = summary.copied().unwrap_or_default();

    ModelMetrics {
        time_to_first_token_ms,
        completion_tokens: summary.predicted_n,
        tokens_per_second: finite_or_zero(summary.predicted_per_second),
    }
}

/// Accumulates token-arrival samples for a single completion.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    started_at: Instant,
    first_token_at: Option<Instant>,
    tokens_seen: u64,
}

impl MetricsCollector {
    /// Starts collecting at the current instant.
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started_at: Instant) -> Self {
        Self {
            started_at,
            first_token_at: None,
            tokens_seen: 0,
        }
    }

    /// Records a token arrival. Returns `true` for the first token.
    pub fn record_token(&mut self, at: Instant) -> bool {
        self.tokens_seen += 1;
        if self.first_token_at.is_none() {
            self.first_token_at = Some(at);
            true
        } else {
            false
        }
    }

    /// Number of token events observed locally.
    pub fn tokens_seen(&self) -> u64 {
        self.tokens_seen
    }

    pub fn time_to_first_token(&self) -> Option<Duration> {
        self.first_token_at
            .map(|at| at.saturating_duration_since(self.started_at))
    }

    /// Produces the final metrics from the engine summary.
    pub fn finish(&self, summary: Option<&TimingSummary>) -> ModelMetrics {
        compute_metrics(self.started_at, self.first_token_at, summary)
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tokens_means_unmeasured_ttft() {
        let collector = MetricsCollector::start();
        let summary = TimingSummary {
            predicted_n: 0,
            predicted_per_second: 0.0,
        };
        let metrics = collector.finish(Some(&summary));

        assert_eq!(metrics.time_to_first_token_ms, 0.0);
        assert!(metrics.is_ttft_unmeasured());
        assert_eq!(collector.time_to_first_token(), None);
    }

    #[test]
    fn test_counts_mirror_engine_summary() {
        let start = Instant::now();
        let mut collector = MetricsCollector::started_at(start);
        assert!(collector.record_token(start + Duration::from_millis(120)));
        assert!(!collector.record_token(start + Duration::from_millis(150)));
        assert!(!collector.record_token(start + Duration::from_millis(180)));

        // Engine counts differ from local token events; the engine wins.
        let summary = TimingSummary {
            predicted_n: 7,
            predicted_per_second: 42.5,
        };
        let metrics = collector.finish(Some(&summary));

        assert_eq!(collector.tokens_seen(), 3);
        assert_eq!(metrics.completion_tokens, 7);
        assert_eq!(metrics.tokens_per_second, 42.5);
        assert!((metrics.time_to_first_token_ms - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_summary_degrades_to_zero() {
        let metrics = compute_metrics(Instant::now(), None, None);
        assert_eq!(metrics, ModelMetrics::default());
    }

    #[test]
    fn test_non_finite_throughput_is_zeroed() {
        let summary = TimingSummary {
            predicted_n: 3,
            predicted_per_second: f64::NAN,
        };
        let metrics = compute_metrics(Instant::now(), None, Some(&summary));
        assert_eq!(metrics.tokens_per_second, 0.0);
        assert_eq!(metrics.completion_tokens, 3);
    }

    #[test]
    fn test_display_matches_footer_format() {
        let metrics = ModelMetrics {
            time_to_first_token_ms: 212.6,
            completion_tokens: 48,
            tokens_per_second: 17.4,
        };
        assert_eq!(metrics.to_string(), "Tokens: 48 • TTFT: 213ms • 17 tok/sec");
    }
}
