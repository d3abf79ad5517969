//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Outcome label of a compaction run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    Noop,
    Summarized,
    Error,
}

impl CompactionOutcome {
    fn as_label(&self) -> &'static str {
        match self {
            CompactionOutcome::Noop => "noop",
            CompactionOutcome::Summarized => "summarized",
            CompactionOutcome::Error => "error",
        }
    }
}

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    pub compaction_runs: CounterVec,
    pub summarized_messages: Counter,
    pub budget_exceeded: Counter,
    pub tokens_scanned: Histogram,
    pub summarizer_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let compaction_runs = register_counter_vec_with_registry!(
            Opts::new("compaction_runs_total", "Total compaction calls by outcome"),
            &["outcome"],
            registry
        )?;

        let summarized_messages = register_counter_with_registry!(
            Opts::new("summarized_messages_total", "Total messages folded into summaries"),
            registry
        )?;

        let budget_exceeded = register_counter_with_registry!(
            Opts::new("budget_exceeded_total", "Total compactions rejected by the token ceiling"),
            registry
        )?;

        let tokens_scanned = register_histogram_with_registry!(
            "compaction_tokens_scanned",
            "Unsummarized tokens counted per compaction",
            registry
        )?;

        let summarizer_duration = register_histogram_vec_with_registry!(
            "summarizer_duration_seconds",
            "Summarizer call duration in seconds",
            &["template"],
            registry
        )?;

        Ok(Self {
            registry,
            compaction_runs,
            summarized_messages,
            budget_exceeded,
            tokens_scanned,
            summarizer_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the end of a compaction call
    pub fn record_compaction(&self, outcome: CompactionOutcome, summarized: usize) {
        self.compaction_runs
            .with_label_values(&[outcome.as_label()])
            .inc();
        if summarized > 0 {
            self.summarized_messages.inc_by(summarized as f64);
        }
    }

    /// Record the tokens counted by a scan
    pub fn record_scan(&self, tokens: usize, exceeded: bool) {
        self.tokens_scanned.observe(tokens as f64);
        if exceeded {
            self.budget_exceeded.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Helper macro to time operations
#[macro_export]
macro_rules! time_operation {
    ($histogram:expr, $label:expr, $operation:expr) => {{
        let timer = $histogram.with_label_values(&[$label]).start_timer();
        let result = $operation;
        timer.observe_duration();
        result
    }};
}
