//! Process-level counters exposed at `GET /metrics` in Prometheus text
//! exposition format (§6: "requests handled, per-status counts, per-breaker
//! trip counts").

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use leadfit_core::{CircuitBreakerStatus, CrmUpdateStatus, EnrichmentStatus};

const METRIC_PREFIX: &str = "leadfit";

/// Plain monotonic counters, one field per dimension the spec names. A
/// `DashMap`-of-atomics would generalize this to an arbitrary label set,
/// but the status/CRM-outcome vocabularies are both small and fixed
/// (§3, §4.4), so named fields keep the renderer trivial to read.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    status_pending: AtomicU64,
    status_success: AtomicU64,
    status_partial: AtomicU64,
    status_failed: AtomicU64,
    status_completed: AtomicU64,
    status_no_data: AtomicU64,
    crm_skipped: AtomicU64,
    crm_success: AtomicU64,
    crm_failed: AtomicU64,
    unauthorized_total: AtomicU64,
    validation_rejected_total: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enrichment(&self, status: EnrichmentStatus, crm_status: CrmUpdateStatus) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let status_counter = match status {
            EnrichmentStatus::Pending => &self.status_pending,
            EnrichmentStatus::Success => &self.status_success,
            EnrichmentStatus::Partial => &self.status_partial,
            EnrichmentStatus::Failed => &self.status_failed,
            EnrichmentStatus::Completed => &self.status_completed,
            EnrichmentStatus::NoData => &self.status_no_data,
        };
        status_counter.fetch_add(1, Ordering::Relaxed);

        let crm_counter = match crm_status {
            CrmUpdateStatus::Skipped => &self.crm_skipped,
            CrmUpdateStatus::Success => &self.crm_success,
            CrmUpdateStatus::Failed => &self.crm_failed,
        };
        crm_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.unauthorized_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_rejected(&self) {
        self.validation_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all counters plus the given breaker snapshots as Prometheus
    /// text exposition format (content type `text/plain; version=0.0.4`).
    #[must_use]
    pub fn render(&self, breakers: &[CircuitBreakerStatus]) -> String {
        let mut buf = String::with_capacity(2048);

        write_counter(
            &mut buf,
            "requests_total",
            "Total number of /enrich requests that reached the orchestrator.",
            self.requests_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut buf,
            "requests_unauthorized_total",
            "Requests rejected for a missing or invalid X-Api-Key header.",
            self.unauthorized_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut buf,
            "requests_validation_rejected_total",
            "Requests rejected for a malformed body or invalid identity.",
            self.validation_rejected_total.load(Ordering::Relaxed),
        );

        write_status_counter_header(&mut buf);
        write_status_counter(&mut buf, "pending", self.status_pending.load(Ordering::Relaxed));
        write_status_counter(&mut buf, "success", self.status_success.load(Ordering::Relaxed));
        write_status_counter(&mut buf, "partial", self.status_partial.load(Ordering::Relaxed));
        write_status_counter(&mut buf, "failed", self.status_failed.load(Ordering::Relaxed));
        write_status_counter(&mut buf, "completed", self.status_completed.load(Ordering::Relaxed));
        write_status_counter(&mut buf, "no_data", self.status_no_data.load(Ordering::Relaxed));

        write_crm_counter_header(&mut buf);
        write_crm_counter(&mut buf, "skipped", self.crm_skipped.load(Ordering::Relaxed));
        write_crm_counter(&mut buf, "success", self.crm_success.load(Ordering::Relaxed));
        write_crm_counter(&mut buf, "failed", self.crm_failed.load(Ordering::Relaxed));

        write_breaker_gauge_header(&mut buf);
        for breaker in breakers {
            writeln!(
                buf,
                "{METRIC_PREFIX}_circuit_breaker_open{{source=\"{}\"}} {}",
                escape_label(&breaker.source),
                u8::from(breaker.state == "open")
            )
            .expect("writing to String cannot fail");
        }

        write_trip_counter_header(&mut buf);
        for breaker in breakers {
            writeln!(
                buf,
                "{METRIC_PREFIX}_circuit_breaker_trips_total{{source=\"{}\"}} {}",
                escape_label(&breaker.source),
                breaker.trip_count
            )
            .expect("writing to String cannot fail");
        }

        buf
    }
}

fn write_counter(buf: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(buf, "# HELP {METRIC_PREFIX}_{name} {help}");
    let _ = writeln!(buf, "# TYPE {METRIC_PREFIX}_{name} counter");
    let _ = writeln!(buf, "{METRIC_PREFIX}_{name} {value}");
    buf.push('\n');
}

fn write_status_counter_header(buf: &mut String) {
    let _ = writeln!(
        buf,
        "# HELP {METRIC_PREFIX}_enrichments_total Terminal enrichment status counts (§3)."
    );
    let _ = writeln!(buf, "# TYPE {METRIC_PREFIX}_enrichments_total counter");
}

fn write_status_counter(buf: &mut String, status: &str, value: u64) {
    let _ = writeln!(buf, "{METRIC_PREFIX}_enrichments_total{{status=\"{status}\"}} {value}");
}

fn write_crm_counter_header(buf: &mut String) {
    buf.push('\n');
    let _ = writeln!(
        buf,
        "# HELP {METRIC_PREFIX}_crm_updates_total CRM write outcomes (§4.4 step 5)."
    );
    let _ = writeln!(buf, "# TYPE {METRIC_PREFIX}_crm_updates_total counter");
}

fn write_crm_counter(buf: &mut String, outcome: &str, value: u64) {
    let _ = writeln!(buf, "{METRIC_PREFIX}_crm_updates_total{{outcome=\"{outcome}\"}} {value}");
}

fn write_breaker_gauge_header(buf: &mut String) {
    buf.push('\n');
    let _ = writeln!(
        buf,
        "# HELP {METRIC_PREFIX}_circuit_breaker_open Whether a source's circuit breaker is currently open (1) or not (0)."
    );
    let _ = writeln!(buf, "# TYPE {METRIC_PREFIX}_circuit_breaker_open gauge");
}

fn write_trip_counter_header(buf: &mut String) {
    buf.push('\n');
    let _ = writeln!(
        buf,
        "# HELP {METRIC_PREFIX}_circuit_breaker_trips_total Total Closed/HalfOpen -> Open transitions per source."
    );
    let _ = writeln!(buf, "# TYPE {METRIC_PREFIX}_circuit_breaker_trips_total counter");
}

/// Escape backslash, double-quote and newline per the Prometheus text
/// exposition format's label-value grammar. Source names are fixed,
/// internally-defined strings ("places"/"company"/"webtech"), never user
/// input, but this keeps the renderer correct if that ever changes.
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_zeroed_counters_before_any_request() {
        let metrics = Metrics::new();
        let text = metrics.render(&[]);
        assert!(text.contains("leadfit_requests_total 0"));
        assert!(text.contains(r#"leadfit_enrichments_total{status="completed"} 0"#));
    }

    #[test]
    fn record_enrichment_increments_matching_counters() {
        let metrics = Metrics::new();
        metrics.record_enrichment(EnrichmentStatus::Completed, CrmUpdateStatus::Success);
        let text = metrics.render(&[]);
        assert!(text.contains("leadfit_requests_total 1"));
        assert!(text.contains(r#"leadfit_enrichments_total{status="completed"} 1"#));
        assert!(text.contains(r#"leadfit_crm_updates_total{outcome="success"} 1"#));
    }

    #[test]
    fn render_includes_breaker_gauges_and_trip_counts() {
        let metrics = Metrics::new();
        let breakers = vec![CircuitBreakerStatus {
            source: "places".into(),
            state: "open".into(),
            failure_count_in_window: 5,
            trip_count: 2,
        }];
        let text = metrics.render(&breakers);
        assert!(text.contains(r#"leadfit_circuit_breaker_open{source="places"} 1"#));
        assert!(text.contains(r#"leadfit_circuit_breaker_trips_total{source="places"} 2"#));
    }

    #[test]
    fn escape_label_handles_special_characters() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
