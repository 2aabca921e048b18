//! Best-effort internal diagnostics.
//!
//! Failures in user callbacks and ambient-state anomalies are reported
//! through the OpenTelemetry internal-log macros and never affect request
//! processing.

use opentelemetry::trace::SpanContext;
use opentelemetry::{otel_debug, otel_warn};

pub(crate) fn filter_fault() {
    otel_warn!(
        name: "HttpServerListener.FilterFault",
        message = "request filter panicked; the request stays instrumented"
    );
}

pub(crate) fn enrich_fault(phase: &'static str) {
    otel_warn!(
        name: "HttpServerListener.EnrichFault",
        phase = phase,
        message = "enrichment callback panicked; span processing continues"
    );
}

pub(crate) fn ambient_mismatch(expected: &SpanContext, found: &SpanContext) {
    otel_debug!(
        name: "HttpServerListener.AmbientContextMismatch",
        expected_span_id = expected.span_id().to_string(),
        found_span_id = found.span_id().to_string(),
        message = "ambient context no longer references the request span; restoring it for finalization"
    );
}

pub(crate) fn orphan_stop() {
    otel_warn!(
        name: "HttpServerListener.OrphanStop",
        message = "stop notification without a tracked start; no span is fabricated"
    );
}
