//! Extraction of upstream trace context from inbound request headers.

use http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Adapter around a pluggable [`TextMapPropagator`] used to extract the
/// upstream trace context from inbound carrier headers.
///
/// The default propagator speaks the [W3C TraceContext] format; any other
/// propagator, including a
/// [`TextMapCompositePropagator`](opentelemetry::propagation::TextMapCompositePropagator)
/// that additionally carries baggage, can be substituted through
/// [`HttpServerListenerBuilder::with_propagator`](crate::HttpServerListenerBuilder::with_propagator).
///
/// Extraction runs against an empty base context so the parent linkage of
/// the request span is fixed before the span is created. Malformed or
/// missing carrier data yields a context without a remote span and the
/// request span becomes a root span; extraction never fails.
///
/// [W3C TraceContext]: https://www.w3.org/TR/trace-context/
#[derive(Debug)]
pub struct ContextPropagator {
    inner: Box<dyn TextMapPropagator + Send + Sync>,
}

impl ContextPropagator {
    /// Creates an adapter around the given propagator.
    pub fn new<P>(propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        ContextPropagator {
            inner: Box::new(propagator),
        }
    }

    /// Extracts the propagated context from the request headers.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.inner
            .extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }
}

impl Default for ContextPropagator {
    fn default() -> Self {
        ContextPropagator::new(TraceContextPropagator::new())
    }
}
