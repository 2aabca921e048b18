//! The span lifecycle controller driven by the framework's request
//! start/stop notifications.

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use http::uri::Scheme;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanKind, SpanRef, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute;

use crate::context::AmbientContext;
use crate::diagnostics;
use crate::propagation::ContextPropagator;
use crate::request::{ServerRequest, ServerResponse};
use crate::route;
use crate::status;

type Filter = Box<dyn Fn(&ServerRequest) -> bool + Send + Sync>;
type Enrich = Box<dyn Fn(&SpanRef<'_>, &EnrichEvent<'_>) + Send + Sync>;

/// Payload handed to the enrichment hook at each lifecycle phase.
#[derive(Debug)]
pub enum EnrichEvent<'a> {
    /// The request span was just created and made current.
    Start(&'a ServerRequest),
    /// The request finished; the response payload may be absent.
    Stop(Option<&'a ServerResponse>),
}

impl EnrichEvent<'_> {
    fn phase(&self) -> &'static str {
        match self {
            EnrichEvent::Start(_) => "start",
            EnrichEvent::Stop(_) => "stop",
        }
    }
}

/// Correlates a framework's request start/stop notifications with exactly
/// one server span per instrumented request.
///
/// The listener is the stateless half of the correlation: it holds the
/// tracer and the user-supplied configuration, while each request's state
/// travels in the [`RequestSpan`] token returned by [`Self::on_start`].
/// The host adapter owns one [`AmbientContext`] slot per logical request
/// flow and passes it to both notification handlers.
///
/// User callbacks are treated as untrusted with respect to panics: a
/// panicking filter fails open (the request is still instrumented) and a
/// panicking enrichment hook leaves the span untouched; both produce one
/// internal diagnostic event and never unwind into the framework.
pub struct HttpServerListener<T> {
    tracer: T,
    propagator: ContextPropagator,
    filter: Option<Filter>,
    enrich: Option<Enrich>,
}

impl<T> fmt::Debug for HttpServerListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerListener")
            .field("propagator", &self.propagator)
            .field("filter", &self.filter.is_some())
            .field("enrich", &self.enrich.is_some())
            .finish()
    }
}

/// Configuration builder for [`HttpServerListener`].
pub struct HttpServerListenerBuilder<T> {
    tracer: T,
    propagator: ContextPropagator,
    filter: Option<Filter>,
    enrich: Option<Enrich>,
}

impl<T> fmt::Debug for HttpServerListenerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerListenerBuilder")
            .field("propagator", &self.propagator)
            .field("filter", &self.filter.is_some())
            .field("enrich", &self.enrich.is_some())
            .finish()
    }
}

impl<T> HttpServerListenerBuilder<T> {
    /// Replaces the propagator used to extract the upstream trace context
    /// from request headers. Defaults to the W3C TraceContext format.
    pub fn with_propagator<P>(mut self, propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        self.propagator = ContextPropagator::new(propagator);
        self
    }

    /// Sets the predicate deciding whether a request is instrumented at
    /// all. Defaults to instrumenting every request.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ServerRequest) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Sets a hook that may add attributes to the request span at the
    /// start and stop phases. Defaults to a no-op.
    pub fn with_enrich<F>(mut self, enrich: F) -> Self
    where
        F: Fn(&SpanRef<'_>, &EnrichEvent<'_>) + Send + Sync + 'static,
    {
        self.enrich = Some(Box::new(enrich));
        self
    }

    /// Builds the listener.
    pub fn build(self) -> HttpServerListener<T> {
        HttpServerListener {
            tracer: self.tracer,
            propagator: self.propagator,
            filter: self.filter,
            enrich: self.enrich,
        }
    }
}

/// Per-request correlation token returned by
/// [`HttpServerListener::on_start`].
///
/// The token is `Send` and travels with the request through the framework,
/// which may resume the flow on a different worker thread before handing
/// the token back to [`HttpServerListener::on_stop`].
#[derive(Debug, Default)]
pub struct RequestSpan {
    state: State,
}

#[derive(Debug, Default)]
enum State {
    /// No start notification was observed for this request.
    #[default]
    Pending,
    /// The user filter excluded the request from instrumentation.
    Filtered,
    /// The span is live.
    Started(Box<ActiveRequest>),
    /// The span was finalized and handed to the export pipeline.
    Ended,
}

#[derive(Debug)]
struct ActiveRequest {
    cx: Context,
    /// Ambient value displaced at start time, restored after finalization.
    prior: Context,
    snapshot: RequestSnapshot,
}

/// Request facets resolved into span attributes at stop time. Captured at
/// start because the stop notification only carries the response.
#[derive(Debug)]
struct RequestSnapshot {
    method: http::Method,
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
    user_agent: Option<String>,
    route_template: Option<String>,
}

impl RequestSnapshot {
    fn capture(request: &ServerRequest) -> Self {
        RequestSnapshot {
            method: request.method.clone(),
            scheme: request.scheme.clone(),
            host: request.host.clone(),
            port: request.port,
            path: request.path.clone(),
            query: request.query.clone(),
            user_agent: request.user_agent().map(str::to_owned),
            route_template: route::matched_template(request.route.as_ref()),
        }
    }

    fn is_default_port(&self) -> bool {
        (self.scheme == Scheme::HTTP && self.port == 80)
            || (self.scheme == Scheme::HTTPS && self.port == 443)
    }

    /// Renders the full request URL, omitting the port exactly when the
    /// scheme/port pair is the scheme's default.
    fn full_url(&self) -> String {
        let mut url = if self.is_default_port() {
            format!("{}://{}{}", self.scheme.as_str(), self.host, self.path)
        } else {
            format!(
                "{}://{}:{}{}",
                self.scheme.as_str(),
                self.host,
                self.port,
                self.path
            )
        };
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new(attribute::HTTP_REQUEST_METHOD, self.method.as_str().to_owned()),
            KeyValue::new(attribute::URL_FULL, self.full_url()),
            KeyValue::new(attribute::URL_SCHEME, self.scheme.as_str().to_owned()),
            KeyValue::new(attribute::URL_PATH, self.path.clone()),
            KeyValue::new(attribute::SERVER_ADDRESS, self.host.clone()),
        ];
        if !matches!(self.port, 80 | 443) {
            attributes.push(KeyValue::new(attribute::SERVER_PORT, i64::from(self.port)));
        }
        if let Some(query) = &self.query {
            attributes.push(KeyValue::new(attribute::URL_QUERY, query.clone()));
        }
        if let Some(user_agent) = &self.user_agent {
            attributes.push(KeyValue::new(
                attribute::USER_AGENT_ORIGINAL,
                user_agent.clone(),
            ));
        }
        if let Some(template) = &self.route_template {
            attributes.push(KeyValue::new(attribute::HTTP_ROUTE, template.clone()));
        }
        attributes
    }
}

impl RequestSpan {
    /// A token for a request whose start notification was never observed,
    /// e.g. because the listener attached mid-request. Stopping it is
    /// reported and ignored; no span is fabricated.
    pub fn detached() -> Self {
        RequestSpan::default()
    }

    /// Whether the user filter excluded this request from instrumentation.
    pub fn is_filtered(&self) -> bool {
        matches!(self.state, State::Filtered)
    }

    /// Whether the span was finalized and handed off.
    pub fn is_ended(&self) -> bool {
        matches!(self.state, State::Ended)
    }

    /// The context carrying the live request span, while the request is in
    /// flight. Nested code can reach the span through
    /// [`TraceContextExt::span`].
    pub fn context(&self) -> Option<&Context> {
        match &self.state {
            State::Started(active) => Some(&active.cx),
            _ => None,
        }
    }
}

impl<T> HttpServerListener<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// Starts configuring a listener that creates spans from `tracer`.
    pub fn builder(tracer: T) -> HttpServerListenerBuilder<T> {
        HttpServerListenerBuilder {
            tracer,
            propagator: ContextPropagator::default(),
            filter: None,
            enrich: None,
        }
    }

    /// Handles the framework's request-start notification.
    ///
    /// Evaluates the filter, extracts the upstream context, creates the
    /// server span under it and swaps it into the ambient slot. The
    /// returned token must be handed back to [`Self::on_stop`] when the
    /// request finishes.
    pub fn on_start(&self, ambient: &mut AmbientContext, request: &ServerRequest) -> RequestSpan {
        if !self.passes_filter(request) {
            return RequestSpan {
                state: State::Filtered,
            };
        }

        let parent_cx = self.propagator.extract(&request.headers);
        let name = route::resolve_span_name(request.route.as_ref(), &request.path);
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .start_with_context(&self.tracer, &parent_cx);
        let cx = parent_cx.with_span(span);
        let prior = ambient.swap(cx.clone());

        self.enrich(&cx, &EnrichEvent::Start(request));

        RequestSpan {
            state: State::Started(Box::new(ActiveRequest {
                snapshot: RequestSnapshot::capture(request),
                prior,
                cx,
            })),
        }
    }

    /// Handles the framework's request-stop notification.
    ///
    /// Filtered requests and repeated stops are ignored; a stop for a
    /// request with no observed start is reported and ignored. For a live
    /// request the span's final attributes and status are resolved, the
    /// enrichment hook runs, the span is ended exactly once, and the
    /// ambient slot reverts to the value the framework expects.
    pub fn on_stop(
        &self,
        ambient: &mut AmbientContext,
        request_span: &mut RequestSpan,
        response: Option<&ServerResponse>,
    ) {
        match mem::take(&mut request_span.state) {
            State::Started(active) => {
                request_span.state = State::Ended;
                self.finish(ambient, *active, response);
            }
            State::Pending => diagnostics::orphan_stop(),
            state => request_span.state = state,
        }
    }

    fn finish(
        &self,
        ambient: &mut AmbientContext,
        active: ActiveRequest,
        response: Option<&ServerResponse>,
    ) {
        let ActiveRequest {
            cx,
            prior,
            snapshot,
        } = active;
        let span = cx.span();

        // The framework may have replaced the ambient context while the
        // request was in flight. Its value wins for completion, but the
        // request span must be current while attributes are finalized.
        let overwritten = {
            let ambient_span = ambient.context().span();
            ambient_span.span_context() != span.span_context()
        };
        let framework_cx = if overwritten {
            let found = ambient.swap(cx.clone());
            {
                let found_span = found.span();
                diagnostics::ambient_mismatch(span.span_context(), found_span.span_context());
            }
            Some(found)
        } else {
            None
        };

        span.set_attributes(snapshot.attributes());
        if let Some(response) = response {
            let code = i32::from(response.status.as_u16());
            span.set_attribute(KeyValue::new(
                attribute::HTTP_RESPONSE_STATUS_CODE,
                i64::from(code),
            ));
            span.set_status(match status::span_status_for_http_status(code) {
                Status::Error { .. } => {
                    Status::error(response.status.canonical_reason().unwrap_or_default())
                }
                resolved => resolved,
            });
        }

        self.enrich(&cx, &EnrichEvent::Stop(response));
        span.end();

        ambient.swap(framework_cx.unwrap_or(prior));
    }

    fn passes_filter(&self, request: &ServerRequest) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| filter(request))) {
            Ok(decision) => decision,
            Err(_) => {
                diagnostics::filter_fault();
                true
            }
        }
    }

    fn enrich(&self, cx: &Context, event: &EnrichEvent<'_>) {
        let Some(enrich) = &self.enrich else {
            return;
        };
        let span = cx.span();
        if panic::catch_unwind(AssertUnwindSafe(|| enrich(&span, event))).is_err() {
            diagnostics::enrich_fault(event.phase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    fn test_pipeline() -> (InMemorySpanExporter, SdkTracerProvider) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (exporter, provider)
    }

    fn request() -> ServerRequest {
        ServerRequest::new(Method::GET, Scheme::HTTP, "localhost", 80, "/api/value")
    }

    fn response() -> ServerResponse {
        ServerResponse {
            status: StatusCode::OK,
        }
    }

    #[test]
    fn detached_token_stop_is_ignored() {
        let (exporter, provider) = test_pipeline();
        let listener = HttpServerListener::builder(provider.tracer("test")).build();
        let mut ambient = AmbientContext::new();

        let mut orphan = RequestSpan::detached();
        listener.on_stop(&mut ambient, &mut orphan, Some(&response()));

        assert!(!orphan.is_ended());
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn duplicate_stop_exports_exactly_one_span() {
        let (exporter, provider) = test_pipeline();
        let listener = HttpServerListener::builder(provider.tracer("test")).build();
        let mut ambient = AmbientContext::new();

        let mut request_span = listener.on_start(&mut ambient, &request());
        listener.on_stop(&mut ambient, &mut request_span, Some(&response()));
        assert!(request_span.is_ended());
        listener.on_stop(&mut ambient, &mut request_span, Some(&response()));

        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn filtered_request_leaves_ambient_untouched() {
        let (exporter, provider) = test_pipeline();
        let listener = HttpServerListener::builder(provider.tracer("test"))
            .with_filter(|request| request.path != "/api/value")
            .build();
        let mut ambient = AmbientContext::new();

        let mut request_span = listener.on_start(&mut ambient, &request());

        assert!(request_span.is_filtered());
        assert!(request_span.context().is_none());
        assert!(!ambient.context().has_active_span());

        listener.on_stop(&mut ambient, &mut request_span, Some(&response()));
        assert!(!request_span.is_ended());
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn live_request_token_exposes_the_span_context() {
        let (_exporter, provider) = test_pipeline();
        let listener = HttpServerListener::builder(provider.tracer("test")).build();
        let mut ambient = AmbientContext::new();

        let mut request_span = listener.on_start(&mut ambient, &request());

        {
            let cx = request_span.context().expect("span is live");
            let span = cx.span();
            assert!(span.span_context().is_valid());
            let ambient_span = ambient.context().span();
            assert_eq!(ambient_span.span_context(), span.span_context());
        }

        listener.on_stop(&mut ambient, &mut request_span, Some(&response()));
        assert!(request_span.context().is_none());
    }
}
