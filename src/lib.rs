//! OpenTelemetry span correlation for HTTP server request lifecycles.
//!
//! Many server frameworks surface the life of a request as a pair of
//! ordered notifications, "request started" and "request stopped", rather
//! than as a wrappable handler. This crate turns that event stream
//! into [OpenTelemetry] server spans: one span per instrumented request,
//! parented from the incoming trace context, named after the matched
//! route, classified from the response status code, and defended against
//! the framework's own mutations of the ambient "current span" slot while
//! the request is in flight.
//!
//! The host adapter implements two calls into
//! [`HttpServerListener`]: [`on_start`](HttpServerListener::on_start) with
//! the inbound [`ServerRequest`], and [`on_stop`](HttpServerListener::on_stop)
//! with the outbound [`ServerResponse`] (or `None` when the framework has
//! none to give). Each logical request flow owns one [`AmbientContext`]
//! slot and one [`RequestSpan`] token; both are `Send`, so the flow may
//! resume on a different worker thread between the two notifications.
//!
//! Finished spans reach whatever processors are registered on the
//! [`SdkTracerProvider`](https://docs.rs/opentelemetry_sdk) that issued
//! the listener's tracer; this crate never blocks on them.
//!
//! [OpenTelemetry]: https://opentelemetry.io
//!
//! ## Quickstart
//!
//! ```
//! use http::{uri::Scheme, Method, StatusCode};
//! use opentelemetry::trace::TracerProvider as _;
//! use opentelemetry_instrumentation_http_server::{
//!     AmbientContext, HttpServerListener, ServerRequest, ServerResponse,
//! };
//! use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
//!
//! let exporter = InMemorySpanExporter::default();
//! let provider = SdkTracerProvider::builder()
//!     .with_simple_exporter(exporter.clone())
//!     .build();
//! let listener = HttpServerListener::builder(provider.tracer("http-server")).build();
//!
//! // Driven by the framework's notification transport:
//! let mut ambient = AmbientContext::new();
//! let request = ServerRequest::new(Method::GET, Scheme::HTTP, "localhost", 80, "/index");
//! let mut request_span = listener.on_start(&mut ambient, &request);
//! // ... the request executes ...
//! let response = ServerResponse { status: StatusCode::OK };
//! listener.on_stop(&mut ambient, &mut request_span, Some(&response));
//!
//! assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
//! ```
//!
//! ## Filtering and enrichment
//!
//! Requests can be excluded up front with
//! [`with_filter`](HttpServerListenerBuilder::with_filter), and custom
//! attributes added at either lifecycle phase with
//! [`with_enrich`](HttpServerListenerBuilder::with_enrich). Both callbacks
//! are contained: a panicking filter fails open and a panicking enrichment
//! hook is skipped, each reported through the crate's internal diagnostics
//! instead of unwinding into the framework.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(
    docsrs,
    feature(doc_cfg, doc_auto_cfg),
    deny(rustdoc::broken_intra_doc_links)
)]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]
#![cfg_attr(test, deny(warnings))]

mod context;
mod diagnostics;
mod listener;
mod propagation;
mod request;
mod route;
mod status;

pub use context::AmbientContext;
pub use listener::{EnrichEvent, HttpServerListener, HttpServerListenerBuilder, RequestSpan};
pub use propagation::ContextPropagator;
pub use request::{ServerRequest, ServerResponse};
pub use route::{matched_template, resolve_span_name, RouteData, SubRoute};
pub use status::{span_status_for_grpc_status, span_status_for_http_status, GrpcStatusCode};
