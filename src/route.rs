//! Span display-name resolution from route-match metadata.
//!
//! Routers report a match in one of two shapes: a directly matched route
//! carrying a template string, or a collection of candidate sub-routes
//! (attribute routing). Static files and unmatched requests carry no route
//! data at all, which is a normal case rather than an error.

use std::borrow::Cow;

/// Route metadata attached to a request by the framework's router.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteData {
    /// Template of the directly matched route, e.g.
    /// `{controller}/{action}/{id}`.
    pub template: Option<String>,
    /// Candidate sub-routes produced by attribute routing.
    pub sub_routes: Vec<SubRoute>,
}

/// A single attribute-routing candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubRoute {
    /// The candidate's route template.
    pub template: String,
}

/// Returns the route template for a request, when the router matched one.
///
/// A directly matched template wins; otherwise the first attribute-routing
/// candidate is taken.
pub fn matched_template(route: Option<&RouteData>) -> Option<String> {
    route.and_then(|data| {
        data.template
            .clone()
            .or_else(|| data.sub_routes.first().map(|sub| sub.template.clone()))
    })
}

/// Resolves the span display name for a request: the matched route
/// template verbatim, falling back to the raw request path.
pub fn resolve_span_name(route: Option<&RouteData>, path: &str) -> Cow<'static, str> {
    match matched_template(route) {
        Some(template) => Cow::Owned(template),
        None => Cow::Owned(path.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_template_is_used_verbatim() {
        let route = RouteData {
            template: Some("{controller}/{action}/{id}".to_owned()),
            sub_routes: Vec::new(),
        };

        assert_eq!(
            resolve_span_name(Some(&route), "/Index"),
            "{controller}/{action}/{id}"
        );
    }

    #[test]
    fn first_sub_route_candidate_wins() {
        let route = RouteData {
            template: None,
            sub_routes: vec![
                SubRoute {
                    template: "subroute/{customerId}".to_owned(),
                },
                SubRoute {
                    template: "subroute/other".to_owned(),
                },
            ],
        };

        assert_eq!(
            resolve_span_name(Some(&route), "/subroute/10"),
            "subroute/{customerId}"
        );
    }

    #[test]
    fn direct_template_beats_sub_route_candidates() {
        let route = RouteData {
            template: Some("api/{controller}/{id}".to_owned()),
            sub_routes: vec![SubRoute {
                template: "ignored/{id}".to_owned(),
            }],
        };

        assert_eq!(matched_template(Some(&route)).as_deref(), Some("api/{controller}/{id}"));
    }

    #[test]
    fn empty_route_data_falls_back_to_path() {
        let route = RouteData::default();

        assert_eq!(resolve_span_name(Some(&route), "/api/value"), "/api/value");
    }

    #[test]
    fn absent_route_data_falls_back_to_path() {
        assert_eq!(resolve_span_name(None, "/static/app.js"), "/static/app.js");
    }
}
