//! Request router
//!
//! Maps method and path to a [`Route`]. Parsing is pure so the table can be
//! tested without a listener.

use hyper::Method;

/// Prefix of the upload endpoint; the rest of the path is the file name
pub const UPLOAD_PREFIX: &str = "/api/images/";

/// Routes served by the gallery
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /health
    Health,
    /// GET /metrics
    Metrics,
    /// GET / - mount the page
    Index,
    /// GET /api/gallery - refresh and return the gallery
    Gallery,
    /// PUT /api/images/{name} - upload one file; `name` is still percent-encoded
    Upload { encoded_name: String },
    /// Known path, wrong method
    MethodNotAllowed { allow: &'static str },
    NotFound,
}

impl Route {
    /// Parse an HTTP request line into a route
    pub fn parse(method: &Method, path: &str) -> Route {
        if let Some(encoded_name) = path.strip_prefix(UPLOAD_PREFIX) {
            return if method == Method::PUT {
                Route::Upload {
                    encoded_name: encoded_name.to_string(),
                }
            } else {
                Route::MethodNotAllowed { allow: "PUT" }
            };
        }

        let get_only = |route: Route| {
            if method == Method::GET || method == Method::HEAD {
                route
            } else {
                Route::MethodNotAllowed { allow: "GET" }
            }
        };

        match path {
            "/health" => get_only(Route::Health),
            "/metrics" => get_only(Route::Metrics),
            "/" | "/index.html" => get_only(Route::Index),
            "/api/gallery" => get_only(Route::Gallery),
            _ => Route::NotFound,
        }
    }

    /// Whether the route needs an authenticated caller when auth is enabled
    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Index | Route::Gallery | Route::Upload { .. })
    }

    /// Short name for logs and spans
    pub fn name(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::Metrics => "metrics",
            Route::Index => "index",
            Route::Gallery => "gallery",
            Route::Upload { .. } => "upload",
            Route::MethodNotAllowed { .. } => "method_not_allowed",
            Route::NotFound => "not_found",
        }
    }
}
