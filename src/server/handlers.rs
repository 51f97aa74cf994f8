//! Request handlers
//!
//! # Endpoints
//!
//! * `GET /health` - liveness, returns "ok"
//! * `GET /metrics` - Prometheus text format (when enabled)
//! * `GET /` - mount the page: refresh the gallery and render HTML
//! * `GET /api/gallery` - refresh the gallery and return the view as JSON
//! * `PUT /api/images/{name}` - upload the body as `{name}`
//!
//! Upload responses: `200` with the new view, `204` when no file name was
//! given, `400` when the name does not decode to UTF-8, `409` while another
//! upload is in flight, `413` when the body is over
//! `server.max_upload_bytes`, `502` when storage rejects the upload.

use super::AppState;
use crate::auth::{AuthError, AuthRequest};
use crate::metrics;
use crate::render;
use crate::router::Route;
use crate::session::SessionView;
use crate::upload::{SelectedFile, UploadError, UploadOutcome};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type HttpResponse = Response<Full<Bytes>>;

/// JSON body of a successful upload
#[derive(Debug, Serialize)]
struct UploadResponse<'a> {
    location: &'a str,
    gallery_refreshed: bool,
    view: SessionView,
}

/// JSON body of an error
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

/// Handle one HTTP request
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<HttpResponse, Infallible>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let route = Route::parse(req.method(), req.uri().path());
    debug!(method = %req.method(), path = %req.uri().path(), route = route.name(), "Handling request");

    if route.requires_auth() {
        if let Some(ref authenticator) = state.authenticator {
            let auth_request = AuthRequest::from_parts(&req);
            match authenticator.authenticate(&auth_request).await {
                Ok(result) => debug!(subject = %result.subject, "Authenticated"),
                Err(e) => return Ok(unauthorized(&e, req.uri().path())),
            }
        }
    }

    let response = match route {
        Route::Health => text(StatusCode::OK, "ok"),
        Route::Metrics => metrics_response(&state),
        Route::Index => {
            let view = state.session.mount().await;
            let token = if state.authenticator.is_some() {
                query_token(req.uri().query())
            } else {
                None
            };
            html(render::render_page(&view, token))
        }
        Route::Gallery => {
            // A failed refresh is logged by the gallery; the last good list is returned
            let _ = state.session.refresh_gallery().await;
            json(StatusCode::OK, &state.session.view())
        }
        Route::Upload { encoded_name } => upload(req, &state, &encoded_name).await,
        Route::MethodNotAllowed { allow } => {
            let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
            response
        }
        Route::NotFound => text(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

async fn upload<B>(req: Request<B>, state: &AppState, encoded_name: &str) -> HttpResponse
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max_bytes = state.config.server.max_upload_bytes;

    let declared_len = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > max_bytes) {
        warn!(declared_len, max_bytes, "Upload rejected: body too large");
        return error_json(StatusCode::PAYLOAD_TOO_LARGE, "Upload exceeds size limit");
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = match Limited::new(req.into_body(), max_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(max_bytes, "Upload rejected: body too large");
            return error_json(StatusCode::PAYLOAD_TOO_LARGE, "Upload exceeds size limit");
        }
        Err(e) => {
            error!("Failed to read upload body: {}", e);
            return error_json(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let file = match SelectedFile::from_request(encoded_name, content_type.as_deref(), body) {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "Upload rejected: bad file name");
            return error_json(StatusCode::BAD_REQUEST, "Invalid file name");
        }
    };

    match state.session.submit(file).await {
        Ok(UploadOutcome::Uploaded {
            location,
            gallery_refreshed,
        }) => {
            info!(location = %location, "Upload request completed");
            json(
                StatusCode::OK,
                &UploadResponse {
                    location: &location,
                    gallery_refreshed,
                    view: state.session.view(),
                },
            )
        }
        Ok(UploadOutcome::Skipped) => empty(StatusCode::NO_CONTENT),
        Err(UploadError::AlreadyInFlight) => {
            warn!("Upload rejected: another upload is in flight");
            error_json(StatusCode::CONFLICT, "An upload is already in progress")
        }
        // Already logged by the orchestrator
        Err(UploadError::Storage(_)) => error_json(StatusCode::BAD_GATEWAY, "Upload failed"),
    }
}

fn metrics_response(state: &AppState) -> HttpResponse {
    if !state.config.metrics.enabled {
        return text(StatusCode::NOT_FOUND, "Not Found");
    }

    match metrics::encode_text() {
        Ok((body, content_type)) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

fn unauthorized(error: &AuthError, path: &str) -> HttpResponse {
    let (challenge, message) = match error {
        AuthError::MissingAuth => ("Bearer", "Missing authentication"),
        AuthError::TokenExpired => (
            "Bearer error=\"invalid_token\", error_description=\"Token expired\"",
            "Token expired",
        ),
        _ => ("Bearer error=\"invalid_token\"", "Invalid token"),
    };
    warn!(path, error = %error, "Authentication failed");

    let mut response = text(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}

/// Value of the `token` query parameter
fn query_token(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

fn text(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn html(body: String) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn empty(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn error_json(status: StatusCode, message: &str) -> HttpResponse {
    json(status, &ErrorResponse { error: message })
}
