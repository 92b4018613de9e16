//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, route
//! matching, and dispatch to the page or upload handlers.

use crate::config::AppState;
use crate::handler::{page, upload};
use crate::http;
use crate::logger;
use crate::logger::AccessLogEntry;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(ToString::to_string);
    let access_log = state.cached_access_log.load(Ordering::Relaxed);

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let is_upload_route = path == "/upload";
    let response = if is_upload_route {
        handle_upload_route(req, remote_addr, &state).await
    } else {
        route_request(&method, &path)
    };

    // The upload handler writes its own receipt/completion lines, so access
    // entries cover the remaining routes only
    if access_log && !is_upload_route {
        let mut entry = AccessLogEntry::new(remote_addr.to_string(), method.to_string(), path);
        entry.query = query;
        entry.status = response.status().as_u16();
        entry.bytes = response.body().size_hint().exact().unwrap_or(0);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route non-upload requests based on path
fn route_request(method: &Method, path: &str) -> Response<Full<Bytes>> {
    match path {
        "/" => serve_upload_page(method),
        _ => http::build_404_response(),
    }
}

/// Serve the upload page for GET/HEAD, reject other methods
fn serve_upload_page(method: &Method) -> Response<Full<Bytes>> {
    match *method {
        Method::GET | Method::HEAD => {
            http::build_html_response(page::get_upload_page(), *method == Method::HEAD)
        }
        Method::OPTIONS => http::build_options_response("GET, HEAD, OPTIONS"),
        _ => {
            logger::log_warning(&format!("Method not allowed on /: {method}"));
            http::build_405_response("GET, HEAD, OPTIONS")
        }
    }
}

/// Dispatch `/upload`: POST streams to disk, everything else is rejected
/// before any file I/O
async fn handle_upload_route<B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    match *req.method() {
        Method::POST => {}
        Method::OPTIONS => return http::build_options_response("POST, OPTIONS"),
        _ => {
            logger::log_warning(&format!("Method not allowed on /upload: {}", req.method()));
            return http::build_405_response("POST, OPTIONS");
        }
    }

    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    let filename = req
        .uri()
        .query()
        .and_then(|q| http::parse_query_param(q, "filename"))
        .map(ToString::to_string);

    upload::handle_upload(remote_addr, filename.as_deref(), req.into_body(), state).await
}

/// Validate Content-Length against the configured limit, if any.
/// Returns Some(413 response) if too large, None otherwise. Bodies of
/// unknown length always pass; streaming keeps their memory use bounded.
fn check_body_size<B>(req: &Request<B>, max_body_size: Option<u64>) -> Option<Response<Full<Bytes>>> {
    let max_body_size = max_body_size?;
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
