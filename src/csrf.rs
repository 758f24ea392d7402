//! Origin validation for browser-facing state-changing endpoints.
//!
//! Heuristic defense: unsafe requests must carry an `Origin` (or, failing
//! that, `Referer`) whose hostname is allow-listed or matches the request
//! `Host`. This is not a token-based CSRF scheme; it relies on browsers
//! sending accurate origin headers. The webhook route never goes through
//! this guard -- gateway deliveries are not browser-originated.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use url::Url;

use crate::db::AppState;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct OriginGuard {
    allowed_hosts: Vec<String>,
}

fn hostname_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// `Host` headers carry an optional port; the allow-list stores bare
/// hostnames.
fn strip_port(host: &str) -> &str {
    host.rsplit_once(':').map_or(host, |(name, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            name
        } else {
            host
        }
    })
}

impl OriginGuard {
    /// Build the allow-list from the configured application origins.
    pub fn new(app_url: &str, production_url: &str) -> Self {
        let mut allowed_hosts: Vec<String> = [app_url, production_url]
            .iter()
            .filter_map(|u| hostname_of(u))
            .collect();
        allowed_hosts.dedup();
        Self { allowed_hosts }
    }

    /// Decide whether a request may proceed.
    ///
    /// Safe methods always pass. For unsafe methods `Origin` wins over
    /// `Referer`; a request carrying neither is rejected.
    pub fn verify(
        &self,
        method: &Method,
        origin: Option<&str>,
        referer: Option<&str>,
        host: Option<&str>,
    ) -> bool {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return true;
        }

        let candidate = origin.or(referer);
        let Some(candidate) = candidate else {
            return false;
        };
        let Some(hostname) = hostname_of(candidate) else {
            return false;
        };

        if self.allowed_hosts.iter().any(|h| *h == hostname) {
            return true;
        }
        host.map(strip_port)
            .is_some_and(|h| h.eq_ignore_ascii_case(&hostname))
    }
}

/// Middleware applying the guard; rejects with 403.
pub async fn origin_guard_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    let referer = headers.get("referer").and_then(|v| v.to_str().ok());
    let host = headers.get("host").and_then(|v| v.to_str().ok());

    if !state
        .origin_guard
        .verify(request.method(), origin, referer, host)
    {
        tracing::warn!(
            origin = origin.unwrap_or("<none>"),
            referer = referer.unwrap_or("<none>"),
            "Rejected cross-origin request"
        );
        return Err(AppError::Forbidden("Cross-origin request denied".into()));
    }

    Ok(next.run(request).await)
}
