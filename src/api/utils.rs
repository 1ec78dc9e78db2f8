//! API utility functions
//!
//! Pure helpers for HTTP request processing, kept out of the handlers so they
//! can be unit tested.

use axum::http::HeaderMap;

pub const ACTOR_HEADER: &str = "X-Leadflow-Actor";
pub const DEFAULT_ACTOR: &str = "admin";

/// Acting admin recorded in history and progress entries.
///
/// Falls back to [`DEFAULT_ACTOR`] when the header is absent, blank, or not
/// valid UTF-8.
pub fn actor_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}
