// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared reqwest plumbing.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use parley_core::error::ParleyError;

/// Builds a client with JSON content type and the given extra headers.
pub(crate) fn build_client(
    extra_headers: &[(&'static str, Option<&str>)],
    timeout: Duration,
) -> Result<reqwest::Client, ParleyError> {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    for &(name, value) in extra_headers {
        let Some(value) = value else { continue };
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| ParleyError::Config(format!("invalid {name} header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(name), value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| ParleyError::Config(format!("failed to build HTTP client: {e}")))
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
pub(crate) fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
