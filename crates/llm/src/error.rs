//! Mapping from HTTP transport failures and status codes to [`LlmError`].

use std::time::Duration;

use pipeline::LlmError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::wire::ErrorEnvelope;

/// Longest slice of a raw error body quoted in an error message.
const MAX_QUOTED_BODY: usize = 512;

/// Classifies a `reqwest` failure, keeping it as the error source.
pub(crate) fn from_transport(err: reqwest::Error) -> LlmError {
    if err.is_builder() {
        return LlmError::configuration(format!("could not build request: {err}"));
    }
    if err.is_redirect() {
        return LlmError::invalid_request(format!("endpoint redirected too often: {err}"));
    }
    if let Some(status) = err.status() {
        return LlmError::Provider {
            status: status.as_u16(),
            message: err.to_string(),
        };
    }
    if err.is_timeout() {
        return LlmError::TimedOut {
            message: err.to_string(),
            source: Some(Box::new(err)),
        };
    }
    if err.is_decode() {
        return LlmError::malformed("response body is not valid JSON", Some(Box::new(err)));
    }
    LlmError::ConnectionFailed {
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}

/// Classifies a non-success response.
pub(crate) fn from_status(status: StatusCode, headers: &HeaderMap, body: &str) -> LlmError {
    let message = error_message(status, body);
    match status.as_u16() {
        429 => LlmError::RateLimited {
            message,
            retry_after: retry_after(headers),
        },
        408 => LlmError::TimedOut {
            message,
            source: None,
        },
        401 | 403 => LlmError::Authentication { message },
        400 | 404 | 422 => LlmError::InvalidRequest { message },
        code => LlmError::Provider {
            status: code,
            message,
        },
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return match envelope.error.code {
            Some(code) if !code.is_null() => {
                let code = code.as_str().map_or_else(|| code.to_string(), str::to_string);
                format!("{code}: {}", envelope.error.message)
            }
            _ => envelope.error.message,
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status.canonical_reason().unwrap_or("no response body").to_string();
    }
    let mut end = trimmed.len().min(MAX_QUOTED_BODY);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Reads `retry-after-ms` or `retry-after` (whole seconds).
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    read("retry-after-ms")
        .map(|ms| ms / 1000.0)
        .or_else(|| read("retry-after"))
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
