//! Forge transport errors.
//!
//! Status codes map onto typed variants so callers can branch without string
//! matching. Two cases carry pipeline semantics:
//! - [`ForgeError::DiffTooLarge`] triggers the local-git-diff fallback;
//! - [`ForgeError::PermissionDenied`] (an integration-level 403, detected by
//!   the response body's error code) degrades to a configuration warning.
//!   An ambiguous 403 stays [`ForgeError::Forbidden`] and fails loudly.

use thiserror::Error;

pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403) with no recognizable integration error code.
    #[error("forbidden")]
    Forbidden,

    /// Integration-level permission failure (403 with a permission code).
    #[error("integration permission denied: {0}")]
    PermissionDenied(String),

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// The diff/patch endpoint refused to render (HTTP 406 / too large).
    #[error("diff too large for the API")]
    DiffTooLarge,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Any other HTTP status.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network failure without a status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected shape of a provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Operation not supported by this provider.
    #[error("unsupported provider operation")]
    Unsupported,
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ForgeError::Timeout;
        }
        if let Some(status) = e.status() {
            return ForgeError::from_status(status.as_u16(), None);
        }
        ForgeError::Network(e.to_string())
    }
}

impl ForgeError {
    /// Map a status code, consulting the body for permission markers.
    pub fn from_status(code: u16, body: Option<&str>) -> Self {
        match code {
            401 => ForgeError::Unauthorized,
            403 => match body.and_then(permission_marker) {
                Some(msg) => ForgeError::PermissionDenied(msg),
                None => ForgeError::Forbidden,
            },
            404 => ForgeError::NotFound,
            406 | 413 => ForgeError::DiffTooLarge,
            429 => ForgeError::RateLimited {
                retry_after_secs: None,
            },
            500..=599 => ForgeError::Server(code),
            other => ForgeError::HttpStatus(other),
        }
    }

    /// True for failures worth retrying at the codec layer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::Timeout
                | ForgeError::Network(_)
                | ForgeError::Server(_)
                | ForgeError::RateLimited { .. }
        )
    }
}

/// Recognize integration-permission 403 bodies ("Resource not accessible by
/// integration" and friends). Rate-limit 403s never carry these markers.
fn permission_marker(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    const MARKERS: &[&str] = &[
        "resource not accessible by integration",
        "not accessible by personal access token",
        "cannot push to fork",
        "requires write access",
    ];
    MARKERS
        .iter()
        .find(|m| lower.contains(*m))
        .map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_403_is_distinguished_from_rate_limit_403() {
        let perm = ForgeError::from_status(
            403,
            Some(r#"{"message":"Resource not accessible by integration"}"#),
        );
        assert!(matches!(perm, ForgeError::PermissionDenied(_)));

        let ambiguous = ForgeError::from_status(
            403,
            Some(r#"{"message":"API rate limit exceeded for installation"}"#),
        );
        assert!(matches!(ambiguous, ForgeError::Forbidden));
    }

    #[test]
    fn too_large_maps_to_fallback_variant() {
        assert!(matches!(
            ForgeError::from_status(406, None),
            ForgeError::DiffTooLarge
        ));
    }
}
