//! Error types shared across the request pipeline.

use std::collections::HashSet;
use thiserror::Error;

/// Well-known error code strings used for transient-failure classification
/// and for naming errors the way the Azure Storage REST API does (`<code>Error`).
pub mod codes {
    pub const ETIMEDOUT: &str = "ETIMEDOUT";
    pub const ECONNRESET: &str = "ECONNRESET";
    pub const EADDRINUSE: &str = "EADDRINUSE";
    pub const ESOCKETTIMEDOUT: &str = "ESOCKETTIMEDOUT";
    pub const ECONNREFUSED: &str = "ECONNREFUSED";

    pub const REQUEST_TIMEOUT_ERROR: &str = "RequestTimeoutError";
    pub const REQUEST_ABORTED_ERROR: &str = "RequestAbortedError";
    pub const REQUEST_CONTENT_LENGTH_ERROR: &str = "RequestContentLengthError";

    pub const INTERNAL_ERROR: &str = "InternalError";
    pub const SERVER_BUSY: &str = "ServerBusy";
    pub const INTERNAL_ERROR_WITHOUT_CODE: &str = "InternalErrorWithoutCode";
    pub const ERROR_WITHOUT_CODE: &str = "ErrorWithoutCode";

    pub const UNEXPECTED_STATUS_ERROR: &str = "UnexpectedStatusError";
    pub const SAS_REFRESH_ERROR: &str = "SASRefreshError";
    pub const USAGE_ERROR: &str = "UsageError";
}

/// Returns the default set of error codes the retry engine (§4.2) treats as transient.
pub fn default_transient_error_codes() -> HashSet<String> {
    [
        codes::ETIMEDOUT,
        codes::ECONNRESET,
        codes::EADDRINUSE,
        codes::ESOCKETTIMEDOUT,
        codes::ECONNREFUSED,
        codes::REQUEST_TIMEOUT_ERROR,
        codes::REQUEST_ABORTED_ERROR,
        codes::REQUEST_CONTENT_LENGTH_ERROR,
        codes::INTERNAL_ERROR,
        codes::SERVER_BUSY,
        codes::INTERNAL_ERROR_WITHOUT_CODE,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// A single error type for every failure the pipeline can produce.
///
/// `code` is the dimension the retry engine classifies on: it is either a
/// transport errno-style string, a client-synthesized code, or the service's
/// own `odata.error.code` / `Error/Code` value.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub payload: Option<String>,
    pub detail: Option<String>,
    /// Set by the retry engine once the request finally succeeds or gives up.
    pub retries: u32,
}

impl Error {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status_code: None,
            payload: None,
            detail: None,
            retries: 0,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(codes::USAGE_ERROR, message)
    }

    pub fn unexpected_status(expected: &[u16], got: u16, payload: impl Into<String>) -> Self {
        Self::new(
            codes::UNEXPECTED_STATUS_ERROR,
            format!("expected status in {expected:?}, got {got}"),
        )
        .with_status(got)
        .with_payload(payload)
    }

    pub fn sas_refresh(message: impl Into<String>) -> Self {
        Self::new(codes::SAS_REFRESH_ERROR, message)
    }
}

/// Maps an `std::io::ErrorKind` observed on the socket to a transient error code.
pub fn classify_io_error(err: &std::io::Error) -> Error {
    use std::io::ErrorKind::*;
    let code = match err.kind() {
        TimedOut => codes::ETIMEDOUT,
        ConnectionReset => codes::ECONNRESET,
        AddrInUse => codes::EADDRINUSE,
        ConnectionRefused => codes::ECONNREFUSED,
        _ => codes::ECONNRESET,
    };
    Error::new(code, err.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_set_contains_service_reported_codes() {
        let set = default_transient_error_codes();
        assert!(set.contains(codes::INTERNAL_ERROR));
        assert!(set.contains(codes::SERVER_BUSY));
        assert!(set.contains(codes::INTERNAL_ERROR_WITHOUT_CODE));
        assert!(!set.contains(codes::UNEXPECTED_STATUS_ERROR));
    }

    #[test]
    fn builder_methods_set_optional_fields() {
        let err = Error::new("Boom", "bad").with_status(500).with_payload("<x/>").with_retries(3);
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.payload.as_deref(), Some("<x/>"));
        assert_eq!(err.retries, 3);
    }
}
