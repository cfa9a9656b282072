//! Response decoding: the uniform error branch plus per-operation success
//! decoding for Queue (XML) and Table (JSON) bodies (§4.5).

pub mod json;
pub mod xml;

use crate::auth::Service;
use crate::error::{codes, Error};
use crate::transport::Response;

/// Applies the error branch (§4.5) when `response.status` is not 2xx.
/// Returns `Ok(())` for a successful status so callers can chain this before
/// their per-operation success decoding.
pub fn check_success(response: &Response, service: Service) -> Result<(), Error> {
    if response.is_success() {
        return Ok(());
    }
    let err = match service {
        Service::Queue => xml::decode_error(response),
        Service::Table => json::decode_error(response),
    };
    Err(err)
}

/// Fails with `UnexpectedStatusError` unless `response.status` is exactly
/// one of `expected` (§4.5, §7). Call only after [`check_success`].
pub fn expect_status(response: &Response, expected: &[u16]) -> Result<(), Error> {
    if expected.contains(&response.status) {
        Ok(())
    } else {
        Err(Error::unexpected_status(expected, response.status, response.body.clone()))
    }
}

/// Synthesizes the fallback message used whenever a service error body
/// carries no message of its own (§4.5).
pub(crate) fn missing_message(raw: &str) -> String {
    format!("No error message given, in payload '{raw}'")
}

/// Synthesizes the code used when a service error body carries no code at
/// all: `InternalErrorWithoutCode` for 5xx, `ErrorWithoutCode` otherwise.
pub(crate) fn missing_code(status: u16) -> &'static str {
    if (500..600).contains(&status) {
        codes::INTERNAL_ERROR_WITHOUT_CODE
    } else {
        codes::ERROR_WITHOUT_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn response(status: u16, body: &str) -> Response {
        Response { status, headers: BTreeMap::new(), raw_headers: Vec::new(), body: body.to_string() }
    }

    #[test]
    fn expect_status_rejects_unlisted_status() {
        let resp = response(200, "");
        assert!(expect_status(&resp, &[201, 204]).is_err());
    }

    #[test]
    fn missing_code_depends_on_status_range() {
        assert_eq!(missing_code(501), codes::INTERNAL_ERROR_WITHOUT_CODE);
        assert_eq!(missing_code(404), codes::ERROR_WITHOUT_CODE);
    }
}
