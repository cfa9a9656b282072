//! Shared Key string-to-sign construction and HMAC-SHA256 signing (§4.1).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{codes, Error, Result};
use crate::request::Request;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters the Queue string-to-sign includes, in the order they
/// must be emitted once sorted lexicographically among themselves.
const QUEUE_SUPPORTED_QUERY: &[&str] = &[
    "comp",
    "include",
    "marker",
    "maxresults",
    "messagettl",
    "numofmessages",
    "peekonly",
    "popreceipt",
    "prefix",
    "timeout",
    "visibilitytimeout",
];

/// Queue canonicalization (§4.1).
pub fn string_to_sign_queue(request: &Request, account: &str) -> String {
    let content_length = match request.header("content-length") {
        Some("0") | None => "",
        Some(len) => len,
    };

    let head = [
        request.method.as_str(),
        request.header("content-encoding").unwrap_or(""),
        request.header("content-language").unwrap_or(""),
        content_length,
        request.header("content-md5").unwrap_or(""),
        request.header("content-type").unwrap_or(""),
        "", // Date: always empty, replaced by x-ms-date below
        request.header("if-modified-since").unwrap_or(""),
        request.header("if-match").unwrap_or(""),
        request.header("if-none-match").unwrap_or(""),
        request.header("if-unmodified-since").unwrap_or(""),
        request.header("range").unwrap_or(""),
    ]
    .join("\n");

    let canonicalized_headers = canonicalized_ms_headers(request);
    let canonicalized_resource = canonicalized_resource(request, account, QUEUE_SUPPORTED_QUERY);

    format!("{head}\n{canonicalized_headers}{canonicalized_resource}")
}

/// Table canonicalization (§4.1): shorter string-to-sign, `comp` only.
pub fn string_to_sign_table(request: &Request, account: &str) -> String {
    let head = [
        request.method.as_str(),
        request.header("content-md5").unwrap_or(""),
        request.header("content-type").unwrap_or(""),
        request.header("x-ms-date").unwrap_or(""),
    ]
    .join("\n");

    let mut resource = format!("/{account}{}", request.path);
    if let Some(comp) = request.query.get("comp") {
        resource.push_str("?comp=");
        resource.push_str(comp);
    }

    format!("{head}\n{resource}")
}

/// Every present `x-ms-*` header, lexicographically sorted, one per line as
/// `name:value`, each line trailing a newline (§4.1). The presorted
/// fast path the teacher's validator takes is a performance optimization
/// only (§9); this always takes the general path.
fn canonicalized_ms_headers(request: &Request) -> String {
    let mut ms_headers: Vec<(&str, &str)> = request
        .headers
        .iter()
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (name, value) in ms_headers {
        out.push_str(name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out
}

fn canonicalized_resource(request: &Request, account: &str, supported: &[&str]) -> String {
    let mut resource = format!("/{account}{}", request.path);
    for (key, value) in &request.query {
        if supported.contains(&key.as_str()) {
            resource.push('\n');
            resource.push_str(key);
            resource.push(':');
            resource.push_str(value);
        }
    }
    resource
}

/// HMAC-SHA256 over `string_to_sign` using the base64-decoded shared key,
/// output base64-encoded.
pub fn sign(string_to_sign: &str, key: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::new(codes::INTERNAL_ERROR, format!("invalid account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Decodes a base64 account key as given in [`crate::config::Credentials`].
pub fn decode_key(base64_key: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(base64_key)
        .map_err(|e| Error::usage(format!("accessKey is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    #[test]
    fn queue_signing_matches_known_vector() {
        let request = Request::new(http::Method::GET, "/")
            .with_query("comp", "list")
            .with_header("x-ms-date", "Fri, 01 Jan 2021 00:00:00 GMT")
            .with_header("x-ms-version", "2014-02-14")
            .with_header("x-ms-client-request-id", "abc");

        let sts = string_to_sign_queue(&request, "jungle");
        let key = decode_key(DEV_KEY).unwrap();
        let signature = sign(&sts, &key).unwrap();

        assert!(sts.starts_with("GET\n\n\n\n\n\n\n\n\n\n\n"));
        assert!(sts.contains("x-ms-client-request-id:abc\n"));
        assert!(sts.contains("x-ms-date:Fri, 01 Jan 2021 00:00:00 GMT\n"));
        assert!(sts.ends_with("/jungle/\ncomp:list"));
        // Precomputed HMAC-SHA256-base64 of the exact string-to-sign above
        // under DEV_KEY; pins the signature itself, not just its inputs.
        assert_eq!(signature, "sxBBN5Pw3rV05UZdyzEgl5dgUqcvATlaD/CC9RcNBqY=");
    }

    #[test]
    fn table_signing_appends_comp_only() {
        let request = Request::new(http::Method::GET, "/Tables")
            .with_query("comp", "list")
            .with_header("x-ms-date", "Fri, 01 Jan 2021 00:00:00 GMT");
        let sts = string_to_sign_table(&request, "jungle");
        assert_eq!(sts, "GET\n\n\nFri, 01 Jan 2021 00:00:00 GMT\n/jungle/Tables?comp=list");
    }

    #[test]
    fn content_length_of_zero_is_rendered_empty() {
        let request = Request::new(http::Method::PUT, "/q").with_header("content-length", "0");
        let sts = string_to_sign_queue(&request, "jungle");
        assert!(sts.starts_with("PUT\n\n\n\n\n\n\n\n\n\n\n"));
    }
}
