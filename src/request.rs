//! Logical request descriptor, enriched and then handed to the authorizer.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::ClientOptions;
use crate::date::format_http_date;

/// A request before authorization: method, path, query, headers, optional body.
///
/// Query and header keys are plain strings; headers are expected lowercase
/// per the data model (§3).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: http::Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: BTreeMap::new(), headers: BTreeMap::new(), body: None }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        let len = body.len();
        self.body = Some(body);
        self.with_header("content-length", len.to_string())
    }

    /// Stamps in the headers common to every request (§3): `x-ms-date`,
    /// `x-ms-version`, `x-ms-client-request-id`, and the server-side
    /// `timeout` query parameter.
    pub fn enrich(mut self, options: &ClientOptions) -> Self {
        self.headers.insert("x-ms-date".to_string(), format_http_date(&Utc::now()));
        self.headers.insert("x-ms-version".to_string(), options.version.clone());
        self.headers
            .entry("x-ms-client-request-id".to_string())
            .or_insert_with(|| options.client_id.clone());
        self.query.entry("timeout".to_string()).or_insert_with(|| options.timeout_secs.to_string());
        self
    }

    /// Stamps Table-only headers: `dataserviceversion` and `accept`.
    pub fn enrich_table(mut self, options: &ClientOptions) -> Self {
        self.headers.insert("dataserviceversion".to_string(), options.data_service_version.clone());
        self.headers.insert(
            "accept".to_string(),
            format!("application/json;odata={}", options.metadata.as_str()),
        );
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// Builds the query string, URL-encoding each value, in the order the
    /// keys currently sort (callers that need signing order re-derive it
    /// themselves from `self.query`).
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", k, percent_encoding::utf8_percent_encode(v, crate::auth::QUERY_ENCODE_SET)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_body_sets_content_length() {
        let req = Request::new(http::Method::PUT, "/q").with_body(b"hello".to_vec());
        assert_eq!(req.header("content-length"), Some("5"));
    }

    #[test]
    fn path_and_query_omits_question_mark_when_empty() {
        let req = Request::new(http::Method::GET, "/q");
        assert_eq!(req.path_and_query(), "/q");
    }
}
