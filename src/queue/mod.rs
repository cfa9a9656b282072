//! Queue service façade: operation methods composing C1-C5 (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::auth::{self, sas::SasState, Service};
use crate::config::ClientOptions;
use crate::decode::{self, xml};
use crate::error::Error;
use crate::pool::Pool;
use crate::request::Request;
use crate::retry;
use crate::transport::{self, Response};

/// Metadata returned by `getMetadata` (a HEAD on the queue): the
/// approximate message count plus the `x-ms-meta-*` map, keyed by the tail
/// after the prefix with original header casing preserved (§4.5, §6, §8).
#[derive(Debug, Clone, Default)]
pub struct QueueMetadata {
    pub approximate_messages_count: Option<i64>,
    pub metadata: HashMap<String, String>,
}

/// Options accepted by `putMessage` (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct PutMessageOptions {
    pub visibility_timeout_secs: Option<u32>,
    pub message_ttl_secs: Option<u32>,
}

pub struct QueueClient {
    options: ClientOptions,
    pool: Arc<Pool>,
    sas_state: Option<SasState>,
}

impl QueueClient {
    pub fn new(options: ClientOptions, pool: Arc<Pool>) -> Self {
        let sas_state = matches!(options.credentials, crate::config::Credentials::RefreshableSas { .. })
            .then(SasState::new);
        Self { options, pool, sas_state }
    }

    async fn execute(&self, make_request: impl Fn() -> Request, expected: &[u16]) -> Result<Response, Error> {
        retry::retry(&self.options, |_k| async {
            let request = make_request().enrich(&self.options);
            let signed = auth::authorize(request, Service::Queue, &self.options, self.sas_state.as_ref()).await?;
            let response = transport::send(&self.pool, signed, self.options.client_timeout_ms()).await?;
            decode::check_success(&response, Service::Queue)?;
            decode::expect_status(&response, expected)?;
            Ok(response)
        })
        .await
    }

    pub async fn list_queues(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
        maxresults: Option<u32>,
    ) -> Result<xml::ListQueuesResult, Error> {
        let make_request = || {
            let mut request = Request::new(Method::GET, "/").with_query("comp", "list");
            if let Some(prefix) = prefix {
                request = request.with_query("prefix", prefix);
            }
            if let Some(marker) = marker {
                request = request.with_query("marker", marker);
            }
            if let Some(maxresults) = maxresults {
                request = request.with_query("maxresults", maxresults.to_string());
            }
            request = request.with_query("include", "metadata");
            request
        };
        let response = self.execute(make_request, &[200]).await?;
        xml::parse_list_queues(&response.body)
    }

    pub async fn create_queue(&self, name: &str, metadata: &HashMap<String, String>) -> Result<(), Error> {
        let path = format!("/{name}");
        let make_request = || {
            let mut request = Request::new(Method::PUT, path.clone());
            for (key, value) in metadata {
                request = request.with_header(format!("x-ms-meta-{key}"), value.clone());
            }
            request
        };
        self.execute(make_request, &[201, 204]).await.map(|_| ())
    }

    pub async fn delete_queue(&self, name: &str) -> Result<(), Error> {
        let path = format!("/{name}");
        self.execute(|| Request::new(Method::DELETE, path.clone()), &[204]).await.map(|_| ())
    }

    pub async fn get_metadata(&self, name: &str) -> Result<QueueMetadata, Error> {
        let path = format!("/{name}");
        let make_request = || Request::new(Method::HEAD, path.clone()).with_query("comp", "metadata");
        let response = self.execute(make_request, &[200]).await?;

        let approximate_messages_count = response.header("x-ms-approximate-messages-count").and_then(|v| v.parse().ok());
        let mut metadata = HashMap::new();
        for (name, value) in &response.raw_headers {
            if let Some(key) = name.to_lowercase().strip_prefix("x-ms-meta-").map(str::to_string) {
                let original_key = &name[name.len() - key.len()..];
                metadata.insert(original_key.to_string(), value.clone());
            }
        }
        Ok(QueueMetadata { approximate_messages_count, metadata })
    }

    pub async fn set_metadata(&self, name: &str, metadata: &HashMap<String, String>) -> Result<(), Error> {
        let path = format!("/{name}");
        let make_request = || {
            let mut request = Request::new(Method::PUT, path.clone()).with_query("comp", "metadata");
            for (key, value) in metadata {
                request = request.with_header(format!("x-ms-meta-{key}"), value.clone());
            }
            request
        };
        self.execute(make_request, &[204]).await.map(|_| ())
    }

    /// `text` is delivered verbatim inside `<MessageText>`; the caller is
    /// responsible for XML-safe encoding (§4.6).
    pub async fn put_message(&self, queue: &str, text: &str, options: PutMessageOptions) -> Result<(), Error> {
        let path = format!("/{queue}/messages");
        let body = xml::build_put_message_body(text).into_bytes();
        let make_request = || {
            let mut request = Request::new(Method::POST, path.clone()).with_body(body.clone());
            if let Some(vt) = options.visibility_timeout_secs {
                request = request.with_query("visibilitytimeout", vt.to_string());
            }
            if let Some(ttl) = options.message_ttl_secs {
                request = request.with_query("messagettl", ttl.to_string());
            }
            request.with_header("content-type", "application/xml")
        };
        self.execute(make_request, &[201]).await.map(|_| ())
    }

    pub async fn peek_messages(&self, queue: &str, numofmessages: Option<u32>) -> Result<Vec<xml::QueueMessage>, Error> {
        let path = format!("/{queue}/messages");
        let make_request = || {
            let mut request = Request::new(Method::GET, path.clone()).with_query("peekonly", "true");
            if let Some(n) = numofmessages {
                request = request.with_query("numofmessages", n.to_string());
            }
            request
        };
        let response = self.execute(make_request, &[200]).await?;
        xml::parse_queue_messages(&response.body)
    }

    pub async fn get_messages(
        &self,
        queue: &str,
        numofmessages: Option<u32>,
        visibility_timeout_secs: Option<u32>,
    ) -> Result<Vec<xml::QueueMessage>, Error> {
        let path = format!("/{queue}/messages");
        let make_request = || {
            let mut request = Request::new(Method::GET, path.clone());
            if let Some(n) = numofmessages {
                request = request.with_query("numofmessages", n.to_string());
            }
            if let Some(vt) = visibility_timeout_secs {
                request = request.with_query("visibilitytimeout", vt.to_string());
            }
            request
        };
        let response = self.execute(make_request, &[200]).await?;
        xml::parse_queue_messages(&response.body)
    }

    pub async fn delete_message(&self, queue: &str, message_id: &str, pop_receipt: &str) -> Result<(), Error> {
        let path = format!("/{queue}/messages/{message_id}");
        let pop_receipt = pop_receipt.to_string();
        let make_request = || Request::new(Method::DELETE, path.clone()).with_query("popreceipt", pop_receipt.clone());
        self.execute(make_request, &[204]).await.map(|_| ())
    }

    pub async fn clear_messages(&self, queue: &str) -> Result<(), Error> {
        let path = format!("/{queue}/messages");
        self.execute(|| Request::new(Method::DELETE, path.clone()), &[204]).await.map(|_| ())
    }

    pub async fn update_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout_secs: u32,
        text: Option<&str>,
    ) -> Result<(), Error> {
        let path = format!("/{queue}/messages/{message_id}");
        let pop_receipt = pop_receipt.to_string();
        let body = text.map(|t| xml::build_put_message_body(t).into_bytes());
        let make_request = move || {
            let mut request = Request::new(Method::PUT, path.clone())
                .with_query("popreceipt", pop_receipt.clone())
                .with_query("visibilitytimeout", visibility_timeout_secs.to_string());
            if let Some(body) = &body {
                request = request.with_body(body.clone()).with_header("content-type", "application/xml");
            }
            request
        };
        self.execute(make_request, &[204]).await.map(|_| ())
    }
}

/// Test-only entry points that drive the `execute` pipeline (retry →
/// authorize → transport → decode) against a plaintext local listener
/// instead of the account's real TLS endpoint. Gated behind the
/// `test-util` feature; never part of the default public surface.
#[cfg(feature = "test-util")]
impl QueueClient {
    pub async fn list_queues_at(&self, addr: &str) -> Result<xml::ListQueuesResult, Error> {
        let response = retry::retry(&self.options, |_k| async {
            let request = Request::new(Method::GET, "/").with_query("comp", "list").enrich(&self.options);
            let signed = auth::authorize(request, Service::Queue, &self.options, self.sas_state.as_ref()).await?;
            let response = transport::send_plaintext(&self.pool, addr, signed, self.options.client_timeout_ms()).await?;
            decode::check_success(&response, Service::Queue)?;
            decode::expect_status(&response, &[200])?;
            Ok(response)
        })
        .await?;
        xml::parse_list_queues(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_metadata_preserves_original_header_case() {
        let response = Response {
            status: 200,
            headers: Default::default(),
            raw_headers: vec![("X-Ms-Meta-AppName".to_string(), "v".to_string())],
            body: String::new(),
        };
        let mut metadata = HashMap::new();
        for (name, value) in &response.raw_headers {
            if let Some(key) = name.to_lowercase().strip_prefix("x-ms-meta-").map(str::to_string) {
                let original_key = &name[name.len() - key.len()..];
                metadata.insert(original_key.to_string(), value.clone());
            }
        }
        assert_eq!(metadata.get("AppName"), Some(&"v".to_string()));
    }
}
