//! XML response decoding for the Queue service (§4.5).
//!
//! Parsing walks the document with `quick_xml::Reader`, tracking the
//! current element path as a stack and matching on path slices, the same
//! technique used for the service's own response bodies.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use crate::date::{format_http_date, parse_http_date};
use crate::error::Error;
use crate::transport::Response;

use super::{missing_code, missing_message};

/// One `<Queue>` entry from a `listQueues` response.
#[derive(Debug, Clone, Default)]
pub struct QueueItem {
    pub name: String,
    pub metadata: HashMap<String, String>,
}

/// Full `listQueues` result (§4.5).
#[derive(Debug, Clone, Default)]
pub struct ListQueuesResult {
    pub queues: Vec<QueueItem>,
    pub marker: Option<String>,
    pub prefix: Option<String>,
    pub max_results: Option<i64>,
    pub next_marker: Option<String>,
}

/// One `<QueueMessage>` entry, shared by `peekMessages` and `getMessages`;
/// the latter additionally populates `pop_receipt`/`time_next_visible`.
#[derive(Debug, Clone, Default)]
pub struct QueueMessage {
    pub message_id: String,
    pub insertion_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub dequeue_count: Option<i64>,
    pub message_text: String,
    pub pop_receipt: Option<String>,
    pub time_next_visible: Option<DateTime<Utc>>,
}

/// Decodes the uniform error branch for an XML (Queue/Blob) body (§4.5).
pub fn decode_error(response: &Response) -> Error {
    let mut reader = Reader::from_str(&response.body);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    let mut code: Option<String> = None;
    let mut message: Option<String> = None;
    let mut detail: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => path.push(String::from_utf8_lossy(e.name().as_ref()).to_string()),
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map(|s| s.to_string()).unwrap_or_default();
                match path.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                    ["Error", "Code"] => code = Some(text),
                    ["Error", "Message"] => message = Some(text),
                    ["Error", "AuthenticationErrorDetail"] => detail = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let code = code.unwrap_or_else(|| missing_code(response.status).to_string());
    let message = message.unwrap_or_else(|| missing_message(&response.body));

    let mut err = Error::new(code, message).with_status(response.status).with_payload(response.body.clone());
    if let Some(detail) = detail {
        err = err.with_detail(detail);
    }
    err
}

/// Parses a `listQueues` response body (§4.5).
pub fn parse_list_queues(xml: &str) -> Result<ListQueuesResult, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut result = ListQueuesResult::default();
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    let mut current_queue: Option<QueueItem> = None;
    let mut metadata_key: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if path.last().map(String::as_str) == Some("Metadata") {
                    metadata_key = Some(name.clone());
                }
                if name == "Queue" {
                    current_queue = Some(QueueItem::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let name = path.pop();
                if name.as_deref() == Some("Queue") {
                    if let Some(queue) = current_queue.take() {
                        result.queues.push(queue);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map(|s| s.to_string()).unwrap_or_default();
                match path.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                    ["EnumerationResults", "Marker"] => result.marker = Some(text),
                    ["EnumerationResults", "Prefix"] => result.prefix = Some(text),
                    ["EnumerationResults", "MaxResults"] => result.max_results = text.parse().ok(),
                    ["EnumerationResults", "NextMarker"] => result.next_marker = Some(text),
                    ["EnumerationResults", "Queues", "Queue", "Name"] => {
                        if let Some(queue) = current_queue.as_mut() {
                            queue.name = text;
                        }
                    }
                    [.., "Metadata", _] => {
                        if let (Some(queue), Some(key)) = (current_queue.as_mut(), metadata_key.take()) {
                            queue.metadata.insert(key, text);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::new("InvalidXmlDocument", e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

/// Parses a `peekMessages`/`getMessages` response body. `with_pop_receipt`
/// selects whether `PopReceipt`/`TimeNextVisible` are expected (§4.5).
pub fn parse_queue_messages(xml: &str) -> Result<Vec<QueueMessage>, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut messages = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<QueueMessage> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "QueueMessage" {
                    current = Some(QueueMessage::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let name = path.pop();
                if name.as_deref() == Some("QueueMessage") {
                    if let Some(message) = current.take() {
                        messages.push(message);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map(|s| s.to_string()).unwrap_or_default();
                if let Some(message) = current.as_mut() {
                    match path.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                        ["QueueMessagesList", "QueueMessage", "MessageId"] => message.message_id = text,
                        ["QueueMessagesList", "QueueMessage", "InsertionTime"] => message.insertion_time = parse_http_date(&text),
                        ["QueueMessagesList", "QueueMessage", "ExpirationTime"] => message.expiration_time = parse_http_date(&text),
                        ["QueueMessagesList", "QueueMessage", "DequeueCount"] => message.dequeue_count = text.parse().ok(),
                        ["QueueMessagesList", "QueueMessage", "MessageText"] => message.message_text = text,
                        ["QueueMessagesList", "QueueMessage", "PopReceipt"] => message.pop_receipt = Some(text),
                        ["QueueMessagesList", "QueueMessage", "TimeNextVisible"] => message.time_next_visible = parse_http_date(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::new("InvalidXmlDocument", e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

/// Builds the `<QueueMessage><MessageText>…</MessageText></QueueMessage>`
/// body `putMessage` sends; the caller is responsible for XML-safe encoding
/// of `text` (§4.6).
pub fn build_put_message_body(text: &str) -> String {
    format!("<QueueMessage><MessageText>{text}</MessageText></QueueMessage>")
}

/// Stamped purely so callers that need an HTTP-date string for fixtures
/// (e.g. tests comparing insertion times) can reuse the same formatter the
/// signing path uses.
pub fn http_date_now() -> String {
    format_http_date(&chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_QUEUES_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://jungle.queue.core.windows.net/">
  <Prefix></Prefix>
  <Marker></Marker>
  <MaxResults>10</MaxResults>
  <Queues>
    <Queue>
      <Name>queue-one</Name>
      <Metadata><purpose>testing</purpose></Metadata>
    </Queue>
    <Queue>
      <Name>queue-two</Name>
      <Metadata><purpose>testing</purpose></Metadata>
    </Queue>
    <Queue>
      <Name>queue-three</Name>
      <Metadata><purpose>testing</purpose><owner>jungle-team</owner></Metadata>
    </Queue>
  </Queues>
  <NextMarker></NextMarker>
</EnumerationResults>"#;

    #[test]
    fn list_queues_parses_three_entries_with_metadata() {
        let result = parse_list_queues(LIST_QUEUES_FIXTURE).unwrap();
        assert_eq!(result.queues.len(), 3);
        assert_eq!(result.max_results, Some(10));
        assert_eq!(result.queues[0].metadata.get("purpose"), Some(&"testing".to_string()));
        assert_eq!(result.queues[2].metadata.len(), 2);
        assert_eq!(result.queues[2].metadata.get("owner"), Some(&"jungle-team".to_string()));
    }

    #[test]
    fn error_without_code_on_501_is_synthesized() {
        let response = Response {
            status: 501,
            headers: Default::default(),
            raw_headers: Vec::new(),
            body: "<Error><Message>boom</Message></Error>".to_string(),
        };
        let err = decode_error(&response);
        assert_eq!(err.code, "InternalErrorWithoutCode");
        assert_eq!(err.message, "boom");
        assert!(err.detail.is_none());
    }

    #[test]
    fn error_without_message_gets_synthesized_fallback() {
        let response = Response {
            status: 404,
            headers: Default::default(),
            raw_headers: Vec::new(),
            body: "<Error><Code>QueueNotFound</Code></Error>".to_string(),
        };
        let err = decode_error(&response);
        assert_eq!(err.code, "QueueNotFound");
        assert!(err.message.contains("No error message given"));
    }

    #[test]
    fn put_message_body_wraps_text_verbatim() {
        assert_eq!(build_put_message_body("aGVsbG8="), "<QueueMessage><MessageText>aGVsbG8=</MessageText></QueueMessage>");
    }
}
