//! Stub external sources.

use spnet_core::{ExternalError, ExternalErrorKind, ExternalSource, Key};
use spnet_value::{doc, Document, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A source answering every key with the same metadata and counting how
/// often it was asked.
#[derive(Debug)]
pub struct StubSource {
    name: String,
    data: Document,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubSource {
    /// A source returning `data` for every key.
    pub fn new(name: &str, data: Document) -> Self {
        Self {
            name: name.to_string(),
            data,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A bibliographic source returning a paper titled `title`.
    pub fn titled(title: &str) -> Self {
        Self::new(
            "stub",
            doc! {
                "title" => title,
                "authorNames" => vec![Value::from("Fred Smith")],
            },
        )
    }

    /// Sleeps `delay` before answering, widening race windows in
    /// concurrency tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How often the source was asked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExternalSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, _key: &Key) -> Result<Document, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(self.data.clone())
    }
}

/// A source that always fails with the given error kind.
#[derive(Debug)]
pub struct FailingSource {
    kind: ExternalErrorKind,
    calls: AtomicUsize,
}

impl FailingSource {
    /// A source failing with `kind`.
    pub fn new(kind: ExternalErrorKind) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    /// How often the source was asked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExternalSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch(&self, key: &Key) -> Result<Document, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExternalError::new("failing", self.kind, format!("refused {key}")))
    }
}

/// A source answering with JSON, as the bibliographic services do.
#[derive(Debug)]
pub struct JsonSource {
    body: serde_json::Value,
}

impl JsonSource {
    /// A source returning `body` for every key.
    pub fn new(body: serde_json::Value) -> Self {
        Self { body }
    }
}

impl ExternalSource for JsonSource {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch(&self, _key: &Key) -> Result<Document, ExternalError> {
        Document::from_json(self.body.clone())
            .map_err(|err| ExternalError::malformed("json", err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_counts_calls() {
        let stub = StubSource::titled("Y");
        let data = stub.fetch(&Key::from("9999")).unwrap();
        assert_eq!(data.get("title"), Some(&Value::from("Y")));
        assert_eq!(stub.calls(), 1);
    }

    #[test]
    fn failing_source_reports_its_kind() {
        let source = FailingSource::new(ExternalErrorKind::Timeout);
        let err = source.fetch(&Key::from("x")).unwrap_err();
        assert_eq!(err.kind, ExternalErrorKind::Timeout);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn json_source_rejects_non_objects() {
        let source = JsonSource::new(serde_json::json!([1, 2]));
        let err = source.fetch(&Key::from("x")).unwrap_err();
        assert_eq!(err.kind, ExternalErrorKind::Malformed);
    }
}
