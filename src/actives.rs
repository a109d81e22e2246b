//! Active-request tracking and the registry of requests this viewer issued.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One error reported against a request: `(name, value, traceback)`.
///
/// Serializes as a three-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord(pub String, pub String, pub Vec<String>);

impl ErrorRecord {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &str {
        &self.1
    }

    pub fn traceback(&self) -> &[String] {
        &self.2
    }
}

/// Metadata for an execution currently reported as busy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorRecord>>,
}

/// Requests currently in flight, keyed by request id.
///
/// An id is present iff its execution is busy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveRequests {
    entries: BTreeMap<String, ActiveRequest>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `request_id` busy with a fresh entry, replacing any previous one.
    pub fn begin(mut self, request_id: &str) -> Self {
        self.entries
            .insert(request_id.to_string(), ActiveRequest::default());
        self
    }

    /// Drop `request_id`. Absent ids are ignored.
    pub fn finish(mut self, request_id: &str) -> Self {
        self.entries.remove(request_id);
        self
    }

    /// Append an error to the request's list if the request is active.
    pub fn record_error(mut self, request_id: &str, error: ErrorRecord) -> Self {
        if let Some(active) = self.entries.get_mut(request_id) {
            active.errors.get_or_insert_with(Vec::new).push(error);
        }
        self
    }

    pub fn get(&self, request_id: &str) -> Option<&ActiveRequest> {
        self.entries.get(request_id)
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Request ids this viewer issued; messages for any other id are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseRegistry {
    ids: BTreeMap<String, ResponseMarker>,
}

/// Presence marker stored per registered request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMarker {}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, request_id: &str) -> Self {
        self.ids
            .insert(request_id.to_string(), ResponseMarker::default());
        self
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.ids.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_begin_then_finish() {
        let actives = ActiveRequests::new().begin("5");
        assert!(actives.contains("5"));
        assert_eq!(actives.get("5"), Some(&ActiveRequest::default()));

        let actives = actives.finish("5");
        assert!(actives.is_empty());
    }

    #[test]
    fn test_finish_absent_is_noop() {
        let actives = ActiveRequests::new().begin("1");
        assert_eq!(actives.clone().finish("2"), actives);
    }

    #[test]
    fn test_begin_overwrites_errors() {
        let actives = ActiveRequests::new()
            .begin("1")
            .record_error("1", ErrorRecord("E".into(), "v".into(), vec![]))
            .begin("1");
        assert_eq!(actives.get("1").unwrap().errors, None);
    }

    #[test]
    fn test_record_error_only_for_active() {
        let actives = ActiveRequests::new()
            .begin("1")
            .record_error("2", ErrorRecord("E".into(), "v".into(), vec![]));
        assert_eq!(actives.get("1").unwrap().errors, None);
        assert!(!actives.contains("2"));
    }

    #[test]
    fn test_errors_accumulate_in_order() {
        let actives = ActiveRequests::new()
            .begin("1")
            .record_error("1", ErrorRecord("A".into(), "a".into(), vec!["x".into()]))
            .record_error("1", ErrorRecord("B".into(), "b".into(), vec!["y".into()]));
        let errors = actives.get("1").unwrap().errors.as_ref().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].name(), "A");
        assert_eq!(errors[1].traceback(), ["y".to_string()]);
    }

    #[test]
    fn test_wire_format() {
        let actives = ActiveRequests::new()
            .begin("R")
            .record_error("R", ErrorRecord("ValueError".into(), "bad".into(), vec!["line1".into()]));
        assert_eq!(
            serde_json::to_value(&actives).unwrap(),
            json!({ "R": { "errors": [["ValueError", "bad", ["line1"]]] } })
        );

        let registry = ResponseRegistry::new().register("5");
        assert_eq!(serde_json::to_value(&registry).unwrap(), json!({ "5": {} }));
    }
}
