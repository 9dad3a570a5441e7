use crate::DetectionRequest;
use serde::{Deserialize, Serialize};

/// Class label as emitted on the wire: the model's class index, or its name
/// when the service is configured for named labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Index(i64),
    Name(String),
}

/// One detected object in integer pixel coordinates of the source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectionResult {
    pub label: Label,
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// Success payload. `Results` is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<DetectionRequest>,
    pub results: Vec<DetectionResult>,
}

/// Failure payload. Never combined with results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorReport {
    pub error_message: String,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_format() {
        let response = DetectionResponse {
            header: None,
            results: vec![DetectionResult {
                label: Label::Index(3),
                left: 10,
                top: 20,
                right: 100,
                bottom: 200,
            }],
        };

        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"Results":[{"Label":3,"Left":10,"Top":20,"Right":100,"Bottom":200}]}"#
        );
    }

    #[test]
    fn test_empty_results_serialize_as_empty_array() {
        let response = DetectionResponse {
            header: None,
            results: Vec::new(),
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"Results":[]}"#);
    }

    #[test]
    fn test_named_label_and_header_echo() {
        let response = DetectionResponse {
            header: Some(DetectionRequest::new("/tmp/a.jpg")),
            results: vec![DetectionResult {
                label: Label::Name("fire".to_string()),
                left: 0,
                top: 0,
                right: 1,
                bottom: 1,
            }],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["Header"]["Path"], "/tmp/a.jpg");
        assert_eq!(value["Results"][0]["Label"], "fire");

        let parsed: DetectionResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_error_report_wire_format() {
        let report = ErrorReport::new("File not found.");
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"ErrorMessage":"File not found."}"#
        );
    }
}
