use serde::{Deserialize, Serialize};

/// Inbound body of `POST /event/create`.
///
/// Only `Path` is required. The remaining fields belong to the event header
/// of richer clients and are echoed back untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectionRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required_object_detection: Option<bool>,
}

impl DetectionRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// True when any event header field beyond `Path` was supplied.
    pub fn has_header_fields(&self) -> bool {
        self.created.is_some()
            || self.camera_id.is_some()
            || self.user_id.is_some()
            || self.is_required_object_detection.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_body() {
        let req: DetectionRequest = serde_json::from_str(r#"{"Path": "/tmp/fire.jpg"}"#).unwrap();
        assert_eq!(req.path, "/tmp/fire.jpg");
        assert!(!req.has_header_fields());
    }

    #[test]
    fn test_event_header_passthrough() {
        let body = json!({
            "Created": "2024-05-01T10:00:00Z",
            "CameraId": 7,
            "UserId": "u-42",
            "Path": "/data/cam7/frame.jpg",
            "IsRequiredObjectDetection": true
        });
        let req: DetectionRequest = serde_json::from_value(body.clone()).unwrap();

        assert!(req.has_header_fields());
        assert_eq!(req.camera_id, Some(json!(7)));
        // Echo is unmodified
        assert_eq!(serde_json::to_value(&req).unwrap(), body);
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let result = serde_json::from_str::<DetectionRequest>(r#"{"CameraId": 1}"#);
        assert!(result.is_err(), "Path is required");
    }
}
