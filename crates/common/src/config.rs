use serde::Deserialize;

/// Deployment environment; picks the log format and tags exported telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_lowercase_names() {
        let env: Environment = serde_json::from_str(r#""production""#).unwrap();
        assert_eq!(env, Environment::Production);
        assert_eq!(env.as_str(), "production");

        let env: Environment = serde_json::from_str(r#""development""#).unwrap();
        assert_eq!(env.as_str(), "development");
    }

    #[test]
    fn test_rejects_unknown_environment() {
        assert!(serde_json::from_str::<Environment>(r#""staging""#).is_err());
    }
}
