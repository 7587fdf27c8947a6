use thiserror::Error;

/// Errors that can occur while estimating stand yield components.
#[derive(Error, Debug)]
pub enum YieldError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// A computation could not be completed: a value left its safe domain, a
    /// coefficient set was missing, or reconciliation did not converge.
    #[error("Processing error: {0}")]
    ProcessingError(String),

    /// The stand itself is invalid and estimation was not attempted.
    #[error("Stand validation error: {0}")]
    StandValidation(String),

    /// An estimated quantity fell at or below its usable floor.
    #[error("{name} {value} is at or below the threshold of {threshold}")]
    LowValue {
        name: String,
        value: f32,
        threshold: f32,
    },

    /// Session state was read before being set, or written when it was locked.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl YieldError {
    pub(crate) fn processing(message: impl Into<String>) -> Self {
        YieldError::ProcessingError(message.into())
    }

    pub(crate) fn missing_coefficients(table: &str, key: impl std::fmt::Debug) -> Self {
        YieldError::ProcessingError(format!("Could not find {table} coefficients for {key:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = YieldError::from(io_err);
        let msg = err.to_string();
        assert!(msg.contains("IO error"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_processing_error_display() {
        let err = YieldError::processing("logit 90 exceeds 88");
        assert_eq!(err.to_string(), "Processing error: logit 90 exceeds 88");
    }

    #[test]
    fn test_stand_validation_display() {
        let err = YieldError::StandValidation("no primary layer".to_string());
        assert_eq!(err.to_string(), "Stand validation error: no primary layer");
    }

    #[test]
    fn test_low_value_carries_value_and_threshold() {
        let err = YieldError::LowValue {
            name: "Estimated base area".to_string(),
            value: 0.0,
            threshold: 0.05,
        };
        match &err {
            YieldError::LowValue {
                value, threshold, ..
            } => {
                assert_eq!(*value, 0.0);
                assert_eq!(*threshold, 0.05);
            }
            _ => panic!("expected a low value error"),
        }
        assert!(err.to_string().contains("0.05"));
    }

    #[test]
    fn test_missing_coefficients_names_table_and_key() {
        let err = YieldError::missing_coefficients("net breakage", 7);
        assert_eq!(
            err.to_string(),
            "Processing error: Could not find net breakage coefficients for 7"
        );
    }

    #[test]
    fn test_json_error_from_conversion() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("not valid json{{{");
        let json_err = result.unwrap_err();
        let err: YieldError = json_err.into();
        assert!(matches!(err, YieldError::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_toml_error_from_conversion() {
        let result: Result<toml::Value, _> = toml::from_str("context = ");
        let err: YieldError = result.unwrap_err().into();
        assert!(matches!(err, YieldError::Toml(_)));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = YieldError::InvalidState("unset rankingDetails".to_string());
        assert!(format!("{:?}", err).contains("InvalidState"));
    }
}
