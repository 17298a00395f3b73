use thiserror::Error;

pub const TIMEOUT_ERROR_CODE: &str = "ENGINE_TIMEOUT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BoxError {
    pub code: String,
    pub message: String,
}

impl BoxError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TIMEOUT_ERROR_CODE, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == TIMEOUT_ERROR_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_code_and_message() {
        let error = BoxError::new("BOX_MODULE_UNKNOWN", "unknown module: nope");
        assert_eq!(error.to_string(), "BOX_MODULE_UNKNOWN: unknown module: nope");
        assert!(!error.is_timeout());
    }

    #[test]
    fn timeout_errors_are_recognized() {
        let error = BoxError::timeout("deadline exceeded after 1s");
        assert_eq!(error.code, "ENGINE_TIMEOUT");
        assert!(error.is_timeout());
    }
}
