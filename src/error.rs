//! Crate-wide error type.
//!
//! Only pipeline-level failures are errors. A region that is too short to fit,
//! fails to converge, or produces an unreliable fit is reported as a
//! [`crate::domain::SkipReason`] instead.

/// Exit code for bad input, configuration, or IO.
pub const EXIT_INPUT: u8 = 2;
/// Exit code when there is nothing to work with (empty table, unknown region).
pub const EXIT_NO_DATA: u8 = 3;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Structurally invalid data for one region (negative counts, unordered
    /// dates, decreasing cumulative counts).
    pub fn malformed(region_id: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(EXIT_INPUT, format!("Malformed input for region '{region_id}': {detail}"))
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_names_the_region() {
        let err = AppError::malformed("Hubei, China", "count -3 on 2020-02-01");
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("Hubei, China"));
        assert!(err.to_string().contains("2020-02-01"));
    }
}
