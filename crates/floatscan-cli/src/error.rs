use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] floatscan_core::ValidationError),

    #[error(transparent)]
    Config(#[from] floatscan_core::ConfigError),

    #[error(transparent)]
    Batch(#[from] floatscan_core::BatchError),

    #[error("no data: {0}")]
    NoData(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<floatscan_core::ScanError> for CliError {
    fn from(error: floatscan_core::ScanError) -> Self {
        match error {
            floatscan_core::ScanError::NoCandidates => Self::NoData(error.to_string()),
            floatscan_core::ScanError::Batch(error) => Self::Batch(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Batch(_) => 3,
            Self::NoData(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batches_and_missing_data_share_an_exit_code() {
        assert_eq!(CliError::Batch(floatscan_core::BatchError::EmptyInput).exit_code(), 3);
        assert_eq!(CliError::NoData(String::from("none")).exit_code(), 3);
        assert_eq!(
            CliError::Config(floatscan_core::ConfigError::Invalid(String::from("x"))).exit_code(),
            2
        );
    }

    #[test]
    fn exhausted_sources_surface_as_no_data() {
        let error = CliError::from(floatscan_core::ScanError::NoCandidates);
        assert!(matches!(error, CliError::NoData(_)));
        assert!(error.to_string().contains("no data available"));

        let error = CliError::from(floatscan_core::ScanError::Batch(
            floatscan_core::BatchError::EmptyInput,
        ));
        assert!(matches!(error, CliError::Batch(_)));
    }
}
