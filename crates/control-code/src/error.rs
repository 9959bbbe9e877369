#[derive(Debug, thiserror::Error)]
pub enum ControlCodeError {
    #[error("Unsupported character encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("Field '{field}' is not representable in {encoding}")]
    Encoding {
        field: String,
        encoding: &'static str,
    },
    #[error("Field '{field}' is {length} characters long, at most {max} fit the length prefix")]
    FieldTooLong {
        field: String,
        length: usize,
        max: usize,
    },
    #[error("Failed to load key: {0}")]
    KeyLoad(String),
    #[error("Failed to produce signature: {0}")]
    Signing(String),
    #[error("Verification engine error: {0}")]
    VerificationEngine(String),
}

impl ControlCodeError {
    /// True for failures caused by the field data rather than the key setup.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEncoding(_) | Self::Encoding { .. } | Self::FieldTooLong { .. }
        )
    }
}

pub type Result<T, E = ControlCodeError> = std::result::Result<T, E>;
