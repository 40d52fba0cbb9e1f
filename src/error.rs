use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("missing credential: {0}")]
    #[diagnostic(help("set it with a CLI flag, the kira-dm.json config file or the environment"))]
    MissingCredential(String),

    #[error("invalid configuration value for {setting}: {message}")]
    InvalidConfig { setting: String, message: String },

    #[error("quality weights must be non-negative and sum to 1.0 (got {sum:.6})")]
    InvalidQualityWeights { sum: f64 },

    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    #[error("unknown registry: {0}")]
    UnknownRegistry(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("unexpected NCBI response: {0}")]
    NcbiPayload(String),

    #[error("failed to parse {registry} summary {id}: {message}")]
    SummaryParse {
        registry: String,
        id: String,
        message: String,
    },

    #[error("PRISMA flow violation: {0}")]
    FlowViolation(String),

    #[error("screening log contract violated: {0}")]
    ScreeningContract(String),

    #[error("failed to read PRISMA flow document: {0}")]
    FlowDocument(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    /// Errors that must stop a run before any registry is contacted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KiraError::MissingCredential(_)
                | KiraError::InvalidConfig { .. }
                | KiraError::InvalidQualityWeights { .. }
                | KiraError::InvalidRequest(_)
                | KiraError::UnknownRegistry(_)
                | KiraError::ConfigRead(_)
                | KiraError::ConfigParse(_)
        )
    }
}

impl From<csv::Error> for KiraError {
    fn from(err: csv::Error) -> Self {
        KiraError::Csv(err.to_string())
    }
}
