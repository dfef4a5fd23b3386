use thiserror::Error;

/// Failures that end a pipeline run.
///
/// Configuration problems never appear here: out-of-range numbers are clamped when
/// the `PipelineConfig` is built.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The camera or file could not be opened; the run never entered `Running`.
    #[error("failed to open {source_desc}: {reason}")]
    SourceOpen { source_desc: String, reason: String },

    /// A mid-run read failure on a source that is expected to keep producing.
    #[error("failed to read from {source_desc}: {reason}")]
    Read { source_desc: String, reason: String },

    /// The inference capability failed fatally, or failed too many times in a row.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The display sink rejected a frame.
    #[error("display failed: {0}")]
    Display(String),
}

impl PipelineError {
    pub fn source_open(source_desc: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::SourceOpen {
            source_desc: source_desc.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn read(source_desc: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Read {
            source_desc: source_desc.into(),
            reason: format!("{:#}", err),
        }
    }
}

/// Marker a backend returns when the inference capability cannot recover.
///
/// The detector downcasts backend errors to this type; anything else is treated as a
/// per-frame failure.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FatalInference(pub String);

pub type Result<T> = std::result::Result<T, PipelineError>;
