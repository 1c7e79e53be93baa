use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element cannot be filled: {0}")]
    NotFillable(String),

    #[error("No page available")]
    NoPage,

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Why a failed step could not enter the recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackUnavailableReason {
    /// The step carries no fallback description.
    NoFallback,
    /// The current page has no semantic index (empty page, failed build, or no `goto` yet).
    NoIndex,
    /// The index answered the fallback query with an empty candidate list.
    NoCandidates,
}

impl fmt::Display for FallbackUnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFallback => f.write_str("step has no fallback description"),
            Self::NoIndex => f.write_str("no semantic index for the current page"),
            Self::NoCandidates => f.write_str("semantic index returned no candidates"),
        }
    }
}

/// Failures recorded at the step boundary. None of these abort a run.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("Selector '{selector}' did not resolve: {source}")]
    SelectorResolution {
        selector: String,
        #[source]
        source: BrowserError,
    },

    #[error("Selector '{selector}' failed and no fallback is available: {reason}")]
    FallbackUnavailable {
        selector: String,
        reason: FallbackUnavailableReason,
    },

    #[error("Embedding service failed during fallback lookup: {0}")]
    EmbeddingService(#[from] EmbeddingError),

    #[error("Fallback selector '{selector}' also failed: {source}")]
    FallbackAction {
        selector: String,
        #[source]
        source: BrowserError,
    },
}

/// Errors reading or writing a flow file.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Failed to access flow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid flow file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize flow: {0}")]
    Serialize(#[from] serde_json::Error),
}
