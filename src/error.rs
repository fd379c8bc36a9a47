use std::time::Duration;

use thiserror::Error;

/// How the presentation layer should surface an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Remote,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("GOOGLE_API_KEY is missing! Please add it to the secrets file or the environment.")]
    MissingCredential,

    #[error("Please enter a question or insights to analyze the video.")]
    EmptyQuery,

    #[error("Upload a video file for analysis")]
    MissingVideo,

    #[error("The uploaded video file is empty.")]
    EmptyUpload,

    #[error("Unsupported video format {0:?}; expected one of mp4, mov, avi")]
    UnsupportedFormat(String),

    #[error("failed to stage video: {0}")]
    Staging(#[from] std::io::Error),

    #[error("upload failed: {0:#}")]
    Upload(#[source] anyhow::Error),

    #[error("failed to refresh file {name}: {source:#}")]
    Poll {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("video processing failed for {name}: {message}")]
    ProcessingFailed { name: String, message: String },

    #[error("video {name} was still processing after {attempts} checks ({elapsed:?})")]
    PollTimeout {
        name: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("{0:#}")]
    Agent(#[source] anyhow::Error),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingCredential => ErrorKind::Configuration,
            AnalysisError::EmptyQuery
            | AnalysisError::MissingVideo
            | AnalysisError::EmptyUpload
            | AnalysisError::UnsupportedFormat(_) => ErrorKind::Validation,
            AnalysisError::Staging(_)
            | AnalysisError::Upload(_)
            | AnalysisError::Poll { .. }
            | AnalysisError::ProcessingFailed { .. }
            | AnalysisError::PollTimeout { .. }
            | AnalysisError::Agent(_) => ErrorKind::Remote,
        }
    }
}
