use bytes::Bytes;

use crate::error::AnalysisError;

/// Container formats accepted by the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    Mov,
    Avi,
}

impl VideoFormat {
    pub const ACCEPT: &'static str = ".mp4,.mov,.avi";

    pub fn from_file_name(name: &str) -> Result<Self, AnalysisError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp4" => Ok(VideoFormat::Mp4),
            "mov" => Ok(VideoFormat::Mov),
            "avi" => Ok(VideoFormat::Avi),
            _ => Err(AnalysisError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mov => "mov",
            VideoFormat::Avi => "avi",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Mov => "video/quicktime",
            VideoFormat::Avi => "video/x-msvideo",
        }
    }
}

/// A video received from the form, held in memory until it is staged.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub format: VideoFormat,
    pub bytes: Bytes,
}

impl VideoUpload {
    pub fn new(file_name: impl Into<String>, bytes: Bytes) -> Result<Self, AnalysisError> {
        let file_name = file_name.into();
        let format = VideoFormat::from_file_name(&file_name)?;
        if bytes.is_empty() {
            return Err(AnalysisError::EmptyUpload);
        }

        Ok(VideoUpload {
            file_name,
            format,
            bytes,
        })
    }
}

/// Rejects blank queries before anything is staged or sent.
pub fn validate_query(query: &str) -> Result<&str, AnalysisError> {
    if query.trim().is_empty() {
        return Err(AnalysisError::EmptyQuery);
    }
    Ok(query)
}
