//! One-shot file submission for full analysis.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::metrics::Metrics;

/// A recorded answer chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for display and for the multipart part; falls back to the
    /// whole path when there is no final component.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzeError {
    /// The file never reached the service, or no answer came back.
    #[error("upload failed: {0}")]
    Transfer(String),

    /// The service answered but refused the media or sent an unusable body.
    #[error("the service could not analyse this file: {0}")]
    MediaRejected(String),
}

impl From<reqwest::Error> for AnalyzeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalyzeError::Transfer("request timed out".into())
        } else {
            AnalyzeError::Transfer(e.to_string())
        }
    }
}

/// Submits a complete file and returns its final metrics.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, file: &MediaFile) -> Result<Metrics, AnalyzeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_file_name() {
        let file = MediaFile::new("/home/me/answers/take-2.mp4");
        assert_eq!(file.display_name(), "take-2.mp4");
        assert_eq!(file.path(), Path::new("/home/me/answers/take-2.mp4"));
    }

    #[test]
    fn display_name_without_file_component() {
        let file = MediaFile::new("/");
        assert_eq!(file.display_name(), "/");
    }
}
