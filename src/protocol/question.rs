//! Practice question source.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuestionError {
    #[error("could not reach the question service: {0}")]
    Unreachable(String),

    #[error("the question service sent an unusable answer: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for QuestionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_status() {
            QuestionError::BadResponse(e.to_string())
        } else {
            QuestionError::Unreachable(e.to_string())
        }
    }
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_question(&self) -> Result<String, QuestionError>;
}
