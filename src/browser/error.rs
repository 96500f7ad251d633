use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("browser setup failed: {0}")]
    Setup(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("field extraction failed: {0}")]
    Field(String),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout(_))
    }
}

impl From<reqwest::Error> for BrowserError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrowserError::Timeout(err.to_string())
        } else {
            BrowserError::Navigation(err.to_string())
        }
    }
}
