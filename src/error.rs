pub type ReelcutResult<T> = Result<T, ReelcutError>;

#[derive(thiserror::Error, Debug)]
pub enum ReelcutError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("conversion error: {0}")]
    Convert(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelcutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn convert(msg: impl Into<String>) -> Self {
        Self::Convert(msg.into())
    }
}
