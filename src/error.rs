pub type FuseResult<T> = Result<T, FuseError>;

#[derive(thiserror::Error, Debug)]
pub enum FuseError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("selection error: {0}")]
    Selection(String),

    #[error("composition error: {0}")]
    Composition(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FuseError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
