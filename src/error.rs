pub type UmbraResult<T> = Result<T, UmbraError>;

#[derive(thiserror::Error, Debug)]
pub enum UmbraError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("allocation error: {0}")]
    Allocation(String),

    #[error("client buffer error: {0}")]
    ClientBuffer(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UmbraError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn client_buffer(msg: impl Into<String>) -> Self {
        Self::ClientBuffer(msg.into())
    }
}
