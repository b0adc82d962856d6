use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("Invalid handler: {0}")]
    InvalidHandler(String),

    #[error("No bridge client is connected to this host")]
    NotConnected,
}
