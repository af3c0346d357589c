use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),
}
