use aquabot_core::errors::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("malformed {channel} webhook: {message}")]
    MalformedWebhook { channel: &'static str, message: String },
    #[error("webhook verification rejected: {0}")]
    VerificationRejected(String),
    #[error("{0} sender is not configured")]
    NotConfigured(&'static str),
    #[error("{channel} send failed: {message}")]
    SendFailed { channel: &'static str, message: String },
    #[error("{channel} rejected the message with status {status}: {body}")]
    Rejected { channel: &'static str, status: u16, body: String },
    #[error("{channel} http client setup failed: {message}")]
    Client { channel: &'static str, message: String },
}

impl ChannelError {
    pub fn malformed(channel: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedWebhook { channel, message: message.into() }
    }

    pub fn send_failed(channel: &'static str, message: impl ToString) -> Self {
        Self::SendFailed { channel, message: message.to_string() }
    }
}

impl From<ChannelError> for CollaboratorError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::NotConfigured(channel) => CollaboratorError::Disabled(channel.to_string()),
            ChannelError::MalformedWebhook { channel, message } => {
                CollaboratorError::malformed(channel, message)
            }
            ChannelError::SendFailed { channel, message }
            | ChannelError::Client { channel, message } => {
                CollaboratorError::unavailable(channel, message)
            }
            ChannelError::Rejected { channel, status, body } => {
                CollaboratorError::unavailable(channel, format!("status {status}: {body}"))
            }
            ChannelError::VerificationRejected(message) => {
                CollaboratorError::malformed("whatsapp", message)
            }
        }
    }
}
