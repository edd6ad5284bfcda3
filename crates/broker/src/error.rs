use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker URI could not be parsed.
    #[error("invalid broker URI: {0}")]
    Uri(String),

    /// Establishing the connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Opening a channel failed.
    #[error("error while opening a channel: {0}")]
    Channel(String),

    /// Declaring an exchange failed.
    #[error("error while declaring exchange: {0}")]
    ExchangeDeclare(String),

    /// Declaring a queue failed.
    #[error("error while declaring queue: {0}")]
    QueueDeclare(String),

    /// Binding a queue to an exchange failed.
    #[error("error while binding queue to exchange: {0}")]
    QueueBind(String),

    /// Starting a consumer failed.
    #[error("error while starting consumer: {0}")]
    Consume(String),

    /// Publishing a message failed.
    #[error("error while publishing to {routing_key}: {message}")]
    Publish {
        routing_key: String,
        message: String,
    },

    /// Acknowledging a message failed.
    #[error("error while acknowledging message: {0}")]
    Ack(String),

    /// Envelope (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
