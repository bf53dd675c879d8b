/// Queue and logging configuration loading.
pub mod config;
/// Error types: push parsing, callback failures, receive errors.
pub mod error;
/// Logging setup (filters, formats).
pub mod logging;
/// Pub/Sub delivery: Message, PubSubMessageQueue, MessageHandler.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Configuration.
pub use self::config::{OverflowPolicy, QueueConfig, Settings};
/// Operation errors.
pub use error::{
    LoggingError, MessageCallbackError, PubSubError, PushError, RecvError, TryRecvError,
};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    parse_push, CallbackContext, DeliveryMode, HandlerStats, Message, MessageCallback, MessageHandler,
    MessageKind, MessageWaiter, PubSubMessageQueue, PushKind, QueueStats, RawPush, SignalSender,
};
