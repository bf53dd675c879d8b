pub mod logging;
pub mod pubsub;
pub mod push;

pub use logging::LoggingError;
pub use pubsub::{MessageCallbackError, PubSubError, RecvError, TryRecvError};
pub use push::PushError;
