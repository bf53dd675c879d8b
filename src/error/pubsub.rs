use std::any::Any;

use thiserror::Error;
use tokio::sync::oneshot;

/// Ошибка при ожидании сообщения через [`MessageWaiter`].
///
/// [`MessageWaiter`]: crate::pubsub::MessageWaiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecvError {
    /// Очередь уничтожена раньше, чем пришло сообщение.
    #[error("message queue is closed")]
    Closed,
}

/// Ошибка при неблокирующей проверке [`MessageWaiter`].
///
/// [`MessageWaiter`]: crate::pubsub::MessageWaiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no message delivered yet")]
    Empty,

    #[error("message queue is closed")]
    Closed,
}

/// Паника внутри пользовательского callback'а, перехваченная обработчиком.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error in message callback: {cause}")]
pub struct MessageCallbackError {
    cause: String,
}

/// Ошибки уровня обработчика сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    /// Очередь недоступна: обработчик работает в режиме callback'а.
    #[error("message queue is unavailable: a message callback is configured")]
    CallbackConfigured,
}

impl MessageCallbackError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Строит ошибку из payload'а, возвращённого `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let cause = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { cause }
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

// === Преобразования ===

impl From<oneshot::error::RecvError> for RecvError {
    fn from(_: oneshot::error::RecvError) -> Self {
        RecvError::Closed
    }
}

impl From<oneshot::error::TryRecvError> for TryRecvError {
    fn from(err: oneshot::error::TryRecvError) -> Self {
        match err {
            oneshot::error::TryRecvError::Empty => TryRecvError::Empty,
            oneshot::error::TryRecvError::Closed => TryRecvError::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn test_callback_error_display() {
        let err = MessageCallbackError::new("boom");
        assert_eq!(err.to_string(), "error in message callback: boom");
        assert_eq!(err.cause(), "boom");
    }

    /// Тест проверяет извлечение текста из `&str` и `String` payload'ов.
    #[test]
    fn test_from_panic_payloads() {
        let static_payload = panic::catch_unwind(|| panic!("static text")).unwrap_err();
        assert_eq!(
            MessageCallbackError::from_panic(static_payload).cause(),
            "static text"
        );

        let owned_payload =
            panic::catch_unwind(|| panic!("{} {}", "formatted", 42)).unwrap_err();
        assert_eq!(
            MessageCallbackError::from_panic(owned_payload).cause(),
            "formatted 42"
        );

        let opaque_payload = panic::catch_unwind(|| panic::panic_any(7_u32)).unwrap_err();
        assert_eq!(
            MessageCallbackError::from_panic(opaque_payload).cause(),
            "unknown panic payload"
        );
    }

    #[tokio::test]
    async fn test_oneshot_conversion() {
        let (tx, mut rx) = oneshot::channel::<u8>();
        let err: TryRecvError = rx.try_recv().unwrap_err().into();
        assert_eq!(err, TryRecvError::Empty);

        drop(tx);
        let err: RecvError = rx.await.unwrap_err().into();
        assert_eq!(err, RecvError::Closed);
    }

    #[test]
    fn test_callback_configured_display() {
        assert_eq!(
            PubSubError::CallbackConfigured.to_string(),
            "message queue is unavailable: a message callback is configured"
        );
    }
}
