use thiserror::Error;

/// Ошибки разбора push-кадра, пришедшего от соединения.
///
/// Возникают до передачи сообщения обработчику: кадр без нужных полей
/// не превращается в [`Message`](crate::pubsub::Message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("received invalid push: empty or in incorrect format")]
    Invalid,

    #[error("received invalid push: missing kind field")]
    MissingKind,

    #[error("received invalid push: missing values field")]
    MissingValues,

    #[error("received invalid push: unknown kind '{0}'")]
    UnknownKind(String),

    #[error("received invalid push: '{kind}' expects {expected} values, got {actual}")]
    UnexpectedValueCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("received invalid push: channel name is not valid UTF-8")]
    NonUtf8Channel,
}
