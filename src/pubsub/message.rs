use std::sync::Arc;

use bytes::Bytes;

use super::intern_name;

/// Способ, которым сообщение дошло до клиента.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Обычная подписка на канал (`SUBSCRIBE`).
    Channel,
    /// Подписка по шаблону (`PSUBSCRIBE`).
    Pattern,
    /// Шардированная подписка (`SSUBSCRIBE`).
    Sharded,
}

/// Одно полученное pub/sub сообщение.
///
/// Значение неизменяемо после создания. Клонирование дешёвое: имя канала,
/// шаблон и payload разделяются через счётчик ссылок.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    channel: Arc<str>,
    payload: Bytes,
    pattern: Option<Arc<str>>,
    kind: MessageKind,
}

impl Message {
    /// Сообщение из обычной подписки на канал.
    pub fn new(
        channel: impl AsRef<str>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            channel: intern_name(channel.as_ref()),
            payload: payload.into(),
            pattern: None,
            kind: MessageKind::Channel,
        }
    }

    /// Сообщение, доставленное по шаблону `pattern`.
    pub fn with_pattern(
        pattern: impl AsRef<str>,
        channel: impl AsRef<str>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            channel: intern_name(channel.as_ref()),
            payload: payload.into(),
            pattern: Some(intern_name(pattern.as_ref())),
            kind: MessageKind::Pattern,
        }
    }

    /// Сообщение из шардированного канала.
    pub fn sharded(
        channel: impl AsRef<str>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            channel: intern_name(channel.as_ref()),
            payload: payload.into(),
            pattern: None,
            kind: MessageKind::Sharded,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Общий указатель на имя канала, без копирования строки.
    pub(crate) fn shared_channel(&self) -> Arc<str> {
        Arc::clone(&self.channel)
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload как строка, если он в UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_sharded(&self) -> bool {
        self.kind == MessageKind::Sharded
    }

    /// Разбирает сообщение на канал и payload.
    pub fn into_parts(self) -> (Arc<str>, Bytes) {
        (self.channel, self.payload)
    }
}
