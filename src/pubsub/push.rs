use std::{fmt, str::FromStr};

use bytes::Bytes;

use super::Message;
use crate::error::PushError;

/// Вид push-кадра, как его сообщает сервер.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    Message,
    PMessage,
    SMessage,
    Subscribe,
    PSubscribe,
    SSubscribe,
    Unsubscribe,
    PUnsubscribe,
    SUnsubscribe,
}

/// Push-кадр в том виде, в каком его отдаёт слой соединения.
///
/// Поля опциональны: соединение может прислать кадр без вида или без
/// значений, и такие кадры отклоняются при разборе.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPush {
    pub kind: Option<String>,
    pub values: Option<Vec<Bytes>>,
}

impl PushKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushKind::Message => "message",
            PushKind::PMessage => "pmessage",
            PushKind::SMessage => "smessage",
            PushKind::Subscribe => "subscribe",
            PushKind::PSubscribe => "psubscribe",
            PushKind::SSubscribe => "ssubscribe",
            PushKind::Unsubscribe => "unsubscribe",
            PushKind::PUnsubscribe => "punsubscribe",
            PushKind::SUnsubscribe => "sunsubscribe",
        }
    }

    /// `true` для кадров, несущих полезную нагрузку.
    pub fn carries_message(&self) -> bool {
        matches!(
            self,
            PushKind::Message | PushKind::PMessage | PushKind::SMessage
        )
    }

    /// Ожидаемое число значений в кадре с сообщением.
    fn expected_values(&self) -> usize {
        match self {
            PushKind::PMessage => 3,
            _ => 2,
        }
    }
}

impl FromStr for PushKind {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "message" => PushKind::Message,
            "pmessage" => PushKind::PMessage,
            "smessage" => PushKind::SMessage,
            "subscribe" => PushKind::Subscribe,
            "psubscribe" => PushKind::PSubscribe,
            "ssubscribe" => PushKind::SSubscribe,
            "unsubscribe" => PushKind::Unsubscribe,
            "punsubscribe" => PushKind::PUnsubscribe,
            "sunsubscribe" => PushKind::SUnsubscribe,
            "" => return Err(PushError::Invalid),
            other => return Err(PushError::UnknownKind(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for PushKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RawPush {
    pub fn new(
        kind: impl Into<String>,
        values: Vec<Bytes>,
    ) -> Self {
        Self {
            kind: Some(kind.into()),
            values: Some(values),
        }
    }
}

/// Разбирает push-кадр.
///
/// Возвращает `Ok(None)` для подтверждений (un)subscribe: они корректны,
/// но сообщения не несут.
pub fn parse_push(push: RawPush) -> Result<Option<Message>, PushError> {
    let (kind, values) = match (push.kind, push.values) {
        (None, None) => return Err(PushError::Invalid),
        (None, Some(_)) => return Err(PushError::MissingKind),
        (Some(_), None) => return Err(PushError::MissingValues),
        (Some(kind), Some(values)) => (kind.parse::<PushKind>()?, values),
    };

    if !kind.carries_message() {
        return Ok(None);
    }

    let expected = kind.expected_values();
    if values.len() != expected {
        return Err(PushError::UnexpectedValueCount {
            kind: kind.as_str(),
            expected,
            actual: values.len(),
        });
    }

    let message = match (kind, values.as_slice()) {
        (PushKind::PMessage, [pattern, channel, payload]) => {
            Message::with_pattern(utf8_name(pattern)?, utf8_name(channel)?, payload.clone())
        }
        (PushKind::SMessage, [channel, payload]) => {
            Message::sharded(utf8_name(channel)?, payload.clone())
        }
        (PushKind::Message, [channel, payload]) => {
            Message::new(utf8_name(channel)?, payload.clone())
        }
        _ => return Err(PushError::Invalid),
    };

    Ok(Some(message))
}

fn utf8_name(raw: &Bytes) -> Result<&str, PushError> {
    std::str::from_utf8(raw).map_err(|_| PushError::NonUtf8Channel)
}

impl TryFrom<RawPush> for Message {
    type Error = PushError;

    /// Строгий вариант [`parse_push`]: подтверждения подписки тоже ошибка.
    fn try_from(push: RawPush) -> Result<Self, Self::Error> {
        parse_push(push)?.ok_or(PushError::Invalid)
    }
}
