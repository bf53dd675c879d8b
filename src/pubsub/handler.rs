use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tracing::{error, trace, warn};

use super::{parse_push, Message, PubSubMessageQueue, RawPush};
use crate::{
    config::QueueConfig,
    error::{MessageCallbackError, PubSubError, PushError},
};

/// Непрозрачный контекст, передаваемый в callback вместе с сообщением.
pub type CallbackContext = Arc<dyn Any + Send + Sync>;

/// Пользовательский обработчик сообщений.
pub type MessageCallback = Arc<dyn Fn(Message, &CallbackContext) + Send + Sync>;

/// Режим доставки, выбирается при создании и больше не меняется.
#[derive(Clone)]
pub enum DeliveryMode {
    /// Каждое сообщение синхронно уходит в callback.
    CallbackDriven {
        callback: MessageCallback,
        context: CallbackContext,
    },
    /// Сообщения копятся в очереди до `pop`/`wait_for_message`.
    QueueDriven { queue: Arc<PubSubMessageQueue> },
}

/// Точка входа для слоя соединения: вызывается на каждый push.
///
/// Ничего не пробрасывает наружу: паника в callback'е перехватывается и
/// логируется, а очередь не умеет ни блокироваться, ни падать.
pub struct MessageHandler {
    mode: DeliveryMode,
    stats: HandlerCounters,
}

#[derive(Debug, Default)]
struct HandlerCounters {
    handled: AtomicU64,
    callback_failures: AtomicU64,
    invalid_pushes: AtomicU64,
}

/// Снимок счётчиков обработчика.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandlerStats {
    /// Сообщения, прошедшие через `handle_message`.
    pub handled: u64,
    /// Вызовы callback'а, завершившиеся паникой.
    pub callback_failures: u64,
    /// Отброшенные некорректные push-кадры.
    pub invalid_pushes: u64,
}

impl MessageHandler {
    /// Обработчик в режиме очереди с неограниченным буфером.
    pub fn with_queue() -> Self {
        Self::with_queue_config(QueueConfig::default())
    }

    pub fn with_queue_config(config: QueueConfig) -> Self {
        Self::from_mode(DeliveryMode::QueueDriven {
            queue: Arc::new(PubSubMessageQueue::with_config(config)),
        })
    }

    /// Обработчик в режиме callback'а.
    pub fn with_callback<F>(
        callback: F,
        context: CallbackContext,
    ) -> Self
    where
        F: Fn(Message, &CallbackContext) + Send + Sync + 'static,
    {
        Self::from_mode(DeliveryMode::CallbackDriven {
            callback: Arc::new(callback),
            context,
        })
    }

    /// Выбирает режим по наличию callback'а.
    ///
    /// Без контекста callback получает `()`.
    pub fn new(
        callback: Option<MessageCallback>,
        context: Option<CallbackContext>,
        queue_config: QueueConfig,
    ) -> Self {
        match callback {
            Some(callback) => Self::from_mode(DeliveryMode::CallbackDriven {
                callback,
                context: context.unwrap_or_else(|| Arc::new(()) as CallbackContext),
            }),
            None => Self::with_queue_config(queue_config),
        }
    }

    fn from_mode(mode: DeliveryMode) -> Self {
        Self {
            mode,
            stats: HandlerCounters::default(),
        }
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    pub fn is_callback_driven(&self) -> bool {
        matches!(self.mode, DeliveryMode::CallbackDriven { .. })
    }

    /// Очередь обработчика. В режиме callback'а очереди нет.
    pub fn queue(&self) -> Result<Arc<PubSubMessageQueue>, PubSubError> {
        match &self.mode {
            DeliveryMode::QueueDriven { queue } => Ok(queue.clone()),
            DeliveryMode::CallbackDriven { .. } => Err(PubSubError::CallbackConfigured),
        }
    }

    /// Доставляет одно сообщение по выбранному режиму.
    pub fn handle_message(
        &self,
        message: Message,
    ) {
        self.stats.handled.fetch_add(1, Ordering::Relaxed);

        match &self.mode {
            DeliveryMode::CallbackDriven { callback, context } => {
                let channel = message.shared_channel();
                if let Err(err) = invoke_callback(callback, context, message) {
                    self.stats.callback_failures.fetch_add(1, Ordering::Relaxed);
                    error!(channel = %channel, error = %err, "panic in message callback");
                }
            }
            DeliveryMode::QueueDriven { queue } => queue.push(message),
        }
    }

    /// Разбирает сырой push-кадр и доставляет сообщение.
    ///
    /// Некорректный кадр логируется и возвращается как ошибка;
    /// подтверждения подписки молча пропускаются.
    pub fn handle_push(
        &self,
        push: RawPush,
    ) -> Result<(), PushError> {
        match parse_push(push) {
            Ok(Some(message)) => {
                self.handle_message(message);
                Ok(())
            }
            Ok(None) => {
                trace!("subscription confirmation push ignored");
                Ok(())
            }
            Err(err) => {
                self.stats.invalid_pushes.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "dropping malformed push");
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            handled: self.stats.handled.load(Ordering::Relaxed),
            callback_failures: self.stats.callback_failures.load(Ordering::Relaxed),
            invalid_pushes: self.stats.invalid_pushes.load(Ordering::Relaxed),
        }
    }
}

/// Вызывает callback внутри границы `catch_unwind`.
fn invoke_callback(
    callback: &MessageCallback,
    context: &CallbackContext,
    message: Message,
) -> Result<(), MessageCallbackError> {
    panic::catch_unwind(AssertUnwindSafe(|| callback(message, context)))
        .map_err(MessageCallbackError::from_panic)
}

impl fmt::Debug for DeliveryMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DeliveryMode::CallbackDriven { .. } => f.write_str("CallbackDriven"),
            DeliveryMode::QueueDriven { queue } => f
                .debug_struct("QueueDriven")
                .field("buffered", &queue.len())
                .finish(),
        }
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("mode", &self.mode)
            .field("stats", &self.stats())
            .finish()
    }
}
