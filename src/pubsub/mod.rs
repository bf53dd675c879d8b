//! Клиентская доставка pub/sub сообщений.
//!
//! Слой соединения вызывает [`MessageHandler`] на каждый полученный push;
//! обработчик либо отдаёт сообщение пользовательскому callback'у, либо
//! кладёт его в [`PubSubMessageQueue`], откуда его забирает приложение.
//!
//! - `message`: неизменяемое сообщение и его вид.
//! - `push`: разбор сырых push-кадров в [`Message`].
//! - `queue`: потокобезопасная очередь с ожидающими и сигналами.
//! - `handler`: выбор режима доставки и граница для паник callback'а.
//! - `intern` (приватный): общий пул имён каналов.

pub mod handler;
mod intern;
pub mod message;
pub mod push;
pub mod queue;

pub use handler::{CallbackContext, DeliveryMode, HandlerStats, MessageCallback, MessageHandler};
pub(crate) use intern::intern_name;
pub use message::{Message, MessageKind};
pub use push::{parse_push, PushKind, RawPush};
pub use queue::{MessageWaiter, PubSubMessageQueue, QueueStats, SignalSender};
